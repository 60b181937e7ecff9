use std::io::{self, Stdout, Write as _};
use std::time::{Duration, Instant};

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{cursor, execute, queue, style, terminal};

use crate::device::{
    Display, Frame, KeyState, Keyboard, Signal, KEY_COUNT, SCREEN_HEIGHT, SCREEN_WIDTH,
};

/// Raw mode and alternate screen, for as long as this is alive.
///
/// Dropping restores the terminal, also when unwinding.
pub struct TerminalGuard {
    enhanced: bool,
}

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(
            stdout,
            terminal::EnterAlternateScreen,
            terminal::Clear(terminal::ClearType::All),
            cursor::Hide
        )?;
        // Without this, most terminals only ever report key presses
        let enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if enhanced {
            execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        Ok(Self { enhanced })
    }

    /// Whether key release events will be reported.
    pub fn reports_release(&self) -> bool {
        self.enhanced
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        if self.enhanced {
            let _ = execute!(stdout, PopKeyboardEnhancementFlags);
        }
        let _ = execute!(stdout, cursor::Show, terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// Draws the screen with half-block characters, two pixel rows per line.
pub struct TermDisplay {
    frame: Frame,
    /// Last frame written to the terminal.
    shown: Option<Frame>,
    stdout: Stdout,
}

impl TermDisplay {
    pub fn new() -> Self {
        Self {
            frame: Frame::new(),
            shown: None,
            stdout: io::stdout(),
        }
    }
}

impl Default for TermDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TermDisplay {
    fn clear(&mut self) {
        self.frame.clear();
    }

    fn draw(&mut self, x: u8, y: u8, sprite: &[u8]) -> bool {
        self.frame.draw(x, y, sprite)
    }

    fn present(&mut self) -> io::Result<()> {
        // Called after every instruction, most of which do not draw
        if self.shown.as_ref() == Some(&self.frame) {
            return Ok(());
        }
        for (line, text) in render_lines(&self.frame).iter().enumerate() {
            queue!(
                self.stdout,
                cursor::MoveTo(0, line as u16),
                style::Print(text)
            )?;
        }
        self.stdout.flush()?;
        self.shown = Some(self.frame.clone());
        Ok(())
    }
}

fn render_lines(frame: &Frame) -> Vec<String> {
    (0..SCREEN_HEIGHT)
        .step_by(2)
        .map(|y| {
            (0..SCREEN_WIDTH)
                .map(|x| match (frame.pixel(x, y), frame.pixel(x, y + 1)) {
                    (false, false) => ' ',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (true, true) => '█',
                })
                .collect()
        })
        .collect()
}

/// Reads the hex keypad from the left side of a QWERTY keyboard.
///
/// ```text
/// 1 2 3 4      1 2 3 C
/// Q W E R  ->  4 5 6 D
/// A S D F      7 8 9 E
/// Z X C V      A 0 B F
/// ```
///
/// Terminals which cannot report key releases get a fixed hold time per press instead.
pub struct TermKeyboard {
    keys: KeyState,
    pressed_at: [Option<Instant>; KEY_COUNT as usize],
    hold: Duration,
    reports_release: bool,
}

impl TermKeyboard {
    pub fn new(hold: Duration, reports_release: bool) -> Self {
        Self {
            keys: KeyState::default(),
            pressed_at: [None; KEY_COUNT as usize],
            hold,
            reports_release,
        }
    }

    /// Apply a key event. Returns the keypad key it pressed, if any.
    fn handle(&mut self, event: KeyEvent, now: Instant) -> Result<Option<u8>, Quit> {
        if is_quit(&event) {
            return Err(Quit);
        }
        let Some(key) = map_key(event.code) else {
            return Ok(None);
        };
        match event.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => {
                self.keys.press(key);
                self.pressed_at[key as usize] = Some(now);
                Ok(Some(key))
            }
            KeyEventKind::Release => {
                self.keys.release(key);
                self.pressed_at[key as usize] = None;
                Ok(None)
            }
        }
    }

    /// Lowest key still held after applying the hold time.
    fn held_key(&mut self, now: Instant) -> Option<u8> {
        self.expire(now);
        self.keys.first()
    }

    /// Release keys held for longer than the hold time.
    fn expire(&mut self, now: Instant) {
        if self.reports_release {
            return;
        }
        for key in 0..KEY_COUNT {
            let slot = &mut self.pressed_at[key as usize];
            if slot.is_some_and(|at| now.saturating_duration_since(at) >= self.hold) {
                *slot = None;
                self.keys.release(key);
            }
        }
    }
}

/// Escape or `Ctrl+C` was pressed.
#[derive(Debug, PartialEq, Eq)]
struct Quit;

impl Keyboard for TermKeyboard {
    fn poll(&mut self) -> io::Result<Signal> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if self.handle(key, Instant::now()).is_err() {
                    return Ok(Signal::Quit);
                }
            }
        }
        self.expire(Instant::now());
        Ok(Signal::Continue)
    }

    fn is_key_down(&self, key: u8) -> bool {
        self.keys.is_down(key)
    }

    fn wait_for_key(&mut self) -> io::Result<Option<u8>> {
        if self.poll()? == Signal::Quit {
            return Ok(None);
        }
        // A key already down satisfies the wait
        if let Some(key) = self.held_key(Instant::now()) {
            return Ok(Some(key));
        }
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            match self.handle(key, Instant::now()) {
                Ok(Some(key)) => return Ok(Some(key)),
                Ok(None) => continue,
                Err(Quit) => return Ok(None),
            }
        }
    }
}

fn is_quit(event: &KeyEvent) -> bool {
    match event.code {
        KeyCode::Esc => true,
        KeyCode::Char('c') => event.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

fn map_key(code: KeyCode) -> Option<u8> {
    let KeyCode::Char(ch) = code else {
        return None;
    };
    let key = match ch.to_ascii_lowercase() {
        '1' => 0x1,
        '2' => 0x2,
        '3' => 0x3,
        '4' => 0xC,
        'q' => 0x4,
        'w' => 0x5,
        'e' => 0x6,
        'r' => 0xD,
        'a' => 0x7,
        's' => 0x8,
        'd' => 0x9,
        'f' => 0xE,
        'z' => 0xA,
        'x' => 0x0,
        'c' => 0xB,
        'v' => 0xF,
        _ => return None,
    };
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE)
    }

    fn release(ch: char) -> KeyEvent {
        KeyEvent::new_with_kind(KeyCode::Char(ch), KeyModifiers::NONE, KeyEventKind::Release)
    }

    #[test]
    fn maps_keypad_layout() {
        let layout = "1234qwerasdfzxcv";
        let keypad = [
            0x1, 0x2, 0x3, 0xC, 0x4, 0x5, 0x6, 0xD, 0x7, 0x8, 0x9, 0xE, 0xA, 0x0, 0xB, 0xF,
        ];
        for (ch, expected) in layout.chars().zip(keypad) {
            assert_eq!(map_key(KeyCode::Char(ch)), Some(expected), "key {ch}");
        }
        assert_eq!(map_key(KeyCode::Char('W')), Some(0x5));
        assert_eq!(map_key(KeyCode::Char('p')), None);
        assert_eq!(map_key(KeyCode::Enter), None);
    }

    #[test]
    fn quit_keys() {
        let mut keyboard = TermKeyboard::new(Duration::from_millis(100), true);
        let now = Instant::now();
        assert_eq!(
            keyboard.handle(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE), now),
            Err(Quit)
        );
        assert_eq!(
            keyboard.handle(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), now),
            Err(Quit)
        );
        // Plain `c` is keypad B
        assert_eq!(keyboard.handle(press('c'), now), Ok(Some(0xB)));
    }

    #[test]
    fn release_events_release_keys() {
        let mut keyboard = TermKeyboard::new(Duration::from_millis(100), true);
        let now = Instant::now();
        keyboard.handle(press('w'), now).unwrap();
        assert!(keyboard.is_key_down(0x5));
        // Hold time is ignored when releases are reported
        keyboard.expire(now + Duration::from_secs(10));
        assert!(keyboard.is_key_down(0x5));
        keyboard.handle(release('w'), now).unwrap();
        assert!(!keyboard.is_key_down(0x5));
    }

    #[test]
    fn presses_expire_without_release_events() {
        let hold = Duration::from_millis(100);
        let mut keyboard = TermKeyboard::new(hold, false);
        let now = Instant::now();
        keyboard.handle(press('x'), now).unwrap();
        keyboard.expire(now + hold / 2);
        assert!(keyboard.is_key_down(0x0));
        // Repeat refreshes the hold
        keyboard.handle(press('x'), now + hold / 2).unwrap();
        keyboard.expire(now + hold);
        assert!(keyboard.is_key_down(0x0));
        keyboard.expire(now + hold * 2);
        assert!(!keyboard.is_key_down(0x0));
    }

    #[test]
    fn held_key_satisfies_wait() {
        let hold = Duration::from_millis(150);
        let mut keyboard = TermKeyboard::new(hold, false);
        let now = Instant::now();
        assert_eq!(keyboard.held_key(now), None);
        keyboard.handle(press('w'), now).unwrap();
        keyboard.handle(press('v'), now).unwrap();
        // Lowest held key wins
        assert_eq!(keyboard.held_key(now + hold / 2), Some(0x5));
        assert_eq!(keyboard.held_key(now + hold), None);

        let mut keyboard = TermKeyboard::new(hold, true);
        keyboard.handle(press('e'), now).unwrap();
        assert_eq!(keyboard.held_key(now + hold * 10), Some(0x6));
        keyboard.handle(release('e'), now).unwrap();
        assert_eq!(keyboard.held_key(now), None);
    }

    #[test]
    fn renders_half_blocks() {
        let mut frame = Frame::new();
        frame.draw(0, 0, &[0b1000_0000, 0b1100_0000]);
        frame.draw(2, 1, &[0b1000_0000]);
        let lines = render_lines(&frame);
        assert_eq!(lines.len(), SCREEN_HEIGHT / 2);
        assert!(lines[0].starts_with("█▄▄ "));
        assert_eq!(lines[0].chars().count(), SCREEN_WIDTH);
        assert!(lines[1].chars().all(|ch| ch == ' '));
    }
}
