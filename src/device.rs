use std::io;

pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_HEIGHT: usize = 32;
pub const KEY_COUNT: u8 = 16;

/// Whether the run loop should keep going.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Signal {
    Continue,
    /// User asked to stop, eg. by closing the window or pressing escape.
    Quit,
}

/// Output side of the machine.
///
/// Implementors own the pixel storage. The interpreter only ever touches it through these calls.
pub trait Display {
    /// Turn every pixel off.
    fn clear(&mut self);

    /// XOR an 8-pixel-wide sprite onto the screen, one byte per row, starting at `(x, y)`.
    ///
    /// Coordinates wrap around both axes per pixel. Returns `true` if any lit pixel was turned
    /// off.
    fn draw(&mut self, x: u8, y: u8, sprite: &[u8]) -> bool;

    /// Show the current frame.
    fn present(&mut self) -> io::Result<()>;
}

/// Input side of the machine.
pub trait Keyboard {
    /// Refresh key state. Called once per executed instruction.
    fn poll(&mut self) -> io::Result<Signal>;

    /// Keys outside `0..16` are never down.
    fn is_key_down(&self, key: u8) -> bool;

    /// Block until a key is pressed and return its index.
    ///
    /// Returns `None` if a quit was requested while waiting.
    fn wait_for_key(&mut self) -> io::Result<Option<u8>>;
}

/// Monochrome 64x32 screen, one bit per pixel, row-major.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Frame {
    /// Bit 63 of each row is the leftmost pixel.
    rows: [u64; SCREEN_HEIGHT],
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            rows: [0; SCREEN_HEIGHT],
        }
    }
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.rows = [0; SCREEN_HEIGHT];
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        let mask = 1u64 << (SCREEN_WIDTH - 1 - x % SCREEN_WIDTH);
        self.rows[y % SCREEN_HEIGHT] & mask != 0
    }

    /// See [`Display::draw`].
    pub fn draw(&mut self, x: u8, y: u8, sprite: &[u8]) -> bool {
        let mut collision = false;
        for (i, row) in sprite.iter().enumerate() {
            let py = (y as usize + i) % SCREEN_HEIGHT;
            for j in 0..8 {
                if row & (0x80 >> j) == 0 {
                    continue;
                }
                let px = (x as usize + j) % SCREEN_WIDTH;
                let mask = 1u64 << (SCREEN_WIDTH - 1 - px);
                // Erasing a lit pixel
                if self.rows[py] & mask != 0 {
                    collision = true;
                }
                self.rows[py] ^= mask;
            }
        }
        collision
    }
}

/// Mask of held keys, bit `i` set iff key `i` is down.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct KeyState(u16);

impl KeyState {
    pub fn is_down(self, key: u8) -> bool {
        key < KEY_COUNT && self.0 & (1 << key) != 0
    }

    pub fn press(&mut self, key: u8) {
        if key < KEY_COUNT {
            self.0 |= 1 << key;
        }
    }

    pub fn release(&mut self, key: u8) {
        if key < KEY_COUNT {
            self.0 &= !(1 << key);
        }
    }

    /// Lowest held key.
    pub fn first(self) -> Option<u8> {
        (self.0 != 0).then(|| self.0.trailing_zeros() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawing_twice_erases_and_collides() {
        let mut frame = Frame::new();
        assert!(!frame.draw(3, 4, &[0b1000_0000]));
        assert!(frame.pixel(3, 4));
        assert!(frame.draw(3, 4, &[0b1000_0000]));
        assert!(!frame.pixel(3, 4));
        assert_eq!(frame, Frame::new());
    }

    #[test]
    fn sprite_wraps_per_pixel() {
        let mut frame = Frame::new();
        // Two pixels past the right edge and one row past the bottom
        frame.draw(62, 31, &[0b1111_0000, 0b1000_0000]);
        assert!(frame.pixel(62, 31));
        assert!(frame.pixel(63, 31));
        assert!(frame.pixel(0, 31));
        assert!(frame.pixel(1, 31));
        assert!(frame.pixel(62, 0));
        assert!(!frame.pixel(2, 31));
    }

    #[test]
    fn coordinates_wrap_before_drawing() {
        let mut a = Frame::new();
        let mut b = Frame::new();
        a.draw(64 + 5, 32 + 7, &[0xAA]);
        b.draw(5, 7, &[0xAA]);
        assert_eq!(a, b);
    }

    #[test]
    fn key_state_ignores_out_of_range_keys() {
        let mut keys = KeyState::default();
        keys.press(0xF);
        keys.press(16);
        assert!(keys.is_down(0xF));
        assert!(!keys.is_down(16));
        assert!(!keys.is_down(0xFF));
        assert_eq!(keys.first(), Some(0xF));
        keys.release(0xF);
        assert_eq!(keys.first(), None);
    }
}
