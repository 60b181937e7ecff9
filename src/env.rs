use std::{cell::RefCell, ffi::OsStr, time::Duration};

/// Default hold time for terminals which do not report key releases.
const DEFAULT_KEY_HOLD: Duration = Duration::from_millis(150);

#[derive(Clone, Copy)]
struct Env {
    trace_enabled: bool,
    key_hold: Duration,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

pub fn init() {
    let value = Env {
        trace_enabled: var_is("OCTOCHIP_TRACE", "1"),
        key_hold: var_millis("OCTOCHIP_KEY_HOLD_MS").unwrap_or(DEFAULT_KEY_HOLD),
    };
    set_env(value);
}

pub fn is_trace_enabled() -> bool {
    with_env(|env| env.trace_enabled)
}

pub fn key_hold() -> Duration {
    with_env(|env| env.key_hold)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| &v == value.as_ref())
}

/// Unset or malformed values are ignored.
fn var_millis(name: impl AsRef<OsStr>) -> Option<Duration> {
    let value = std::env::var(name.as_ref()).ok()?;
    value.trim().parse().ok().map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_variables() {
        std::env::set_var("OCTOCHIP_TEST_MILLIS", " 250 ");
        std::env::set_var("OCTOCHIP_TEST_BAD", "soon");
        std::env::set_var("OCTOCHIP_TEST_FLAG", "1");
        assert_eq!(
            var_millis("OCTOCHIP_TEST_MILLIS"),
            Some(Duration::from_millis(250))
        );
        assert_eq!(var_millis("OCTOCHIP_TEST_BAD"), None);
        assert_eq!(var_millis("OCTOCHIP_TEST_UNSET"), None);
        assert!(var_is("OCTOCHIP_TEST_FLAG", "1"));
        assert!(!var_is("OCTOCHIP_TEST_UNSET", "1"));
    }
}
