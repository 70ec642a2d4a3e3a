//! Scoped environment overrides for configuration tests.

use std::sync::{Mutex, OnceLock};

/// Process-wide lock serializing environment mutation across test threads.
pub fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

#[allow(unused_unsafe)]
fn write_var(key: &str, value: Option<&str>) {
    // SAFETY: callers hold `env_lock` while tests may run in parallel.
    unsafe {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
}

/// Overrides a set of variables and restores them, newest first, on drop.
#[derive(Default)]
pub struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    /// Override `key` with `value`.
    pub fn set(key: &str, value: &str) -> Self {
        Self::default().with(key, Some(value))
    }

    /// Unset `key`.
    pub fn remove(key: &str) -> Self {
        Self::default().with(key, None)
    }

    /// Override one more variable under the same guard; `None` unsets it.
    pub fn with(mut self, key: &str, value: Option<&str>) -> Self {
        self.saved.push((key.to_string(), std::env::var(key).ok()));
        write_var(key, value);
        self
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        while let Some((key, previous)) = self.saved.pop() {
            write_var(&key, previous.as_deref());
        }
    }
}
