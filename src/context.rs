//! Shared execution context.
//!
//! `Context` is the single write-once results map a [`crate::scheduler`]
//! populates as tasks complete and dependents read from when building their
//! render context. It is shared behind an `Arc` and guarded by a
//! `parking_lot::Mutex`, matching the rest of the crate's synchronization
//! style (see [`crate::scheduler`]).

use std::collections::HashMap;

use parking_lot::Mutex;

/// The shared result map threaded through a single crew execution.
///
/// Each task publishes at most one entry, keyed by its result key (see
/// [`crate::task::Task::result_key`]). Writing to a key twice is a logic
/// error in the scheduler, not a condition a caller is expected to handle,
/// so it is caught with a debug assertion rather than a `Result`.
#[derive(Debug, Default)]
pub struct Context {
    values: Mutex<HashMap<String, String>>,
}

impl Context {
    /// Creates an empty context, optionally pre-seeded with crew-level
    /// shared inputs (see `Builder::add_shared_context`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context pre-populated with `seed` values.
    pub fn with_values(seed: HashMap<String, String>) -> Self {
        Context {
            values: Mutex::new(seed),
        }
    }

    /// Records `value` under `key`. Each key is expected to be written at
    /// most once per execution; a debug build panics on a repeat write so
    /// the bug surfaces where it happens rather than as a silently
    /// overwritten downstream value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let mut values = self.values.lock();
        debug_assert!(
            !values.contains_key(&key),
            "context key '{key}' written more than once"
        );
        values.insert(key, value.into());
    }

    /// Reads the current value of `key`, if any has been published.
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    /// Returns a snapshot of the full context as a plain `HashMap`,
    /// suitable for rendering a prompt template against.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.values.lock().clone()
    }

    /// True once every key in `keys` has a published value.
    pub fn has_all(&self, keys: &[String]) -> bool {
        let values = self.values.lock();
        keys.iter().all(|k| values.contains_key(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let ctx = Context::new();
        ctx.set("a", "1");
        assert_eq!(ctx.get("a"), Some("1".to_string()));
        assert_eq!(ctx.get("missing"), None);
    }

    #[test]
    fn has_all_requires_every_key_present() {
        let ctx = Context::new();
        ctx.set("a", "1");
        assert!(!ctx.has_all(&["a".to_string(), "b".to_string()]));
        ctx.set("b", "2");
        assert!(ctx.has_all(&["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn with_values_seeds_initial_state() {
        let mut seed = HashMap::new();
        seed.insert("topic".to_string(), "rust".to_string());
        let ctx = Context::with_values(seed);
        assert_eq!(ctx.get("topic"), Some("rust".to_string()));
    }

    #[test]
    #[should_panic(expected = "written more than once")]
    fn set_twice_panics_in_debug() {
        let ctx = Context::new();
        ctx.set("a", "1");
        ctx.set("a", "2");
    }
}
