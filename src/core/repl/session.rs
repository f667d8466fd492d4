//! REPL state kept between commands: variable retention and the last result.

use super::scope::Scope;
use super::value::Value;

/// Per-bot REPL state.
///
/// With retention off every run starts from an empty scope. With retention
/// on, bindings made by one run are visible to the next.
#[derive(Debug, Default)]
pub struct ReplSession {
    retain: bool,
    scope: Scope,
    /// Last non-None result, exposed to fragments as `_`.
    pub last_result: Value,
}

impl ReplSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn retain(&self) -> bool {
        self.retain
    }

    /// Switches retention, returning whether the setting changed.
    ///
    /// Turning retention on starts from a fresh scope.
    pub fn set_retain(&mut self, on: bool) -> bool {
        if self.retain == on {
            return false;
        }
        self.retain = on;
        self.scope = Scope::new();
        true
    }

    /// Scope a new run should evaluate in.
    ///
    /// Concurrent runs each start from the retained bindings; the last one to
    /// finish wins.
    #[must_use]
    pub fn scope_for_run(&self) -> Scope {
        if self.retain {
            self.scope.clone()
        } else {
            Scope::new()
        }
    }

    /// Hands a finished run's scope back, keeping it when retaining.
    pub fn finish_run(&mut self, mut scope: Scope) {
        if self.retain {
            scope.clean();
            self.scope = scope;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(name: &str, value: i64) -> Scope {
        let mut scope = Scope::new();
        scope.update_locals([(name.to_string(), Value::Int(value))]);
        scope
    }

    #[test]
    fn test_scope_is_discarded_without_retention() {
        let mut session = ReplSession::new();
        assert!(!session.retain());

        let _ = session.scope_for_run();
        session.finish_run(bound("x", 1));

        assert_eq!(session.scope_for_run(), Scope::new());
    }

    #[test]
    fn test_retained_scope_carries_over_without_private_names() {
        let mut session = ReplSession::new();
        assert!(session.set_retain(true));
        assert!(!session.set_retain(true));

        let mut scope = session.scope_for_run();
        scope.update_locals([
            ("x".to_string(), Value::Int(1)),
            ("_author".to_string(), Value::Int(9)),
        ]);
        session.finish_run(scope);

        let next = session.scope_for_run();
        assert_eq!(next.get("x"), Some(&Value::Int(1)));
        assert!(next.get("_author").is_none());
    }

    #[test]
    fn test_toggling_retention_resets_scope() {
        let mut session = ReplSession::new();
        session.set_retain(true);
        session.finish_run(bound("x", 1));

        assert!(session.set_retain(false));
        assert!(session.set_retain(true));
        assert!(session.scope_for_run().get("x").is_none());
    }
}
