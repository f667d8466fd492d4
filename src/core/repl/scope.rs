//! Global and local bindings shared across REPL evaluations.

use super::value::Value;
use std::collections::HashMap;

/// A pair of binding maps used for evaluation.
///
/// Lookups prefer locals; fragments write their top-level bindings into
/// locals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    pub globals: HashMap<String, Value>,
    pub locals: HashMap<String, Value>,
}

fn is_private(name: &str) -> bool {
    name.starts_with('_') && !name.starts_with("__")
}

impl Scope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops single-underscore names from both maps, keeping dunder names.
    pub fn clean(&mut self) -> &mut Self {
        self.globals.retain(|name, _| !is_private(name));
        self.locals.retain(|name, _| !is_private(name));
        self
    }

    /// Merges another scope's bindings into this one.
    pub fn update(&mut self, other: &Self) -> &mut Self {
        self.globals
            .extend(other.globals.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.locals
            .extend(other.locals.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn update_globals(&mut self, bindings: impl IntoIterator<Item = (String, Value)>) -> &mut Self {
        self.globals.extend(bindings);
        self
    }

    pub fn update_locals(&mut self, bindings: impl IntoIterator<Item = (String, Value)>) -> &mut Self {
        self.locals.extend(bindings);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.locals.get(name).or_else(|| self.globals.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_removes_private_names_only() {
        let mut scope = Scope::new();
        scope.update_locals([
            ("_x".to_string(), Value::Int(1)),
            ("__x__".to_string(), Value::Int(2)),
            ("y".to_string(), Value::Int(3)),
        ]);
        scope.update_globals([("_g".to_string(), Value::None)]);

        scope.clean();

        assert!(scope.get("_x").is_none());
        assert!(scope.get("_g").is_none());
        assert_eq!(scope.get("__x__"), Some(&Value::Int(2)));
        assert_eq!(scope.get("y"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_locals_shadow_globals() {
        let mut scope = Scope::new();
        scope.update_globals([("a".to_string(), Value::Int(1))]);
        scope.update_locals([("a".to_string(), Value::Int(2))]);
        assert_eq!(scope.get("a"), Some(&Value::Int(2)));

        let mut other = Scope::new();
        other.update_globals([("b".to_string(), Value::Int(5))]);
        scope.update(&other);
        assert_eq!(scope.get("b"), Some(&Value::Int(5)));
    }
}
