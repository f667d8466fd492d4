//! Values produced by REPL fragments.

use super::error::RuntimeError;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
        }
    }

    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
        }
    }

    /// Length of sized values.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Str(s) => Some(s.chars().count()),
            Self::List(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Unambiguous source-like form, e.g. `'text'` for strings.
    #[must_use]
    pub fn repr(&self) -> String {
        match self {
            Self::Str(s) => {
                let escaped = s
                    .replace('\\', "\\\\")
                    .replace('\'', "\\'")
                    .replace('\n', "\\n")
                    .replace('\t', "\\t");
                format!("'{escaped}'")
            }
            Self::List(items) => {
                let inner: Vec<String> = items.iter().map(Self::repr).collect();
                format!("[{}]", inner.join(", "))
            }
            other => other.to_string(),
        }
    }

    pub(crate) fn as_float(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub(crate) fn as_int(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Resolves `self[index]` with negative indices counting from the end.
    pub(crate) fn index(&self, index: &Self) -> Result<Self, RuntimeError> {
        let Some(position) = index.as_int() else {
            return Err(RuntimeError::type_error(format!(
                "indices must be integers, not {}",
                index.type_name()
            )));
        };

        let resolve = |len: usize| -> Result<usize, RuntimeError> {
            let len = i64::try_from(len).map_err(|_| RuntimeError::overflow())?;
            let resolved = if position < 0 { len + position } else { position };
            if (0..len).contains(&resolved) {
                usize::try_from(resolved).map_err(|_| RuntimeError::overflow())
            } else {
                Err(RuntimeError::new("IndexError", "index out of range"))
            }
        };

        match self {
            Self::List(items) => Ok(items[resolve(items.len())?].clone()),
            Self::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                Ok(Self::Str(chars[resolve(chars.len())?].to_string()))
            }
            other => Err(RuntimeError::type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 => {
                write!(f, "{x:.1}")
            }
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::List(_) => write!(f, "{}", self.repr()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_interpreter_style() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::from("a")]).to_string(),
            "[1, 'a']"
        );
    }

    #[test]
    fn test_repr_escapes_strings() {
        assert_eq!(Value::from("it's\n").repr(), "'it\\'s\\n'");
    }

    #[test]
    fn test_index_supports_negative_positions() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(list.index(&Value::Int(-1)), Ok(Value::Int(3)));
        assert_eq!(Value::from("abc").index(&Value::Int(1)), Ok(Value::from("b")));
        assert!(list.index(&Value::Int(3)).is_err());
        assert!(Value::Int(3).index(&Value::Int(0)).is_err());
    }
}
