//! Compile-time and runtime failures of REPL fragments.

use thiserror::Error;

/// A fragment that could not be compiled. It never runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("SyntaxError: {message} (line {line}, column {column})")]
pub struct SyntaxError {
    pub message: String,
    /// The offending source line.
    pub text: String,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column of the offending token.
    pub column: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, text: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            text: text.into(),
            line,
            column,
        }
    }

    /// The offending line with a caret under the failing column.
    #[must_use]
    pub fn pointer(&self) -> String {
        if self.text.is_empty() {
            return format!("SyntaxError: {}", self.message);
        }
        let caret = format!("{}^", " ".repeat(self.column.saturating_sub(1)));
        format!("{}\n{caret}\nSyntaxError: {}", self.text, self.message)
    }

    /// [`SyntaxError::pointer`] in a code block.
    #[must_use]
    pub fn render(&self) -> String {
        format!("```py\n{}\n```", self.pointer())
    }
}

/// An exception raised while a fragment ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RuntimeError {
    /// Exception class, such as `ZeroDivisionError`.
    pub kind: String,
    pub message: String,
}

impl RuntimeError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub(crate) fn zero_division() -> Self {
        Self::new("ZeroDivisionError", "division by zero")
    }

    pub(crate) fn name(name: &str) -> Self {
        Self::new("NameError", format!("name '{name}' is not defined"))
    }

    pub(crate) fn overflow() -> Self {
        Self::new("OverflowError", "integer overflow")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_marks_column() {
        let error = SyntaxError::new("invalid syntax", "x = (1 +", 1, 9);
        assert_eq!(
            error.pointer(),
            "x = (1 +\n        ^\nSyntaxError: invalid syntax"
        );
        assert!(error.render().starts_with("```py\n"));
    }

    #[test]
    fn test_pointer_without_source_text() {
        let error = SyntaxError::new("unexpected end of input", "", 1, 1);
        assert_eq!(error.pointer(), "SyntaxError: unexpected end of input");
    }

    #[test]
    fn test_runtime_error_display() {
        assert_eq!(
            RuntimeError::zero_division().to_string(),
            "ZeroDivisionError: division by zero"
        );
    }
}
