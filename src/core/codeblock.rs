//! Markdown code block unwrapping for command arguments.

use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)] // Static pattern, verified by tests
static CODEBLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(?:```([A-Za-z0-9\-.]*)\n)?(.+?)(?:```)?$").expect("code block pattern is valid")
});

/// A command argument with any surrounding code fence removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codeblock {
    /// The fence's language tag, if one was given.
    pub language: Option<String>,
    pub content: String,
}

impl Codeblock {
    /// Strips a ```` ```lang ```` fence from `argument`.
    ///
    /// Text that does not look like a fenced block has stray backticks,
    /// spaces and newlines trimmed from both ends instead.
    #[must_use]
    pub fn parse(argument: &str) -> Self {
        if let Some(captures) = CODEBLOCK.captures(argument) {
            if let Some(content) = captures.get(2) {
                return Self {
                    language: captures
                        .get(1)
                        .map(|language| language.as_str().to_string())
                        .filter(|language| !language.is_empty()),
                    content: content.as_str().to_string(),
                };
            }
        }

        Self {
            language: None,
            content: argument
                .trim_matches(|c| matches!(c, '`' | ' ' | '\n'))
                .to_string(),
        }
    }

    /// The same block with `prefix` prepended to its content.
    #[must_use]
    pub fn prefixed(&self, prefix: &str) -> Self {
        Self {
            language: self.language.clone(),
            content: format!("{prefix}{}", self.content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_fence_with_language() {
        let block = Codeblock::parse("```py\nprint(1)\n```");
        assert_eq!(block.language.as_deref(), Some("py"));
        assert_eq!(block.content, "print(1)\n");
    }

    #[test]
    fn test_plain_argument_is_kept() {
        let block = Codeblock::parse("echo hi");
        assert_eq!(block.language, None);
        assert_eq!(block.content, "echo hi");
    }

    #[test]
    fn test_fence_without_language() {
        let block = Codeblock::parse("```\nls -la```");
        assert_eq!(block.language, None);
        assert_eq!(block.content, "ls -la");
    }

    #[test]
    fn test_blank_argument_falls_back_to_trim() {
        let block = Codeblock::parse("");
        assert_eq!(block.content, "");
        assert_eq!(Codeblock::parse("x").prefixed("git ").content, "git x");
    }
}
