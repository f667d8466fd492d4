//! Reading source files into syntax-highlighted pages for `cat`.

use super::paginator::{Paginator, add_with_fallback};
use crate::errors::{Error, Result};
use encoding_rs::Encoding;
use regex::Regex;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// Files larger than this are refused.
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

#[allow(clippy::expect_used)] // Static pattern, verified by tests
static FILE_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\./+)?(.+?)(?:#L?(\d+)(?:-L?(\d+))?)?$").expect("file target pattern is valid")
});

#[allow(clippy::expect_used)] // Static pattern, verified by tests
static CODING_DECLARATION: LazyLock<regex::bytes::Regex> = LazyLock::new(|| {
    regex::bytes::Regex::new(r"coding[=:]\s*([-\w.]+)").expect("coding declaration pattern is valid")
});

/// How far into a file a `coding` declaration is looked for.
const DECLARATION_WINDOW: usize = 128;

/// A path with an optional 1-based, inclusive line span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTarget {
    pub path: PathBuf,
    pub line_span: Option<(usize, usize)>,
}

impl FileTarget {
    /// Parses `path`, `path#L12` or `path#L12-14`.
    pub fn parse(argument: &str) -> Result<Self> {
        let captures = FILE_TARGET
            .captures(argument.trim())
            .ok_or_else(|| Error::Command("Couldn't parse this input.".to_string()))?;

        let number = |index: usize| -> Result<Option<usize>> {
            captures
                .get(index)
                .map(|m| {
                    m.as_str()
                        .parse()
                        .map_err(|_| Error::Command(format!("Line number {} is too large.", m.as_str())))
                })
                .transpose()
        };

        let line_span = match (number(2)?, number(3)?) {
            (Some(start), end) => Some((start, end.unwrap_or(start))),
            (None, _) => None,
        };

        Ok(Self {
            path: PathBuf::from(&captures[1]),
            line_span,
        })
    }
}

/// Highlighting language for a file extension.
#[must_use]
pub fn language_for_path(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match extension.as_str() {
        "rs" => "rust",
        "py" | "pyw" => "py",
        "js" | "mjs" | "cjs" => "js",
        "ts" => "ts",
        "sh" | "bash" => "sh",
        "toml" => "toml",
        "json" => "json",
        "yml" | "yaml" => "yaml",
        "md" => "md",
        "html" | "htm" => "html",
        "css" => "css",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "go" => "go",
        "java" => "java",
        "rb" => "rb",
        "sql" => "sql",
        "ini" | "cfg" => "ini",
        _ => return None,
    })
}

/// Highlighting language named by a `#!` interpreter line.
#[must_use]
pub fn language_for_shebang(line: &str) -> Option<&'static str> {
    let command = line.strip_prefix("#!")?;
    let mut words = command.split_whitespace();
    let mut interpreter = words.next()?.rsplit('/').next()?;
    if interpreter == "env" {
        interpreter = words.find(|word| !word.starts_with('-'))?;
    }

    let name = interpreter.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.');
    Some(match name {
        "python" => "py",
        "sh" | "bash" | "zsh" | "dash" => "sh",
        "node" => "js",
        "ruby" => "rb",
        "perl" => "perl",
        _ => return None,
    })
}

/// Decodes file contents as UTF-8, or else in the encoding named by a
/// `coding` declaration near the top of the file.
fn decode_content(raw: Vec<u8>) -> Option<String> {
    let bytes = match String::from_utf8(raw) {
        Ok(text) => return Some(text),
        Err(e) => e.into_bytes(),
    };

    let head = &bytes[..bytes.len().min(DECLARATION_WINDOW)];
    let label = CODING_DECLARATION.captures(head)?.get(1)?.as_bytes();
    // "latin-1" and "utf_8" are spelled without separators in the label registry
    let squashed: Vec<u8> = label.iter().copied().filter(|b| !matches!(b, b'-' | b'_')).collect();
    let encoding = Encoding::for_label(label).or_else(|| Encoding::for_label(&squashed))?;
    debug!("Decoding as {} from a coding declaration", encoding.name());

    encoding
        .decode_without_bom_handling_and_without_replacement(&bytes)
        .map(Cow::into_owned)
}

/// Builds a code-fenced paginator over a text file's contents.
///
/// The shebang's language takes precedence over the extension's.
pub async fn file_paginator(target: &FileTarget, max_size: usize) -> Result<Paginator> {
    let shown = target.path.display();
    let metadata = match tokio::fs::metadata(&target.path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Err(Error::Command(format!("``{shown}``: No file by that name."))),
    };

    let size = metadata.len();
    if size == 0 {
        return Err(Error::Command(format!(
            "``{shown}``: This file may be endless, empty or inaccessible."
        )));
    }
    if size > MAX_FILE_SIZE {
        return Err(Error::Command(format!(
            "``{shown}``: Files larger than 50MB are not read."
        )));
    }

    let raw = tokio::fs::read(&target.path).await?;
    let content = decode_content(raw).ok_or_else(|| {
        Error::Command(format!("``{shown}``: Couldn't determine the encoding of this file."))
    })?;
    debug!("Read {size} bytes from {shown}");

    let lines: Vec<&str> = content.split('\n').collect();
    let language = lines
        .first()
        .and_then(|first| language_for_shebang(first))
        .or_else(|| language_for_path(&target.path))
        .unwrap_or_default();

    let selected = match target.line_span {
        None => &lines[..],
        Some((a, b)) => {
            let (start, end) = (a.min(b), a.max(b));
            if start < 1 || end > lines.len() {
                return Err(Error::Command(format!(
                    "``{shown}``: Couldn't read this file, linespan goes out of bounds."
                )));
            }
            &lines[start - 1..end]
        }
    };

    let mut paginator = Paginator::wrapped(format!("```{language}"), "```", max_size);
    for line in selected {
        add_with_fallback(&line.replace("``", "`\u{200b}`"), |line| paginator.add_line(line))?;
    }
    Ok(paginator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_file_targets() -> Result<()> {
        assert_eq!(
            FileTarget::parse("./src/main.rs#L12-14")?,
            FileTarget {
                path: PathBuf::from("src/main.rs"),
                line_span: Some((12, 14)),
            }
        );
        assert_eq!(FileTarget::parse("notes.txt#5")?.line_span, Some((5, 5)));
        assert_eq!(FileTarget::parse("/etc/hosts")?.line_span, None);
        Ok(())
    }

    #[test]
    fn test_language_detection() {
        assert_eq!(language_for_path(Path::new("a/b.RS")), Some("rust"));
        assert_eq!(language_for_path(Path::new("Makefile")), None);
        assert_eq!(language_for_shebang("#!/usr/bin/env python3"), Some("py"));
        assert_eq!(language_for_shebang("#!/bin/bash -e"), Some("sh"));
        assert_eq!(language_for_shebang("print()"), None);
    }

    #[tokio::test]
    async fn test_file_paginator_honors_span_and_shebang() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile()?;
        write!(file, "#!/usr/bin/env python3\nimport os\nprint(os.name)\n")?;

        let target = FileTarget {
            path: file.path().to_path_buf(),
            line_span: Some((3, 2)),
        };
        let paginator = file_paginator(&target, 1985).await?;
        assert_eq!(
            paginator.pages(),
            vec!["```py\nimport os\nprint(os.name)\n```".to_string()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_file_paginator_rejections() -> Result<()> {
        let empty = tempfile::NamedTempFile::new()?;
        let target = FileTarget {
            path: empty.path().to_path_buf(),
            line_span: None,
        };
        assert!(matches!(file_paginator(&target, 1985).await, Err(Error::Command(_))));

        let mut binary = tempfile::NamedTempFile::new()?;
        binary.write_all(&[0xff, 0xfe, 0x00])?;
        let target = FileTarget {
            path: binary.path().to_path_buf(),
            line_span: None,
        };
        let error = file_paginator(&target, 1985).await.expect_err("not utf-8");
        assert!(error.to_string().contains("encoding"));

        let target = FileTarget {
            path: binary.path().to_path_buf(),
            line_span: Some((1, 9)),
        };
        assert!(file_paginator(&target, 1985).await.is_err());

        let missing = FileTarget::parse("/definitely/not/here.rs")?;
        let error = file_paginator(&missing, 1985).await.expect_err("missing");
        assert!(error.to_string().contains("No file by that name"));
        Ok(())
    }

    #[tokio::test]
    async fn test_coding_declaration_decodes_legacy_files() -> Result<()> {
        let mut legacy = tempfile::NamedTempFile::new()?;
        legacy.write_all(b"# -*- coding: latin-1 -*-\nname = 'caf\xe9'\n")?;
        let target = FileTarget {
            path: legacy.path().to_path_buf(),
            line_span: Some((2, 2)),
        };

        let pages = file_paginator(&target, 1985).await?.pages();
        assert_eq!(pages, vec!["```\nname = 'caf\u{e9}'\n```".to_string()]);
        Ok(())
    }

    #[test]
    fn test_unknown_or_missing_declarations_are_not_guessed() {
        assert_eq!(decode_content(b"plain".to_vec()).as_deref(), Some("plain"));
        assert_eq!(decode_content(b"caf\xe9".to_vec()), None);
        assert_eq!(decode_content(b"# coding: klingon\n\xe9".to_vec()), None);
        assert_eq!(
            decode_content(b"# vim: set fileencoding=iso-8859-1 :\n\xe9".to_vec()).as_deref(),
            Some("# vim: set fileencoding=iso-8859-1 :\n\u{e9}")
        );
    }
}
