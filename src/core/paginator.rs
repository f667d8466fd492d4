//! Line-oriented paginator that splits an unbounded text stream into bounded pages.
//!
//! Every page is rendered as `prefix`, the page's lines and `suffix`, joined by
//! newlines. Sizes are counted in characters, and a rendered page never exceeds
//! the configured maximum. The wrapped mode breaks lines that are too long on
//! their own at the rightmost delimiter that still fits.

use crate::errors::{Error, Result};

const LINESEP: &str = "\n";

/// Delimiter-based line wrapping settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapOptions {
    /// Delimiters to break on, in priority order.
    pub wrap_on: Vec<String>,
    /// Whether the delimiter is kept at the start of the remainder.
    pub include_wrapped: bool,
}

impl Default for WrapOptions {
    fn default() -> Self {
        Self {
            wrap_on: vec!["\n".to_string(), " ".to_string()],
            include_wrapped: true,
        }
    }
}

/// Per-line options for [`Paginator::add_line_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineOptions {
    /// Append a blank line after this one.
    pub empty: bool,
    /// Close the current page before adding this line.
    pub force_new_page: bool,
}

/// Accumulates lines into closed pages plus one open page.
#[derive(Debug, Clone)]
pub struct Paginator {
    prefix: String,
    suffix: String,
    max_size: usize,
    wrap: Option<WrapOptions>,
    current: Vec<String>,
    current_chars: usize,
    pages: Vec<String>,
}

impl Paginator {
    /// Creates a paginator that rejects lines too long to fit on a page.
    #[must_use]
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>, max_size: usize) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            max_size,
            wrap: None,
            current: Vec::new(),
            current_chars: 0,
            pages: Vec::new(),
        }
    }

    /// Creates a paginator that wraps long lines on newlines, then spaces.
    #[must_use]
    pub fn wrapped(prefix: impl Into<String>, suffix: impl Into<String>, max_size: usize) -> Self {
        Self::new(prefix, suffix, max_size).with_wrap(WrapOptions::default())
    }

    /// Enables wrapping with custom delimiters.
    #[must_use]
    pub fn with_wrap(mut self, wrap: WrapOptions) -> Self {
        self.wrap = Some(wrap);
        self
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    #[must_use]
    pub const fn is_wrapped(&self) -> bool {
        self.wrap.is_some()
    }

    /// The longest single line that fits on an otherwise empty page.
    #[must_use]
    pub fn max_line_len(&self) -> usize {
        self.max_size.saturating_sub(self.rendered_len(1, 0))
    }

    /// Appends a logical line.
    pub fn add_line(&mut self, line: &str) -> Result<()> {
        self.add_line_with(line, LineOptions::default())
    }

    /// Appends a logical line with explicit options.
    ///
    /// Fails with [`Error::LineTooLong`] if the line cannot be placed, even
    /// after wrapping.
    pub fn add_line_with(&mut self, line: &str, options: LineOptions) -> Result<()> {
        match self.wrap.clone() {
            Some(wrap) => self.add_wrapped(line, options, &wrap),
            None => self.push_line(line, options),
        }
    }

    fn add_wrapped(&mut self, line: &str, options: LineOptions, wrap: &WrapOptions) -> Result<()> {
        let limit = self.max_line_len();
        let mut pieces = Vec::new();
        let mut remainder = line;

        // split everything up front so a failure leaves the paginator untouched
        while remainder.chars().count() > limit {
            let window = &remainder[..byte_offset(remainder, limit)];
            let split = wrap.wrap_on.iter().find_map(|delimiter| {
                window
                    .rfind(delimiter.as_str())
                    .filter(|position| *position > 0)
                    .map(|position| (position, delimiter.len()))
            });

            let Some((position, delimiter_len)) = split else {
                return Err(Error::LineTooLong { max: limit });
            };

            pieces.push(&remainder[..position]);
            remainder = if wrap.include_wrapped {
                &remainder[position..]
            } else {
                &remainder[position + delimiter_len..]
            };
        }
        pieces.push(remainder);

        let last = pieces.len() - 1;
        for (index, piece) in pieces.into_iter().enumerate() {
            self.push_line(
                piece,
                LineOptions {
                    empty: index == last && options.empty,
                    force_new_page: index == 0 && options.force_new_page,
                },
            )?;
        }
        Ok(())
    }

    fn push_line(&mut self, line: &str, options: LineOptions) -> Result<()> {
        let len = line.chars().count();
        let max = self.max_line_len();
        if len > max {
            return Err(Error::LineTooLong { max });
        }

        if options.force_new_page && !self.current.is_empty() {
            self.close_page();
        }

        if self.rendered_len(self.current.len() + 1, self.current_chars + len) > self.max_size {
            self.close_page();
        }

        self.current.push(line.to_string());
        self.current_chars += len;

        if options.empty {
            if self.rendered_len(self.current.len() + 1, self.current_chars) > self.max_size {
                // the page break stands in for the blank line
                self.close_page();
            } else {
                self.current.push(String::new());
            }
        }

        Ok(())
    }

    /// Closes the open page, if it has any lines.
    pub fn close_page(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let lines = std::mem::take(&mut self.current);
        self.pages.push(self.render(&lines));
        self.current_chars = 0;
    }

    /// Discards all content.
    pub fn clear(&mut self) {
        self.current.clear();
        self.current_chars = 0;
        self.pages.clear();
    }

    /// Closed pages plus the open page if it has content.
    #[must_use]
    pub fn pages(&self) -> Vec<String> {
        let mut pages = self.pages.clone();
        if !self.current.is_empty() {
            pages.push(self.render(&self.current));
        }
        pages
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len() + usize::from(!self.current.is_empty())
    }

    /// A page with no lines, for displaying an empty paginator.
    #[must_use]
    pub fn blank_page(&self) -> String {
        if self.prefix.is_empty() && self.suffix.is_empty() {
            "\u{200b}".to_string()
        } else {
            self.render(&["\u{200b}".to_string()])
        }
    }

    fn render(&self, lines: &[String]) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(lines.len() + 2);
        if !self.prefix.is_empty() {
            parts.push(&self.prefix);
        }
        parts.extend(lines.iter().map(String::as_str));
        if !self.suffix.is_empty() {
            parts.push(&self.suffix);
        }
        parts.join(LINESEP)
    }

    fn rendered_len(&self, lines: usize, content_chars: usize) -> usize {
        let prefix = self.prefix.chars().count();
        let suffix = self.suffix.chars().count();
        let parts = lines + usize::from(prefix > 0) + usize::from(suffix > 0);
        prefix + suffix + content_chars + parts.saturating_sub(1) * LINESEP.len()
    }
}

/// Splits `line` into pieces of at most `width` characters.
#[must_use]
pub fn hard_wrap(line: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    chars
        .chunks(width.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Adds `line` through `add`, cutting it into fixed-width pieces when it
/// cannot be wrapped on a delimiter.
pub fn add_with_fallback<F>(line: &str, mut add: F) -> Result<()>
where
    F: FnMut(&str) -> Result<()>,
{
    match add(line) {
        Err(Error::LineTooLong { max }) if max > 0 => {
            for piece in hard_wrap(line, max) {
                add(&piece)?;
            }
            Ok(())
        }
        other => other,
    }
}

/// Byte offset of the `chars`-th character, or the string length.
fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(offset, _)| offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inner_lines(page: &str) -> Vec<String> {
        let inner = page
            .strip_prefix("```\n")
            .and_then(|rest| rest.strip_suffix("\n```"))
            .expect("page is fenced");
        inner.split('\n').map(str::to_string).collect()
    }

    fn assert_pages_fit(paginator: &Paginator) {
        for page in paginator.pages() {
            assert!(
                page.chars().count() <= paginator.max_size(),
                "page of {} chars exceeds {}",
                page.chars().count(),
                paginator.max_size()
            );
        }
    }

    #[test]
    fn test_hard_wrap_respects_char_boundaries() {
        assert_eq!(hard_wrap("ééééé", 2), vec!["éé", "éé", "é"]);
        assert_eq!(hard_wrap("", 4), Vec::<String>::new());
    }

    #[test]
    fn test_unbreakable_lines_are_cut_to_fit() -> Result<()> {
        let mut paginator = Paginator::wrapped("```", "```", 30);
        let line = "z".repeat(50);
        add_with_fallback(&line, |piece| paginator.add_line(piece))?;

        let pages = paginator.pages();
        assert!(pages.iter().all(|page| page.chars().count() <= 30));
        let joined: String = pages
            .iter()
            .map(|page| page.trim_start_matches("```\n").trim_end_matches("\n```"))
            .collect();
        assert_eq!(joined, line);
        Ok(())
    }

    #[test]
    fn test_other_errors_pass_through() {
        let result = add_with_fallback("x", |_| Err(Error::Cancelled));
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_five_thousand_chars_make_three_pages() -> Result<()> {
        let mut paginator = Paginator::new("```", "```", 2000);
        for _ in 0..50 {
            paginator.add_line(&"a".repeat(100))?;
            assert_pages_fit(&paginator);
        }

        let pages = paginator.pages();
        assert_eq!(pages.len(), 3);
        assert!(!inner_lines(&pages[2]).is_empty());
        let total: usize = pages.iter().map(|p| inner_lines(p).concat().len()).sum();
        assert_eq!(total, 5000);
        Ok(())
    }

    #[test]
    fn test_page_layout_uses_prefix_and_suffix() -> Result<()> {
        let mut paginator = Paginator::new("```py", "```", 100);
        paginator.add_line("x = 1")?;
        paginator.add_line("y = 2")?;
        assert_eq!(paginator.pages(), vec!["```py\nx = 1\ny = 2\n```".to_string()]);
        Ok(())
    }

    #[test]
    fn test_empty_prefix_and_suffix_are_omitted() -> Result<()> {
        let mut paginator = Paginator::new("", "", 20);
        paginator.add_line("hello")?;
        assert_eq!(paginator.pages(), vec!["hello".to_string()]);
        assert_eq!(paginator.max_line_len(), 20);
        Ok(())
    }

    #[test]
    fn test_line_too_long_without_wrapping() {
        let mut paginator = Paginator::new("```", "```", 2000);
        let result = paginator.add_line(&"b".repeat(3000));
        assert!(matches!(result, Err(Error::LineTooLong { max: 1992 })));
        assert_eq!(paginator.page_count(), 0);
    }

    #[test]
    fn test_line_exactly_at_limit_fits() -> Result<()> {
        let mut paginator = Paginator::new("```", "```", 50);
        let max = paginator.max_line_len();
        paginator.add_line(&"c".repeat(max))?;
        assert_eq!(paginator.pages()[0].chars().count(), 50);
        Ok(())
    }

    #[test]
    fn test_wrapped_long_line_keeps_content() -> Result<()> {
        let words: Vec<String> = (0..1000).map(|i| format!("w{i}")).collect();
        let text = words.join(" ");
        let mut paginator = Paginator::wrapped("```", "```", 2000);
        paginator.add_line(&text)?;
        assert_pages_fit(&paginator);

        let rebuilt: String = paginator
            .pages()
            .iter()
            .flat_map(|page| inner_lines(page))
            .collect();
        assert_eq!(rebuilt, text);
        assert!(paginator.page_count() >= 3);
        Ok(())
    }

    #[test]
    fn test_wrapped_without_included_delimiter_drops_it() -> Result<()> {
        let mut paginator = Paginator::new("```", "```", 20).with_wrap(WrapOptions {
            wrap_on: vec![" ".to_string()],
            include_wrapped: false,
        });
        paginator.add_line("aaaa bbbb cccc dddd eeee")?;
        assert_pages_fit(&paginator);

        let lines: Vec<String> = paginator
            .pages()
            .iter()
            .flat_map(|page| inner_lines(page))
            .collect();
        assert_eq!(lines.join(" "), "aaaa bbbb cccc dddd eeee");
        Ok(())
    }

    #[test]
    fn test_wrapped_prefers_newline_over_space() -> Result<()> {
        let mut paginator = Paginator::wrapped("", "", 12);
        paginator.add_line("ab cd\nef gh ij")?;
        let pages = paginator.pages();
        assert_eq!(pages[0], "ab cd");
        Ok(())
    }

    #[test]
    fn test_wrapped_without_delimiter_is_rejected() {
        let mut paginator = Paginator::wrapped("```", "```", 30);
        let result = paginator.add_line(&"z".repeat(80));
        assert!(matches!(result, Err(Error::LineTooLong { .. })));

        // a splittable head is not kept when the tail cannot be placed
        let result = paginator.add_line(&format!("head {}", "z".repeat(80)));
        assert!(matches!(result, Err(Error::LineTooLong { max: 22 })));
        assert_eq!(paginator.page_count(), 0);
    }

    #[test]
    fn test_force_new_page_and_empty_lines() -> Result<()> {
        let mut paginator = Paginator::new("```", "```", 200);
        paginator.add_line_with(
            "first",
            LineOptions {
                empty: true,
                force_new_page: false,
            },
        )?;
        paginator.add_line_with(
            "second",
            LineOptions {
                empty: false,
                force_new_page: true,
            },
        )?;
        let pages = paginator.pages();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], "```\nfirst\n\n```");
        assert_eq!(pages[1], "```\nsecond\n```");
        Ok(())
    }

    #[test]
    fn test_multibyte_characters_count_once() -> Result<()> {
        let mut paginator = Paginator::wrapped("", "", 10);
        paginator.add_line("ééééé ééééé ééééé")?;
        for page in paginator.pages() {
            assert!(page.chars().count() <= 10);
        }
        Ok(())
    }

    #[test]
    fn test_blank_page_and_clear() -> Result<()> {
        let mut paginator = Paginator::new("```", "```", 100);
        assert_eq!(paginator.blank_page(), "```\n\u{200b}\n```");
        paginator.add_line("gone")?;
        paginator.clear();
        assert!(paginator.pages().is_empty());
        Ok(())
    }
}
