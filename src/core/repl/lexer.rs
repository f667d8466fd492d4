//! Tokenizer for REPL fragments.

use super::error::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Op(&'static str),
    /// Statement separator: a newline outside brackets, or `;`.
    Newline,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    /// 1-based.
    pub line: usize,
    /// 1-based, in chars.
    pub column: usize,
}

const OPERATORS: [&str; 19] = [
    "**", "//", "==", "!=", "<=", ">=", "+", "-", "*", "/", "%", "<", ">", "=", "(", ")", "[",
    "]", ",",
];

struct Lexer<'a> {
    lines: Vec<&'a str>,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    depth: usize,
    tokens: Vec<Token>,
}

/// Splits `source` into tokens ending with [`Tok::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut lexer = Lexer {
        lines: source.lines().collect(),
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
        depth: 0,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl Lexer<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>, line: usize, column: usize) -> SyntaxError {
        let text = self.lines.get(line - 1).copied().unwrap_or_default();
        SyntaxError::new(message, text, line, column)
    }

    fn push(&mut self, tok: Tok, line: usize, column: usize) {
        self.tokens.push(Token { tok, line, column });
    }

    fn run(&mut self) -> Result<(), SyntaxError> {
        while let Some(c) = self.peek() {
            let (line, column) = (self.line, self.column);
            match c {
                '\n' | ';' => {
                    self.bump();
                    if c == ';' || self.depth == 0 {
                        self.push(Tok::Newline, line, column);
                    }
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                '#' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                '\'' | '"' => {
                    let text = self.string(c, line, column)?;
                    self.push(Tok::Str(text), line, column);
                }
                c if c.is_ascii_digit() => {
                    let tok = self.number(line, column)?;
                    self.push(tok, line, column);
                }
                c if c.is_alphabetic() || c == '_' => {
                    let mut name = String::new();
                    while let Some(c) = self.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
                        name.push(c);
                        self.bump();
                    }
                    self.push(Tok::Name(name), line, column);
                }
                _ => {
                    let op = self.operator(line, column)?;
                    match op {
                        "(" | "[" => self.depth += 1,
                        ")" | "]" => self.depth = self.depth.saturating_sub(1),
                        _ => {}
                    }
                    self.push(Tok::Op(op), line, column);
                }
            }
        }

        if self.depth > 0 {
            return Err(self.error("unexpected EOF while parsing", self.line, self.column));
        }

        let (line, column) = match self.lines.last() {
            Some(last) => (self.lines.len(), last.chars().count() + 1),
            None => (1, 1),
        };
        self.push(Tok::Eof, line, column);
        Ok(())
    }

    fn operator(&mut self, line: usize, column: usize) -> Result<&'static str, SyntaxError> {
        let rest: String = self.chars[self.pos..].iter().take(2).collect();
        let Some(op) = OPERATORS.iter().copied().find(|op| rest.starts_with(op)) else {
            let c = self.peek().unwrap_or_default();
            return Err(self.error(format!("invalid character '{c}'"), line, column));
        };
        for _ in 0..op.len() {
            self.bump();
        }
        Ok(op)
    }

    fn number(&mut self, line: usize, column: usize) -> Result<Tok, SyntaxError> {
        let mut text = String::new();
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            text.push(c);
            self.bump();
        }

        let fractional = self.peek() == Some('.')
            && self.chars.get(self.pos + 1).is_some_and(char::is_ascii_digit);
        if fractional {
            text.push('.');
            self.bump();
            while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                text.push(c);
                self.bump();
            }
            return text
                .parse()
                .map(Tok::Float)
                .map_err(|_| self.error("invalid decimal literal", line, column));
        }

        text.parse()
            .map(Tok::Int)
            .map_err(|_| self.error("integer literal too large", line, column))
    }

    fn string(&mut self, quote: char, line: usize, column: usize) -> Result<String, SyntaxError> {
        self.bump();
        let mut text = String::new();

        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(self.error("unterminated string literal", line, column));
                }
                Some(c) if c == quote => return Ok(text),
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('0') => text.push('\0'),
                    Some('\n') => {}
                    Some(c @ ('\\' | '\'' | '"')) => text.push(c),
                    Some(c) => {
                        text.push('\\');
                        text.push(c);
                    }
                    None => {
                        return Err(self.error("unterminated string literal", line, column));
                    }
                },
                Some(c) => text.push(c),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Tok> {
        tokenize(source)
            .expect("tokenize")
            .into_iter()
            .map(|token| token.tok)
            .collect()
    }

    #[test]
    fn test_tokenizes_operators_and_literals() {
        assert_eq!(
            kinds("x = 2 ** 3 // 1.5"),
            vec![
                Tok::Name("x".into()),
                Tok::Op("="),
                Tok::Int(2),
                Tok::Op("**"),
                Tok::Int(3),
                Tok::Op("//"),
                Tok::Float(1.5),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn test_newlines_inside_brackets_are_ignored() {
        assert_eq!(
            kinds("[1,\n2]; y # trailing\n"),
            vec![
                Tok::Op("["),
                Tok::Int(1),
                Tok::Op(","),
                Tok::Int(2),
                Tok::Op("]"),
                Tok::Newline,
                Tok::Name("y".into()),
                Tok::Newline,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#"'a\'b' "c\n""#),
            vec![Tok::Str("a'b".into()), Tok::Str("c\n".into()), Tok::Eof]
        );
    }

    #[test]
    fn test_errors_point_at_offending_column() {
        let error = tokenize("x = 1 $ 2").expect_err("invalid character");
        assert_eq!((error.line, error.column), (1, 7));
        assert_eq!(error.text, "x = 1 $ 2");

        let error = tokenize("print('oops)").expect_err("unterminated");
        assert_eq!(error.message, "unterminated string literal");
        assert_eq!(error.column, 7);
    }
}
