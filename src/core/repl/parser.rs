//! Compiles REPL fragments into a [`Program`].
//!
//! A fragment made of one bare expression compiles to [`Shape::Expression`];
//! anything else is a statement body that runs as one implicitly async unit,
//! so `await` is legal at the top level of both shapes.

use super::error::SyntaxError;
use super::lexer::{Tok, Token, tokenize};
use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Logic(LogicOp, Box<Expr>, Box<Expr>),
    /// A possibly chained comparison such as `a < b <= c`.
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    Call(Box<Expr>, Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Await(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assign(String, Expr),
    Return(Option<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Expression(Expr),
    Body(Vec<Stmt>),
}

/// A compiled fragment, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub shape: Shape,
}

/// Turns source text into a [`Program`].
pub trait Compiler: Send + Sync {
    fn compile(&self, source: &str) -> Result<Program, SyntaxError>;
}

/// The built-in compiler for the fragment language.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptCompiler;

impl Compiler for ScriptCompiler {
    fn compile(&self, source: &str) -> Result<Program, SyntaxError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
            lines: source.lines().collect(),
        };
        let statements = parser.statements()?;

        let shape = match <[Stmt; 1]>::try_from(statements) {
            Ok([Stmt::Expr(expr)]) => Shape::Expression(expr),
            Ok(single) => Shape::Body(single.into()),
            Err(statements) => Shape::Body(statements),
        };
        Ok(Program { shape })
    }
}

const RESERVED: [&str; 23] = [
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "for", "from", "if", "import", "in", "lambda", "not", "or", "return",
    "while",
];

/// Deepest expression nesting a fragment may use.
pub const MAX_NESTING: usize = 200;

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    /// Nesting of the expression under construction.
    depth: usize,
    lines: Vec<&'a str>,
}

impl Parser<'_> {
    fn current(&self) -> &Token {
        // the lexer always terminates the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_tok(&self, offset: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + offset).map(|token| &token.tok)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(&self.current().tok, Tok::Op(current) if *current == op)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(&self.current().tok, Tok::Name(name) if name == keyword)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        let matched = self.at_op(op);
        if matched {
            self.advance();
        }
        matched
    }

    fn error_at(&self, line: usize, column: usize, message: impl Into<String>) -> SyntaxError {
        let text = self
            .lines
            .get(line.saturating_sub(1))
            .copied()
            .unwrap_or_default();
        SyntaxError::new(message, text, line, column)
    }

    fn unexpected(&self) -> SyntaxError {
        let token = self.current();
        let message = match &token.tok {
            Tok::Eof => "unexpected EOF while parsing",
            _ => "invalid syntax",
        };
        self.error_at(token.line, token.column, message)
    }

    /// Goes one level deeper, failing past [`MAX_NESTING`].
    ///
    /// Callers restore `depth` on success; a failure ends the parse.
    fn nest(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            let token = self.current();
            return Err(self.error_at(token.line, token.column, "too many nested parentheses"));
        }
        Ok(())
    }

    fn expect_op(&mut self, op: &str) -> Result<(), SyntaxError> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn skip_newlines(&mut self) {
        while self.current().tok == Tok::Newline {
            self.advance();
        }
    }

    fn statements(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut statements = Vec::new();
        self.skip_newlines();

        while self.current().tok != Tok::Eof {
            statements.push(self.statement()?);
            match self.current().tok {
                Tok::Newline => self.skip_newlines(),
                Tok::Eof => break,
                _ => return Err(self.unexpected()),
            }
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Stmt, SyntaxError> {
        if self.at_keyword("return") {
            self.advance();
            if matches!(self.current().tok, Tok::Newline | Tok::Eof) {
                return Ok(Stmt::Return(None));
            }
            return Ok(Stmt::Return(Some(self.expression()?)));
        }

        let (line, column) = (self.current().line, self.current().column);
        let expr = self.expression()?;
        if !self.at_op("=") {
            return Ok(Stmt::Expr(expr));
        }

        match expr {
            Expr::Name(name) => {
                self.advance();
                Ok(Stmt::Assign(name, self.expression()?))
            }
            _ => Err(self.error_at(line, column, "cannot assign to expression")),
        }
    }

    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        self.or()
    }

    fn or(&mut self) -> Result<Expr, SyntaxError> {
        let depth = self.depth;
        let mut lhs = self.and()?;
        while self.at_keyword("or") {
            self.advance();
            self.nest()?;
            let rhs = self.and()?;
            lhs = Expr::Logic(LogicOp::Or, Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, SyntaxError> {
        let depth = self.depth;
        let mut lhs = self.not()?;
        while self.at_keyword("and") {
            self.advance();
            self.nest()?;
            let rhs = self.not()?;
            lhs = Expr::Logic(LogicOp::And, Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr, SyntaxError> {
        if self.at_keyword("not") {
            self.advance();
            self.nest()?;
            let operand = self.not()?;
            self.depth -= 1;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        let first = self.arith()?;
        let mut rest = Vec::new();

        loop {
            let op = match &self.current().tok {
                Tok::Op("==") => CmpOp::Eq,
                Tok::Op("!=") => CmpOp::Ne,
                Tok::Op("<") => CmpOp::Lt,
                Tok::Op("<=") => CmpOp::Le,
                Tok::Op(">") => CmpOp::Gt,
                Tok::Op(">=") => CmpOp::Ge,
                _ => break,
            };
            self.advance();
            rest.push((op, self.arith()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn arith(&mut self) -> Result<Expr, SyntaxError> {
        let depth = self.depth;
        let mut lhs = self.term()?;
        loop {
            let op = match &self.current().tok {
                Tok::Op("+") => BinOp::Add,
                Tok::Op("-") => BinOp::Sub,
                _ => break,
            };
            self.advance();
            self.nest()?;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, SyntaxError> {
        let depth = self.depth;
        let mut lhs = self.unary()?;
        loop {
            let op = match &self.current().tok {
                Tok::Op("*") => BinOp::Mul,
                Tok::Op("/") => BinOp::Div,
                Tok::Op("//") => BinOp::FloorDiv,
                Tok::Op("%") => BinOp::Mod,
                _ => break,
            };
            self.advance();
            self.nest()?;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match &self.current().tok {
            Tok::Op("-") => UnaryOp::Neg,
            Tok::Op("+") => UnaryOp::Pos,
            _ => return self.power(),
        };
        self.advance();
        self.nest()?;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn power(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.await_expr()?;
        if self.eat_op("**") {
            self.nest()?;
            let exponent = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn await_expr(&mut self) -> Result<Expr, SyntaxError> {
        if self.at_keyword("await") {
            self.advance();
            return Ok(Expr::Await(Box::new(self.postfix()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let depth = self.depth;
        let mut expr = self.atom()?;
        loop {
            if self.eat_op("(") {
                self.nest()?;
                let args = self.sequence(")")?;
                expr = Expr::Call(Box::new(expr), args);
            } else if self.eat_op("[") {
                self.nest()?;
                let index = self.expression()?;
                self.expect_op("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                break;
            }
        }
        self.depth = depth;
        Ok(expr)
    }

    /// Comma-separated expressions up to `close`, allowing a trailing comma.
    fn sequence(&mut self, close: &str) -> Result<Vec<Expr>, SyntaxError> {
        let mut items = Vec::new();
        while !self.eat_op(close) {
            items.push(self.expression()?);
            if !self.eat_op(",") {
                self.expect_op(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn atom(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.current().clone();
        match token.tok {
            Tok::Int(i) => {
                self.advance();
                Ok(Expr::Literal(Value::Int(i)))
            }
            Tok::Float(f) => {
                self.advance();
                Ok(Expr::Literal(Value::Float(f)))
            }
            Tok::Str(mut text) => {
                self.advance();
                // adjacent literals concatenate
                while let Some(Tok::Str(next)) = self.peek_tok(0) {
                    text.push_str(next);
                    self.advance();
                }
                Ok(Expr::Literal(Value::Str(text)))
            }
            Tok::Name(name) => {
                let literal = match name.as_str() {
                    "True" => Some(Value::Bool(true)),
                    "False" => Some(Value::Bool(false)),
                    "None" => Some(Value::None),
                    reserved if RESERVED.contains(&reserved) => {
                        return Err(self.error_at(token.line, token.column, "invalid syntax"));
                    }
                    _ => None,
                };
                self.advance();
                Ok(literal.map_or(Expr::Name(name), Expr::Literal))
            }
            Tok::Op("(") => {
                self.advance();
                self.nest()?;
                let inner = self.expression()?;
                self.expect_op(")")?;
                self.depth -= 1;
                Ok(inner)
            }
            Tok::Op("[") => {
                self.advance();
                self.nest()?;
                let items = self.sequence("]")?;
                self.depth -= 1;
                Ok(Expr::List(items))
            }
            _ => Err(self.unexpected()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Result<Program, SyntaxError> {
        ScriptCompiler.compile(source)
    }

    #[test]
    fn test_single_expression_shape() {
        let program = compile("1 + 2 * 3").expect("compiles");
        assert_eq!(
            program.shape,
            Shape::Expression(Expr::Binary(
                BinOp::Add,
                Box::new(Expr::Literal(Value::Int(1))),
                Box::new(Expr::Binary(
                    BinOp::Mul,
                    Box::new(Expr::Literal(Value::Int(2))),
                    Box::new(Expr::Literal(Value::Int(3))),
                )),
            ))
        );
    }

    #[test]
    fn test_statements_compile_to_body() {
        let program = compile("x = 1\nprint(x)\nreturn x").expect("compiles");
        let Shape::Body(statements) = program.shape else {
            panic!("expected a body");
        };
        assert_eq!(statements.len(), 3);
        assert!(matches!(&statements[0], Stmt::Assign(name, _) if name == "x"));
        assert!(matches!(&statements[2], Stmt::Return(Some(Expr::Name(_)))));
    }

    #[test]
    fn test_power_binds_tighter_than_unary_minus() {
        let program = compile("-2 ** 2").expect("compiles");
        assert!(matches!(
            program.shape,
            Shape::Expression(Expr::Unary(UnaryOp::Neg, _))
        ));
    }

    #[test]
    fn test_top_level_await_is_accepted() {
        let program = compile("await sleep(0)").expect("compiles");
        assert!(matches!(program.shape, Shape::Expression(Expr::Await(_))));
    }

    #[test]
    fn test_syntax_errors_carry_position() {
        let error = compile("x = = 1").expect_err("invalid");
        assert_eq!(error.message, "invalid syntax");
        assert_eq!((error.line, error.column), (1, 5));

        let error = compile("1 + 2 = x").expect_err("invalid target");
        assert_eq!(error.message, "cannot assign to expression");

        let error = compile("ok = 1\nfor i in x").expect_err("unsupported");
        assert_eq!(error.line, 2);
        assert_eq!(error.text, "for i in x");
    }

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        let source = format!("{}1{}", "(".repeat(1000), ")".repeat(1000));
        let error = compile(&source).expect_err("too deep");
        assert_eq!(error.message, "too many nested parentheses");

        let error = compile(&format!("{}1", "-".repeat(1999))).expect_err("too deep");
        assert_eq!(error.message, "too many nested parentheses");

        let error = compile(&format!("1{}", "+1".repeat(1000))).expect_err("too long");
        assert_eq!(error.message, "too many nested parentheses");
    }

    #[test]
    fn test_moderate_nesting_still_compiles() {
        let source = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert!(compile(&source).is_ok());
        assert!(compile(&format!("1{}", "+1".repeat(100))).is_ok());
        assert!(compile(&format!("x = {}1{}", "[".repeat(50), "]".repeat(50))).is_ok());
    }

    #[test]
    fn test_empty_source_is_an_empty_body() {
        assert_eq!(compile("\n\n").expect("compiles").shape, Shape::Body(Vec::new()));
    }
}
