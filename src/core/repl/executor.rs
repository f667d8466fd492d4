//! Lazy evaluation of compiled REPL fragments.
//!
//! [`AsyncCodeExecutor`] runs one statement at a time, only when the caller
//! pulls the next value. Output produced before a failure is delivered first;
//! the failure follows as the final item.

use super::error::RuntimeError;
use super::parser::{BinOp, CmpOp, Compiler, Expr, LogicOp, Program, ScriptCompiler, Shape, Stmt, UnaryOp};
use super::scope::Scope;
use super::value::Value;
use crate::errors::Result;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

const MAX_SEQUENCE_LEN: usize = 1_000_000;

/// Deepest expression tree [`Machine::eval`] will walk.
const MAX_EVAL_DEPTH: usize = 500;

type EvalFuture<'a> = Pin<Box<dyn Future<Output = std::result::Result<Value, RuntimeError>> + Send + 'a>>;

/// Executes a fragment against a scope, yielding each produced value.
pub struct AsyncCodeExecutor {
    machine: Machine,
    expression: Option<Expr>,
    statements: VecDeque<Stmt>,
    failure: Option<RuntimeError>,
    finished: bool,
}

impl AsyncCodeExecutor {
    /// Compiles `source` with the built-in [`ScriptCompiler`].
    pub fn new(source: &str, scope: Scope) -> Result<Self> {
        Self::with_compiler(&ScriptCompiler, source, scope)
    }

    pub fn with_compiler(compiler: &impl Compiler, source: &str, scope: Scope) -> Result<Self> {
        let program = compiler.compile(source)?;
        Ok(Self::from_program(program, scope))
    }

    #[must_use]
    pub fn from_program(program: Program, scope: Scope) -> Self {
        let (expression, statements) = match program.shape {
            Shape::Expression(expr) => (Some(expr), VecDeque::new()),
            Shape::Body(statements) => (None, statements.into()),
        };
        Self {
            machine: Machine {
                scope,
                output: VecDeque::new(),
                depth: 0,
            },
            expression,
            statements,
            failure: None,
            finished: false,
        }
    }

    /// Binds extra globals, such as the invocation context, for this run.
    #[must_use]
    pub fn with_arguments(mut self, arguments: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.machine.scope.update_globals(arguments);
        self
    }

    /// Runs until the next value is produced.
    ///
    /// Returns `None` once the fragment has finished. A runtime failure is
    /// returned after any values produced before it, and ends the sequence.
    pub async fn next_value(&mut self) -> Option<Result<Value>> {
        loop {
            if let Some(value) = self.machine.output.pop_front() {
                return Some(Ok(value));
            }
            if let Some(failure) = self.failure.take() {
                return Some(Err(failure.into()));
            }
            if self.finished {
                return None;
            }

            if let Some(expr) = self.expression.take() {
                self.finished = true;
                match self.machine.eval(&expr).await {
                    Ok(value) => self.machine.output.push_back(value),
                    Err(e) => self.failure = Some(e),
                }
                continue;
            }

            let Some(statement) = self.statements.pop_front() else {
                self.finished = true;
                continue;
            };
            match self.machine.execute(statement).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Return(value)) => {
                    self.machine.output.push_back(value);
                    self.finished = true;
                }
                Err(e) => {
                    debug!("Fragment raised {e}");
                    self.failure = Some(e);
                    self.finished = true;
                }
            }
        }
    }

    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.machine.scope
    }

    /// The scope including every binding the fragment created.
    #[must_use]
    pub fn into_scope(self) -> Scope {
        self.machine.scope
    }
}

enum Flow {
    Continue,
    Return(Value),
}

struct Machine {
    scope: Scope,
    /// Values waiting to be pulled, in production order.
    output: VecDeque<Value>,
    depth: usize,
}

impl Machine {
    async fn execute(&mut self, statement: Stmt) -> std::result::Result<Flow, RuntimeError> {
        match statement {
            Stmt::Expr(expr) => {
                let value = self.eval(&expr).await?;
                if !value.is_none() {
                    self.output.push_back(value);
                }
                Ok(Flow::Continue)
            }
            Stmt::Assign(name, expr) => {
                let value = self.eval(&expr).await?;
                self.scope.locals.insert(name, value);
                Ok(Flow::Continue)
            }
            Stmt::Return(None) => Ok(Flow::Return(Value::None)),
            Stmt::Return(Some(expr)) => Ok(Flow::Return(self.eval(&expr).await?)),
        }
    }

    fn eval<'a>(&'a mut self, expr: &'a Expr) -> EvalFuture<'a> {
        Box::pin(async move {
            if self.depth >= MAX_EVAL_DEPTH {
                return Err(RuntimeError::new("RecursionError", "maximum recursion depth exceeded"));
            }
            self.depth += 1;
            let result = self.eval_node(expr).await;
            self.depth -= 1;
            result
        })
    }

    async fn eval_node(&mut self, expr: &Expr) -> std::result::Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Name(name) => match self.scope.get(name) {
                Some(value) => Ok(value.clone()),
                None if Builtin::lookup(name).is_some() => {
                    Ok(Value::Str(format!("<built-in function {name}>")))
                }
                None => Err(RuntimeError::name(name)),
            },
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item).await?);
                }
                Ok(Value::List(values))
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand).await?;
                unary(*op, &value)
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs).await?;
                let rhs = self.eval(rhs).await?;
                binary(*op, &lhs, &rhs)
            }
            Expr::Logic(op, lhs, rhs) => {
                let lhs = self.eval(lhs).await?;
                match (op, lhs.truthy()) {
                    (LogicOp::And, false) | (LogicOp::Or, true) => Ok(lhs),
                    _ => self.eval(rhs).await,
                }
            }
            Expr::Compare(first, rest) => {
                let mut lhs = self.eval(first).await?;
                for (op, rhs) in rest {
                    let rhs = self.eval(rhs).await?;
                    if !compare(*op, &lhs, &rhs)? {
                        return Ok(Value::Bool(false));
                    }
                    lhs = rhs;
                }
                Ok(Value::Bool(true))
            }
            Expr::Index(target, index) => {
                let target = self.eval(target).await?;
                let index = self.eval(index).await?;
                target.index(&index)
            }
            Expr::Call(callee, args) => self.call(callee, args, false).await,
            Expr::Await(inner) => match inner.as_ref() {
                Expr::Call(callee, args) => self.call(callee, args, true).await,
                other => {
                    let value = self.eval(other).await?;
                    Err(not_awaitable(&value))
                }
            },
        }
    }

    async fn call(&mut self, callee: &Expr, args: &[Expr], awaited: bool) -> std::result::Result<Value, RuntimeError> {
        let builtin = match callee {
            Expr::Name(name) if self.scope.get(name).is_none() => {
                Builtin::lookup(name).ok_or_else(|| RuntimeError::name(name))?
            }
            other => {
                let value = self.eval(other).await?;
                return Err(RuntimeError::type_error(format!(
                    "'{}' object is not callable",
                    value.type_name()
                )));
            }
        };

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg).await?);
        }

        if builtin == Builtin::Sleep {
            if !awaited {
                return Err(RuntimeError::new(
                    "RuntimeWarning",
                    "coroutine 'sleep' was never awaited",
                ));
            }
            let delay = sleep_duration(&values)?;
            tokio::time::sleep(delay).await;
            return Ok(Value::None);
        }

        let value = builtin.apply(values, &mut self.output)?;
        if awaited {
            return Err(not_awaitable(&value));
        }
        Ok(value)
    }
}

fn not_awaitable(value: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "object {} can't be used in 'await' expression",
        value.type_name()
    ))
}

fn sleep_duration(args: &[Value]) -> std::result::Result<Duration, RuntimeError> {
    let [delay] = args else {
        return Err(arity("sleep", 1, args.len()));
    };
    let seconds = delay
        .as_float()
        .ok_or_else(|| RuntimeError::type_error("sleep() requires a number"))?;
    if seconds < 0.0 {
        return Err(RuntimeError::new("ValueError", "sleep length must be non-negative"));
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| RuntimeError::new("OverflowError", "sleep length is too large"))
}

fn arity(name: &str, expected: usize, given: usize) -> RuntimeError {
    RuntimeError::type_error(format!(
        "{name}() takes exactly {expected} argument{} ({given} given)",
        if expected == 1 { "" } else { "s" }
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Print,
    Len,
    Str,
    Repr,
    Int,
    Float,
    Type,
    Abs,
    Range,
    Sum,
    Min,
    Max,
    Sleep,
}

impl Builtin {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "print" => Self::Print,
            "len" => Self::Len,
            "str" => Self::Str,
            "repr" => Self::Repr,
            "int" => Self::Int,
            "float" => Self::Float,
            "type" => Self::Type,
            "abs" => Self::Abs,
            "range" => Self::Range,
            "sum" => Self::Sum,
            "min" => Self::Min,
            "max" => Self::Max,
            "sleep" => Self::Sleep,
            _ => return None,
        })
    }

    fn apply(self, args: Vec<Value>, output: &mut VecDeque<Value>) -> std::result::Result<Value, RuntimeError> {
        match self {
            Self::Print => {
                let line: Vec<String> = args.iter().map(ToString::to_string).collect();
                output.push_back(Value::Str(line.join(" ")));
                Ok(Value::None)
            }
            Self::Len => {
                let value = single("len", args)?;
                let len = value.len().ok_or_else(|| {
                    RuntimeError::type_error(format!(
                        "object of type '{}' has no len()",
                        value.type_name()
                    ))
                })?;
                i64::try_from(len).map(Value::Int).map_err(|_| RuntimeError::overflow())
            }
            Self::Str => Ok(Value::Str(
                optional("str", args)?.map(|v| v.to_string()).unwrap_or_default(),
            )),
            Self::Repr => Ok(Value::Str(single("repr", args)?.repr())),
            Self::Int => match optional("int", args)? {
                None => Ok(Value::Int(0)),
                Some(value) => to_int(&value),
            },
            Self::Float => match optional("float", args)? {
                None => Ok(Value::Float(0.0)),
                Some(Value::Str(text)) => text.trim().parse().map(Value::Float).map_err(|_| {
                    RuntimeError::new(
                        "ValueError",
                        format!("could not convert string to float: {}", Value::Str(text.clone()).repr()),
                    )
                }),
                Some(value) => value.as_float().map(Value::Float).ok_or_else(|| {
                    RuntimeError::type_error(format!(
                        "float() argument must be a string or a number, not '{}'",
                        value.type_name()
                    ))
                }),
            },
            Self::Type => Ok(Value::Str(format!(
                "<class '{}'>",
                single("type", args)?.type_name()
            ))),
            Self::Abs => match single("abs", args)? {
                Value::Float(f) => Ok(Value::Float(f.abs())),
                value => value
                    .as_int()
                    .ok_or_else(|| bad_operand("abs()", &value))?
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(RuntimeError::overflow),
            },
            Self::Range => range(&args),
            Self::Sum => {
                let items = match single("sum", args)? {
                    Value::List(items) => items,
                    other => return Err(not_iterable(&other)),
                };
                items
                    .iter()
                    .try_fold(Value::Int(0), |total, item| binary(BinOp::Add, &total, item))
            }
            Self::Min => extreme("min", args, Ordering::Less),
            Self::Max => extreme("max", args, Ordering::Greater),
            Self::Sleep => Err(RuntimeError::new(
                "RuntimeWarning",
                "coroutine 'sleep' was never awaited",
            )),
        }
    }
}

fn single(name: &str, args: Vec<Value>) -> std::result::Result<Value, RuntimeError> {
    let given = args.len();
    let Ok([value]) = <[Value; 1]>::try_from(args) else {
        return Err(arity(name, 1, given));
    };
    Ok(value)
}

fn optional(name: &str, args: Vec<Value>) -> std::result::Result<Option<Value>, RuntimeError> {
    if args.is_empty() {
        Ok(None)
    } else {
        single(name, args).map(Some)
    }
}

fn not_iterable(value: &Value) -> RuntimeError {
    RuntimeError::type_error(format!("'{}' object is not iterable", value.type_name()))
}

fn bad_operand(operation: &str, value: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "bad operand type for {operation}: '{}'",
        value.type_name()
    ))
}

fn to_int(value: &Value) -> std::result::Result<Value, RuntimeError> {
    match value {
        Value::Float(f) if f.is_nan() => Err(RuntimeError::new(
            "ValueError",
            "cannot convert float NaN to integer",
        )),
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        Value::Float(f) if f.trunc() >= i64::MIN as f64 && f.trunc() < i64::MAX as f64 => {
            Ok(Value::Int(f.trunc() as i64))
        }
        Value::Float(_) => Err(RuntimeError::overflow()),
        Value::Str(text) => text.trim().parse().map(Value::Int).map_err(|_| {
            RuntimeError::new(
                "ValueError",
                format!("invalid literal for int() with base 10: {}", value.repr()),
            )
        }),
        other => other.as_int().map(Value::Int).ok_or_else(|| {
            RuntimeError::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

fn range(args: &[Value]) -> std::result::Result<Value, RuntimeError> {
    let ints = args
        .iter()
        .map(|arg| {
            arg.as_int().ok_or_else(|| {
                RuntimeError::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    arg.type_name()
                ))
            })
        })
        .collect::<std::result::Result<Vec<i64>, _>>()?;

    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => {
            return Err(RuntimeError::type_error(format!(
                "range expected 1 to 3 arguments, got {}",
                ints.len()
            )));
        }
    };
    if step == 0 {
        return Err(RuntimeError::new("ValueError", "range() arg 3 must not be zero"));
    }

    let mut values = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        if values.len() >= MAX_SEQUENCE_LEN {
            return Err(RuntimeError::new("MemoryError", "range is too large to materialize"));
        }
        values.push(Value::Int(current));
        let Some(next) = current.checked_add(step) else {
            break;
        };
        current = next;
    }
    Ok(Value::List(values))
}

fn extreme(name: &str, args: Vec<Value>, wanted: Ordering) -> std::result::Result<Value, RuntimeError> {
    let items = match <[Value; 1]>::try_from(args) {
        Ok([Value::List(items)]) => items,
        Ok([other]) => return Err(not_iterable(&other)),
        Err(args) => args,
    };

    let mut items = items.into_iter();
    let Some(mut best) = items.next() else {
        return Err(RuntimeError::new(
            "ValueError",
            format!("{name}() arg is an empty sequence"),
        ));
    };
    for item in items {
        if order(&item, &best, "<")? == wanted {
            best = item;
        }
    }
    Ok(best)
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Int(i64::from(*b))),
            Value::Int(i) => Some(Self::Int(*i)),
            Value::Float(f) => Some(Self::Float(*f)),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn float(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

fn unary(op: UnaryOp, value: &Value) -> std::result::Result<Value, RuntimeError> {
    match (op, Num::of(value)) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!value.truthy())),
        (UnaryOp::Neg, Some(Num::Int(i))) => i.checked_neg().map(Value::Int).ok_or_else(RuntimeError::overflow),
        (UnaryOp::Neg, Some(Num::Float(f))) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Some(Num::Int(i))) => Ok(Value::Int(i)),
        (UnaryOp::Pos, Some(Num::Float(f))) => Ok(Value::Float(f)),
        (UnaryOp::Neg, None) => Err(bad_operand("unary -", value)),
        (UnaryOp::Pos, None) => Err(bad_operand("unary +", value)),
    }
}

const fn symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
        BinOp::Pow => "**",
    }
}

fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> std::result::Result<Value, RuntimeError> {
    if let (Some(a), Some(b)) = (Num::of(lhs), Num::of(rhs)) {
        return match (a, b) {
            (Num::Int(a), Num::Int(b)) => int_arith(op, a, b),
            _ => float_arith(op, a.float(), b.float()),
        };
    }

    match (op, lhs, rhs) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (BinOp::Mul, Value::Str(_) | Value::List(_), count) | (BinOp::Mul, count, Value::Str(_) | Value::List(_))
            if count.as_int().is_some() =>
        {
            let (sequence, count) = if lhs.as_int().is_some() { (rhs, lhs) } else { (lhs, rhs) };
            repeat(sequence, count.as_int().unwrap_or_default())
        }
        _ => Err(RuntimeError::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            symbol(op),
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

fn repeat(sequence: &Value, count: i64) -> std::result::Result<Value, RuntimeError> {
    let count = usize::try_from(count).unwrap_or(0);
    let len = sequence.len().unwrap_or(0);
    if len.saturating_mul(count) > MAX_SEQUENCE_LEN {
        return Err(RuntimeError::new("MemoryError", "repeated sequence is too large"));
    }
    match sequence {
        Value::Str(s) => Ok(Value::Str(s.repeat(count))),
        Value::List(items) => Ok(Value::List(
            std::iter::repeat_n(items, count).flatten().cloned().collect(),
        )),
        other => Ok(other.clone()),
    }
}

fn int_arith(op: BinOp, a: i64, b: i64) -> std::result::Result<Value, RuntimeError> {
    let checked = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(RuntimeError::zero_division());
            }
            #[allow(clippy::cast_precision_loss)]
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinOp::FloorDiv | BinOp::Mod if b == 0 => {
            return Err(RuntimeError::zero_division());
        }
        BinOp::FloorDiv => a.checked_div(b).map(|q| {
            // round toward negative infinity
            if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q }
        }),
        BinOp::Mod => a.checked_rem(b).map(|r| {
            // result takes the sign of the divisor
            if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }
        }),
        BinOp::Pow => {
            if b < 0 {
                #[allow(clippy::cast_precision_loss)]
                return float_arith(op, a as f64, b as f64);
            }
            u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp))
        }
    };
    checked.map(Value::Int).ok_or_else(RuntimeError::overflow)
}

fn float_arith(op: BinOp, a: f64, b: f64) -> std::result::Result<Value, RuntimeError> {
    let zero_divisor = b == 0.0;
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div if zero_divisor => {
            return Err(RuntimeError::new("ZeroDivisionError", "float division by zero"));
        }
        BinOp::Div => a / b,
        BinOp::FloorDiv | BinOp::Mod if zero_divisor => {
            return Err(RuntimeError::new("ZeroDivisionError", "float modulo"));
        }
        BinOp::FloorDiv => (a / b).floor(),
        BinOp::Mod => {
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }
        }
        BinOp::Pow if a == 0.0 && b < 0.0 => {
            return Err(RuntimeError::new(
                "ZeroDivisionError",
                "0.0 cannot be raised to a negative power",
            ));
        }
        BinOp::Pow => a.powf(b),
    };
    Ok(Value::Float(value))
}

fn order(lhs: &Value, rhs: &Value, op: &str) -> std::result::Result<Ordering, RuntimeError> {
    let unordered = || {
        RuntimeError::type_error(format!(
            "'{op}' not supported between instances of '{}' and '{}'",
            lhs.type_name(),
            rhs.type_name()
        ))
    };

    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => match (Num::of(lhs), Num::of(rhs)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => Ok(a.cmp(&b)),
            (Some(a), Some(b)) => a.float().partial_cmp(&b.float()).ok_or_else(unordered),
            _ => Err(unordered()),
        },
    }
}

fn equal(lhs: &Value, rhs: &Value) -> bool {
    match (Num::of(lhs), Num::of(rhs)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
        #[allow(clippy::float_cmp)]
        (Some(a), Some(b)) => a.float() == b.float(),
        _ => lhs == rhs,
    }
}

fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> std::result::Result<bool, RuntimeError> {
    Ok(match op {
        CmpOp::Eq => equal(lhs, rhs),
        CmpOp::Ne => !equal(lhs, rhs),
        CmpOp::Lt => order(lhs, rhs, "<")? == Ordering::Less,
        CmpOp::Le => order(lhs, rhs, "<=")? != Ordering::Greater,
        CmpOp::Gt => order(lhs, rhs, ">")? == Ordering::Greater,
        CmpOp::Ge => order(lhs, rhs, ">=")? != Ordering::Less,
    })
}
