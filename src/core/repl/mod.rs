//! REPL execution engine: compiles fragments and evaluates them lazily
//! against a persistent or throwaway [`Scope`].

pub mod error;
pub mod executor;
pub mod inspect;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod session;
pub mod value;

pub use error::{RuntimeError, SyntaxError};
pub use executor::AsyncCodeExecutor;
pub use inspect::all_inspections;
pub use parser::{Compiler, Program, ScriptCompiler};
pub use scope::Scope;
pub use session::ReplSession;
pub use value::Value;
