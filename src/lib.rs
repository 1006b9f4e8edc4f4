pub mod ast;
pub mod global;
pub mod logger;
pub mod runtime;
pub mod utils;
pub mod values;

pub use crate::ast::EidosScript;
pub use crate::global::context::{teardown, warmup};
pub use crate::global::termination::{EidosError, EidosResult, ErrorKind, TerminationMode};
pub use crate::runtime::interpreter::Interpreter;
pub use crate::values::{EidosValue, ValueRef};
