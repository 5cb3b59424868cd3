//! Tree node types: expressions, operators, and declaration items.

mod expr;
mod items;
mod operators;

pub use expr::{CallArg, Expr, ExprKind, WhenBranch};
pub use items::{Function, FunctionFlags, Module, Param, SourceId};
pub use operators::{BinaryOp, UnaryOp};
