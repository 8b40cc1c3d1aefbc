//! Expressions: literal vs deferred values and the expression micro-language
//!
//! - [`value`]: the [`Expr`] sum type every builder argument is coerced into
//! - [`grammar`]: the [`Term`] AST that renders `${ ... }` runtime expressions
//! - [`runtime`]: `${.secrets.KEY}` / `${.env_vars.NAME}` placeholders

pub mod grammar;
pub mod runtime;
pub mod value;

pub use grammar::{
    add, all, any, custom, decrement, divide, error_code, error_message, error_object,
    error_stack_trace, field, if_then_else, increment, interpolate, join, length, literal,
    multiply, now, subtract, task_field, to_number, to_string, var, ArithOp, CompareOp,
    LogicalOp, Term,
};
pub use runtime::{
    extract_runtime_refs, is_runtime_ref, runtime_env, runtime_secret, validate_runtime_ref,
    RuntimeRef, RuntimeScope,
};
pub use value::{resolve, Deferred, Expr, IntoExpr, Scalar};
