//! Expression micro-language
//!
//! A small AST for the jq-flavoured runtime expressions the engine evaluates.
//! Builders compose [`Term`]s; rendering happens in one place so every
//! expression shape is produced the same way:
//!
//! | Term                  | Renders as                       |
//! |-----------------------|----------------------------------|
//! | `var("x")`            | `$context.x`                     |
//! | `task_field("t","a")` | `$context["t"].a`                |
//! | `field("a.b")`        | `.a.b`                           |
//! | `literal("s")`        | `"s"`                            |
//! | `a.equals(b)`         | `a == b`                         |
//! | `a.and(b)`            | `a && b`                         |
//! | `!a`                  | `!(a)`                           |
//! | `length(a)`           | `a \| length`                    |
//!
//! [`Term::expression`] wraps the rendered body as `${ ... }`.

use std::fmt;
use std::ops;

use serde_json::Value;

use super::value::{is_placeholder, Deferred, Expr, IntoExpr, Scalar};
use crate::task::FieldRef;

// ============================================================================
// OPERATORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            ArithOp::Add | ArithOp::Sub => 1,
            ArithOp::Mul | ArithOp::Div => 2,
        }
    }
}

// ============================================================================
// TERM
// ============================================================================

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Quoted literal scalar
    Literal(Scalar),
    /// Build-time known JSON (objects, arrays)
    Known(Value),
    /// `$context.<name>`
    ContextVar(String),
    /// `$context["<task>"].<path>`
    TaskField { task: String, path: String },
    /// `.<path>` on the current data
    Path(String),
    /// `<base>.<path>` for compound bases
    Access { base: Box<Term>, path: String },
    /// An existing placeholder, spliced in unwrapped
    Embedded(Deferred),
    Compare {
        op: CompareOp,
        left: Box<Term>,
        right: Box<Term>,
    },
    Logical { op: LogicalOp, terms: Vec<Term> },
    Not(Box<Term>),
    Arithmetic {
        op: ArithOp,
        left: Box<Term>,
        right: Box<Term>,
    },
    /// `<input> | <filter>`
    Pipe { input: Box<Term>, filter: Box<Term> },
    /// `name` or `name(a; b)`
    Call { name: String, args: Vec<Term> },
    /// `if <c> then <a> else <b> end`
    Conditional {
        condition: Box<Term>,
        then: Box<Term>,
        otherwise: Box<Term>,
    },
}

impl Term {
    /// `${ <body> }`
    pub fn expression(&self) -> String {
        format!("${{ {} }}", self.render())
    }

    /// Expression body without delimiters
    pub fn render(&self) -> String {
        match self {
            Term::Literal(Scalar::Str(s)) => Value::String(s.clone()).to_string(),
            Term::Literal(s) => s.render(),
            Term::Known(v) => v.to_string(),
            Term::ContextVar(name) => format!("$context.{}", name),
            Term::TaskField { task, path } => {
                let base = format!("$context[{}]", Value::String(task.clone()));
                join_path(&base, path)
            }
            Term::Path(path) => {
                let path = path.trim_start_matches('.');
                if path.is_empty() {
                    ".".to_string()
                } else {
                    format!(".{}", path)
                }
            }
            Term::Access { base, path } => join_path(&format!("({})", base.render()), path),
            Term::Embedded(d) => d.inner().to_string(),
            Term::Compare { op, left, right } => format!(
                "{} {} {}",
                left.compare_operand(),
                op.symbol(),
                right.compare_operand()
            ),
            Term::Logical { op, terms } => terms
                .iter()
                .map(|t| t.logical_operand())
                .collect::<Vec<_>>()
                .join(&format!(" {} ", op.symbol())),
            Term::Not(inner) => format!("!({})", inner.render()),
            Term::Arithmetic { op, left, right } => {
                let lhs = match left.as_ref() {
                    Term::Arithmetic { op: inner, .. } if inner.precedence() >= op.precedence() => {
                        left.render()
                    }
                    Term::Arithmetic { .. } => format!("({})", left.render()),
                    other => other.compare_operand(),
                };
                let rhs = match right.as_ref() {
                    Term::Arithmetic { op: inner, .. } if inner.precedence() > op.precedence() => {
                        right.render()
                    }
                    Term::Arithmetic { .. } => format!("({})", right.render()),
                    other => other.compare_operand(),
                };
                format!("{} {} {}", lhs, op.symbol(), rhs)
            }
            Term::Pipe { input, filter } => {
                format!("{} | {}", input.compare_operand(), filter.compare_operand())
            }
            Term::Call { name, args } if args.is_empty() => name.clone(),
            Term::Call { name, args } => format!(
                "{}({})",
                name,
                args.iter().map(Term::render).collect::<Vec<_>>().join("; ")
            ),
            Term::Conditional {
                condition,
                then,
                otherwise,
            } => format!(
                "if {} then {} else {} end",
                condition.render(),
                then.render(),
                otherwise.render()
            ),
        }
    }

    /// Task names read anywhere in this term, in first-seen order
    pub fn sources(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_sources(&mut out);
        out
    }

    fn collect_sources(&self, out: &mut Vec<String>) {
        match self {
            Term::TaskField { task, .. } => push_unique(out, task),
            Term::Embedded(d) => d.sources().iter().for_each(|s| push_unique(out, s)),
            Term::Access { base, .. } | Term::Not(base) => base.collect_sources(out),
            Term::Compare { left, right, .. } | Term::Arithmetic { left, right, .. } => {
                left.collect_sources(out);
                right.collect_sources(out);
            }
            Term::Pipe { input, filter } => {
                input.collect_sources(out);
                filter.collect_sources(out);
            }
            Term::Logical { terms, .. } | Term::Call { args: terms, .. } => {
                terms.iter().for_each(|t| t.collect_sources(out))
            }
            Term::Conditional {
                condition,
                then,
                otherwise,
            } => {
                condition.collect_sources(out);
                then.collect_sources(out);
                otherwise.collect_sources(out);
            }
            Term::Literal(_) | Term::Known(_) | Term::ContextVar(_) | Term::Path(_) => {}
        }
    }

    /// Operand of a comparison, arithmetic or pipe
    fn compare_operand(&self) -> String {
        match self {
            Term::Compare { .. }
            | Term::Logical { .. }
            | Term::Conditional { .. }
            | Term::Pipe { .. } => format!("({})", self.render()),
            Term::Embedded(d) if d.inner().contains(' ') => format!("({})", d.inner()),
            _ => self.render(),
        }
    }

    /// Operand of `&&` / `||`
    fn logical_operand(&self) -> String {
        match self {
            Term::Compare { .. } | Term::Arithmetic { .. } => self.render(),
            _ => self.compare_operand(),
        }
    }

    fn compare(self, op: CompareOp, other: impl Into<Term>) -> Term {
        Term::Compare {
            op,
            left: Box::new(self),
            right: Box::new(other.into()),
        }
    }

    fn logical(self, op: LogicalOp, other: impl Into<Term>) -> Term {
        let mut terms = match self {
            Term::Logical { op: own, terms } if own == op => terms,
            lhs => vec![lhs],
        };
        let rhs: Term = other.into();
        match rhs {
            Term::Logical { op: own, terms: rhs } if own == op => terms.extend(rhs),
            rhs => terms.push(rhs),
        }
        Term::Logical { op, terms }
    }

    pub fn equals(self, other: impl Into<Term>) -> Term {
        self.compare(CompareOp::Eq, other)
    }

    pub fn not_equals(self, other: impl Into<Term>) -> Term {
        self.compare(CompareOp::Ne, other)
    }

    pub fn greater_than(self, other: impl Into<Term>) -> Term {
        self.compare(CompareOp::Gt, other)
    }

    pub fn greater_or_equal(self, other: impl Into<Term>) -> Term {
        self.compare(CompareOp::Ge, other)
    }

    pub fn less_than(self, other: impl Into<Term>) -> Term {
        self.compare(CompareOp::Lt, other)
    }

    pub fn less_or_equal(self, other: impl Into<Term>) -> Term {
        self.compare(CompareOp::Le, other)
    }

    pub fn and(self, other: impl Into<Term>) -> Term {
        self.logical(LogicalOp::And, other)
    }

    pub fn or(self, other: impl Into<Term>) -> Term {
        self.logical(LogicalOp::Or, other)
    }

    /// `self | filter`
    pub fn pipe(self, filter: impl Into<Term>) -> Term {
        Term::Pipe {
            input: Box::new(self),
            filter: Box::new(filter.into()),
        }
    }

    /// Navigate further into this value
    pub fn access(self, path: &str) -> Term {
        let path = path.trim_start_matches('.');
        match self {
            Term::Path(base) => Term::Path(join_path(base.trim_start_matches('.'), path)),
            Term::ContextVar(name) => Term::ContextVar(join_path(&name, path)),
            Term::TaskField { task, path: base } => Term::TaskField {
                task,
                path: join_path(&base, path),
            },
            base => Term::Access {
                base: Box::new(base),
                path: path.to_string(),
            },
        }
    }
}

fn push_unique(out: &mut Vec<String>, name: &str) {
    if !out.iter().any(|s| s == name) {
        out.push(name.to_string());
    }
}

fn join_path(base: &str, path: &str) -> String {
    let path = path.trim_start_matches('.');
    if path.is_empty() {
        base.to_string()
    } else if base.is_empty() {
        path.to_string()
    } else if path.starts_with('[') {
        format!("{}{}", base, path)
    } else {
        format!("{}.{}", base, path)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression())
    }
}

impl ops::Not for Term {
    type Output = Term;

    fn not(self) -> Term {
        Term::Not(Box::new(self))
    }
}

impl IntoExpr for Term {
    fn into_expr(self) -> Expr {
        match self {
            Term::Literal(s) => s.into_expr(),
            Term::Known(v) => Expr::Known(v),
            Term::Embedded(d) => Expr::Deferred(d),
            term => Expr::Deferred(Deferred::with_sources(term.expression(), term.sources())),
        }
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        if is_placeholder(s) {
            Term::Embedded(Deferred::new(s))
        } else {
            Term::Literal(Scalar::from(s))
        }
    }
}

impl From<String> for Term {
    fn from(s: String) -> Self {
        Term::from(s.as_str())
    }
}

impl From<i64> for Term {
    fn from(v: i64) -> Self {
        Term::Literal(Scalar::Int(v))
    }
}

impl From<i32> for Term {
    fn from(v: i32) -> Self {
        Term::Literal(Scalar::from(v))
    }
}

impl From<f64> for Term {
    fn from(v: f64) -> Self {
        Term::Literal(Scalar::Float(v))
    }
}

impl From<bool> for Term {
    fn from(v: bool) -> Self {
        Term::Literal(Scalar::Bool(v))
    }
}

impl From<Scalar> for Term {
    fn from(s: Scalar) -> Self {
        Term::Literal(s)
    }
}

impl From<Deferred> for Term {
    fn from(d: Deferred) -> Self {
        Term::Embedded(d)
    }
}

impl From<Expr> for Term {
    fn from(e: Expr) -> Self {
        match e {
            Expr::Literal(s) => Term::Literal(s),
            Expr::Known(v) => Term::Known(v),
            Expr::Deferred(d) => Term::Embedded(d),
        }
    }
}

impl From<FieldRef> for Term {
    fn from(f: FieldRef) -> Self {
        Term::TaskField {
            task: f.task().to_string(),
            path: f.path().to_string(),
        }
    }
}

impl From<&FieldRef> for Term {
    fn from(f: &FieldRef) -> Self {
        Term::from(f.clone())
    }
}

// ============================================================================
// CONSTRUCTORS
// ============================================================================

/// `$context.<name>`
pub fn var(name: &str) -> Term {
    Term::ContextVar(name.to_string())
}

/// `.<path>` on the current data
pub fn field(path: &str) -> Term {
    Term::Path(path.to_string())
}

pub fn literal(value: impl Into<Scalar>) -> Term {
    Term::Literal(value.into())
}

/// `$context["<task>"].<path>`
pub fn task_field(task: &str, path: &str) -> Term {
    Term::TaskField {
        task: task.to_string(),
        path: path.trim_start_matches('.').to_string(),
    }
}

/// Raw expression escape hatch; wrapped in `${ }` unless already delimited
pub fn custom(expression: &str) -> Term {
    if is_placeholder(expression) {
        Term::Embedded(Deferred::new(expression))
    } else {
        Term::Embedded(Deferred::new(format!("${{ {} }}", expression.trim())))
    }
}

/// Concatenate parts into one value.
///
/// Without any deferred part the result is a plain literal string;
/// otherwise a `+` concatenation expression.
pub fn interpolate<I>(parts: I) -> Expr
where
    I: IntoIterator<Item = Expr>,
{
    let parts: Vec<Expr> = parts.into_iter().collect();
    if !parts.iter().any(Expr::is_deferred) {
        let text: String = parts.iter().map(Expr::render).collect();
        return Expr::Literal(Scalar::Str(text));
    }

    let mut terms = parts.into_iter().filter_map(|part| match part {
        Expr::Deferred(d) => Some(Term::Embedded(d)),
        other => {
            let text = other.render();
            (!text.is_empty()).then(|| Term::Literal(Scalar::Str(text)))
        }
    });
    let first = match terms.next() {
        Some(t) => t,
        None => return Expr::Literal(Scalar::Str(String::new())),
    };
    terms.fold(first, add).into_expr()
}

/// `.<var>.message` of a caught error
pub fn error_message(error_var: &str) -> Term {
    field(&format!("{}.message", error_var))
}

pub fn error_code(error_var: &str) -> Term {
    field(&format!("{}.code", error_var))
}

pub fn error_stack_trace(error_var: &str) -> Term {
    field(&format!("{}.stackTrace", error_var))
}

pub fn error_object(error_var: &str) -> Term {
    field(error_var)
}

/// `$context.<name> + 1`
pub fn increment(name: &str) -> Term {
    add(var(name), 1i64)
}

/// `$context.<name> - 1`
pub fn decrement(name: &str) -> Term {
    subtract(var(name), 1i64)
}

pub fn now() -> Term {
    call("now", Vec::new())
}

pub fn length(value: impl Into<Term>) -> Term {
    value.into().pipe(call("length", Vec::new()))
}

pub fn to_string(value: impl Into<Term>) -> Term {
    value.into().pipe(call("tostring", Vec::new()))
}

pub fn to_number(value: impl Into<Term>) -> Term {
    value.into().pipe(call("tonumber", Vec::new()))
}

pub fn join(value: impl Into<Term>, separator: &str) -> Term {
    value.into().pipe(call("join", vec![literal(separator)]))
}

pub fn if_then_else(
    condition: impl Into<Term>,
    then: impl Into<Term>,
    otherwise: impl Into<Term>,
) -> Term {
    Term::Conditional {
        condition: Box::new(condition.into()),
        then: Box::new(then.into()),
        otherwise: Box::new(otherwise.into()),
    }
}

fn arithmetic(op: ArithOp, left: impl Into<Term>, right: impl Into<Term>) -> Term {
    Term::Arithmetic {
        op,
        left: Box::new(left.into()),
        right: Box::new(right.into()),
    }
}

pub fn add(left: impl Into<Term>, right: impl Into<Term>) -> Term {
    arithmetic(ArithOp::Add, left, right)
}

pub fn subtract(left: impl Into<Term>, right: impl Into<Term>) -> Term {
    arithmetic(ArithOp::Sub, left, right)
}

pub fn multiply(left: impl Into<Term>, right: impl Into<Term>) -> Term {
    arithmetic(ArithOp::Mul, left, right)
}

pub fn divide(left: impl Into<Term>, right: impl Into<Term>) -> Term {
    arithmetic(ArithOp::Div, left, right)
}

/// Conjunction of every term (`true` when empty)
pub fn all<I, T>(terms: I) -> Term
where
    I: IntoIterator<Item = T>,
    T: Into<Term>,
{
    fold_logical(LogicalOp::And, terms).unwrap_or(Term::Literal(Scalar::Bool(true)))
}

/// Disjunction of every term (`false` when empty)
pub fn any<I, T>(terms: I) -> Term
where
    I: IntoIterator<Item = T>,
    T: Into<Term>,
{
    fold_logical(LogicalOp::Or, terms).unwrap_or(Term::Literal(Scalar::Bool(false)))
}

fn fold_logical<I, T>(op: LogicalOp, terms: I) -> Option<Term>
where
    I: IntoIterator<Item = T>,
    T: Into<Term>,
{
    terms
        .into_iter()
        .map(Into::into)
        .reduce(|acc, t| acc.logical(op, t))
}

fn call(name: &str, args: Vec<Term>) -> Term {
    Term::Call {
        name: name.to_string(),
        args,
    }
}
