//! Expression values
//!
//! Every value handed to a task builder is coerced once into an [`Expr`]:
//!
//! - `Literal`: a plain scalar the caller typed in
//! - `Known`: a value fixed at build time (context refs, JSON payloads)
//! - `Deferred`: a `${ ... }` placeholder only the runtime can evaluate
//!
//! [`Expr::render`] is the single string-coercion point. A deferred value is
//! never evaluated here; its placeholder text passes through verbatim.

use std::fmt;

use serde_json::{Number, Value};

/// Plain literal scalar
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    /// String form used when the value lands in a string-typed wire field
    pub fn render(&self) -> String {
        match self {
            Scalar::Str(s) => s.clone(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }

    /// Typed JSON form (non-finite floats become null)
    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Str(s) => Value::String(s.clone()),
            Scalar::Int(i) => Value::from(*i),
            Scalar::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Scalar::Bool(b) => Value::Bool(*b),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Str(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<i32> for Scalar {
    fn from(i: i32) -> Self {
        Scalar::Int(i64::from(i))
    }
}

impl From<u32> for Scalar {
    fn from(i: u32) -> Self {
        Scalar::Int(i64::from(i))
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

/// A runtime placeholder plus the task names it reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deferred {
    placeholder: String,
    sources: Vec<String>,
}

impl Deferred {
    /// Placeholder with no task sources (runtime refs, raw expressions)
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_sources<I, S>(placeholder: impl Into<String>, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut deferred = Self::new(placeholder);
        for source in sources {
            let source = source.into();
            if !deferred.sources.contains(&source) {
                deferred.sources.push(source);
            }
        }
        deferred
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Task names this expression reads
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Expression body without the `${` `}` delimiters
    pub fn inner(&self) -> &str {
        self.placeholder
            .strip_prefix("${")
            .and_then(|s| s.strip_suffix('}'))
            .map(str::trim)
            .unwrap_or(&self.placeholder)
    }
}

impl fmt::Display for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.placeholder)
    }
}

/// True for a string delimited by `${` and `}`
pub(crate) fn is_placeholder(s: &str) -> bool {
    s.len() >= 3 && s.starts_with("${") && s.ends_with('}')
}

/// A builder argument after coercion
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Scalar),
    Known(Value),
    Deferred(Deferred),
}

impl Expr {
    pub fn known(value: impl Into<Value>) -> Self {
        Expr::Known(value.into())
    }

    /// String form for string-typed wire fields.
    ///
    /// Deferred placeholders pass through verbatim, known values are
    /// literal-encoded (objects and arrays as compact JSON).
    pub fn render(&self) -> String {
        match self {
            Expr::Deferred(d) => d.placeholder.clone(),
            Expr::Known(Value::String(s)) => s.clone(),
            Expr::Known(Value::Null) => String::new(),
            Expr::Known(Value::Number(n)) if n.is_f64() => match n.as_f64() {
                Some(f) => Scalar::Float(f).render(),
                None => n.to_string(),
            },
            Expr::Known(v) => v.to_string(),
            Expr::Literal(s) => s.render(),
        }
    }

    /// Typed form for payload fields (`body`, `input`, `data`)
    pub fn to_json(&self) -> Value {
        match self {
            Expr::Deferred(d) => Value::String(d.placeholder.clone()),
            Expr::Known(v) => v.clone(),
            Expr::Literal(s) => s.to_json(),
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Expr::Deferred(_))
    }

    /// Task names a deferred value reads; empty otherwise
    pub fn sources(&self) -> &[String] {
        match self {
            Expr::Deferred(d) => d.sources(),
            _ => &[],
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Conversion of builder arguments into [`Expr`]
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for &Expr {
    fn into_expr(self) -> Expr {
        self.clone()
    }
}

impl IntoExpr for Deferred {
    fn into_expr(self) -> Expr {
        Expr::Deferred(self)
    }
}

impl IntoExpr for Scalar {
    fn into_expr(self) -> Expr {
        match self {
            Scalar::Str(s) => s.into_expr(),
            other => Expr::Literal(other),
        }
    }
}

impl IntoExpr for &str {
    fn into_expr(self) -> Expr {
        if is_placeholder(self) {
            Expr::Deferred(Deferred::new(self))
        } else {
            Expr::Literal(Scalar::Str(self.to_string()))
        }
    }
}

impl IntoExpr for String {
    fn into_expr(self) -> Expr {
        if is_placeholder(&self) {
            Expr::Deferred(Deferred::new(self))
        } else {
            Expr::Literal(Scalar::Str(self))
        }
    }
}

impl IntoExpr for &String {
    fn into_expr(self) -> Expr {
        self.as_str().into_expr()
    }
}

impl IntoExpr for Value {
    fn into_expr(self) -> Expr {
        Expr::Known(self)
    }
}

macro_rules! scalar_into_expr {
    ($($ty:ty),*) => {
        $(
            impl IntoExpr for $ty {
                fn into_expr(self) -> Expr {
                    Expr::Literal(Scalar::from(self))
                }
            }
        )*
    };
}

scalar_into_expr!(i64, i32, u32, f64, bool);

/// Coerce any supported value to its wire string
pub fn resolve(value: impl IntoExpr) -> String {
    value.into_expr().render()
}
