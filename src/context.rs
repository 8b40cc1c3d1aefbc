//! Build-time workflow context
//!
//! A [`Context`] holds configuration values known while the workflow is being
//! written (base URLs, retry counts, feature flags). They are baked into the
//! manifest as literals, either through typed refs handed back by the setters
//! or through `${name}` placeholders interpolated at conversion.
//!
//! Typed refs resolve eagerly: combining two known values yields a known value,
//! and only a ref that touches something runtime-only becomes an expression.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::expr::{add, divide, multiply, subtract, Deferred, Expr, IntoExpr, Scalar, Term};
use crate::task::FieldRef;

/// Named build-time values
#[derive(Debug, Clone, Default)]
pub struct Context {
    variables: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_string(&mut self, name: &str, value: impl Into<String>) -> StringRef {
        let value = value.into();
        self.variables
            .insert(name.to_string(), Value::String(value.clone()));
        StringRef::known(value)
    }

    pub fn set_int(&mut self, name: &str, value: i64) -> IntRef {
        self.variables.insert(name.to_string(), Value::from(value));
        IntRef::known(value)
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> BoolRef {
        self.variables.insert(name.to_string(), Value::Bool(value));
        BoolRef::known(value)
    }

    /// Store a JSON object (or any JSON value) under `name`
    pub fn set_object(&mut self, name: &str, value: impl Into<Value>) -> ObjectRef {
        let value = value.into();
        self.variables.insert(name.to_string(), value.clone());
        ObjectRef::known(value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_object(&self, name: &str) -> Option<&Map<String, Value>> {
        self.get(name).and_then(Value::as_object)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

// ============================================================================
// TYPED REFS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum RefState<T> {
    Known(T),
    Computed(Term),
}

/// String value, known now or computed at runtime
#[derive(Debug, Clone, PartialEq)]
pub struct StringRef(RefState<String>);

/// Integer value, known now or computed at runtime
#[derive(Debug, Clone, PartialEq)]
pub struct IntRef(RefState<i64>);

/// Boolean value, known now or computed at runtime
#[derive(Debug, Clone, PartialEq)]
pub struct BoolRef(RefState<bool>);

/// JSON value, known now or computed at runtime
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRef(RefState<Value>);

impl StringRef {
    pub fn known(value: impl Into<String>) -> Self {
        Self(RefState::Known(value.into()))
    }

    pub fn computed(term: impl Into<Term>) -> Self {
        Self(RefState::Computed(term.into()))
    }

    pub fn value(&self) -> Option<&str> {
        match &self.0 {
            RefState::Known(s) => Some(s),
            RefState::Computed(_) => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self.0, RefState::Known(_))
    }

    pub fn term(&self) -> Term {
        match &self.0 {
            RefState::Known(s) => Term::Literal(Scalar::Str(s.clone())),
            RefState::Computed(t) => t.clone(),
        }
    }

    /// `self + other`
    pub fn concat(&self, other: impl Into<StringRef>) -> StringRef {
        let other = other.into();
        match (&self.0, &other.0) {
            (RefState::Known(a), RefState::Known(b)) => StringRef::known(format!("{}{}", a, b)),
            _ => StringRef::computed(add(self.term(), other.term())),
        }
    }

    pub fn prepend(&self, prefix: impl Into<StringRef>) -> StringRef {
        prefix.into().concat(self.clone())
    }

    pub fn append(&self, suffix: impl Into<StringRef>) -> StringRef {
        self.concat(suffix)
    }

    pub fn upper(&self) -> StringRef {
        match &self.0 {
            RefState::Known(s) => StringRef::known(s.to_uppercase()),
            RefState::Computed(t) => StringRef::computed(t.clone().pipe(filter("ascii_upcase"))),
        }
    }

    pub fn lower(&self) -> StringRef {
        match &self.0 {
            RefState::Known(s) => StringRef::known(s.to_lowercase()),
            RefState::Computed(t) => {
                StringRef::computed(t.clone().pipe(filter("ascii_downcase")))
            }
        }
    }
}

impl IntRef {
    pub fn known(value: i64) -> Self {
        Self(RefState::Known(value))
    }

    pub fn computed(term: impl Into<Term>) -> Self {
        Self(RefState::Computed(term.into()))
    }

    pub fn value(&self) -> Option<i64> {
        match self.0 {
            RefState::Known(n) => Some(n),
            RefState::Computed(_) => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self.0, RefState::Known(_))
    }

    pub fn term(&self) -> Term {
        match &self.0 {
            RefState::Known(n) => Term::Literal(Scalar::Int(*n)),
            RefState::Computed(t) => t.clone(),
        }
    }

    pub fn add(&self, other: impl Into<IntRef>) -> IntRef {
        self.arith(other.into(), i64::checked_add, add)
    }

    pub fn sub(&self, other: impl Into<IntRef>) -> IntRef {
        self.arith(other.into(), i64::checked_sub, subtract)
    }

    pub fn mul(&self, other: impl Into<IntRef>) -> IntRef {
        self.arith(other.into(), i64::checked_mul, multiply)
    }

    /// Integer division; a known zero divisor is left for the runtime to reject
    pub fn div(&self, other: impl Into<IntRef>) -> IntRef {
        self.arith(other.into(), i64::checked_div, divide)
    }

    fn arith(
        &self,
        other: IntRef,
        fold: fn(i64, i64) -> Option<i64>,
        build: fn(Term, Term) -> Term,
    ) -> IntRef {
        if let (RefState::Known(a), RefState::Known(b)) = (&self.0, &other.0) {
            if let Some(n) = fold(*a, *b) {
                return IntRef::known(n);
            }
        }
        IntRef::computed(build(self.term(), other.term()))
    }
}

impl BoolRef {
    pub fn known(value: bool) -> Self {
        Self(RefState::Known(value))
    }

    pub fn computed(term: impl Into<Term>) -> Self {
        Self(RefState::Computed(term.into()))
    }

    pub fn value(&self) -> Option<bool> {
        match self.0 {
            RefState::Known(b) => Some(b),
            RefState::Computed(_) => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self.0, RefState::Known(_))
    }

    pub fn term(&self) -> Term {
        match &self.0 {
            RefState::Known(b) => Term::Literal(Scalar::Bool(*b)),
            RefState::Computed(t) => t.clone(),
        }
    }

    pub fn and(&self, other: impl Into<BoolRef>) -> BoolRef {
        let other = other.into();
        match (&self.0, &other.0) {
            (RefState::Known(a), RefState::Known(b)) => BoolRef::known(*a && *b),
            (RefState::Known(false), _) | (_, RefState::Known(false)) => BoolRef::known(false),
            (RefState::Known(true), _) => other.clone(),
            (_, RefState::Known(true)) => self.clone(),
            _ => BoolRef::computed(self.term().and(other.term())),
        }
    }

    pub fn or(&self, other: impl Into<BoolRef>) -> BoolRef {
        let other = other.into();
        match (&self.0, &other.0) {
            (RefState::Known(a), RefState::Known(b)) => BoolRef::known(*a || *b),
            (RefState::Known(true), _) | (_, RefState::Known(true)) => BoolRef::known(true),
            (RefState::Known(false), _) => other.clone(),
            (_, RefState::Known(false)) => self.clone(),
            _ => BoolRef::computed(self.term().or(other.term())),
        }
    }

    pub fn not(&self) -> BoolRef {
        match &self.0 {
            RefState::Known(b) => BoolRef::known(!b),
            RefState::Computed(t) => BoolRef::computed(!t.clone()),
        }
    }
}

impl ObjectRef {
    pub fn known(value: impl Into<Value>) -> Self {
        Self(RefState::Known(value.into()))
    }

    pub fn computed(term: impl Into<Term>) -> Self {
        Self(RefState::Computed(term.into()))
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.0 {
            RefState::Known(v) => Some(v),
            RefState::Computed(_) => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self.0, RefState::Known(_))
    }

    pub fn term(&self) -> Term {
        match &self.0 {
            RefState::Known(v) => Term::Known(v.clone()),
            RefState::Computed(t) => t.clone(),
        }
    }

    /// Dotted lookup. Missing keys on a known object resolve to `null`.
    pub fn field(&self, path: &str) -> ObjectRef {
        match &self.0 {
            RefState::Known(v) => ObjectRef::known(lookup(v, path).cloned().unwrap_or(Value::Null)),
            RefState::Computed(t) => ObjectRef::computed(t.clone().access(path)),
        }
    }

    pub fn string_field(&self, path: &str) -> StringRef {
        match self.field(path).0 {
            RefState::Known(Value::String(s)) => StringRef::known(s),
            RefState::Known(other) => StringRef::known(Expr::Known(other).render()),
            RefState::Computed(t) => StringRef::computed(t),
        }
    }

    /// Known non-integer values fall back to a runtime `tonumber`
    pub fn int_field(&self, path: &str) -> IntRef {
        match self.field(path).0 {
            RefState::Known(v) => match v.as_i64() {
                Some(n) => IntRef::known(n),
                None => IntRef::computed(crate::expr::to_number(Term::Known(v))),
            },
            RefState::Computed(t) => IntRef::computed(t),
        }
    }

    pub fn bool_field(&self, path: &str) -> BoolRef {
        match self.field(path).0 {
            RefState::Known(v) => BoolRef::known(truthy(&v)),
            RefState::Computed(t) => BoolRef::computed(t),
        }
    }
}

fn filter(name: &str) -> Term {
    Term::Call {
        name: name.to_string(),
        args: Vec::new(),
    }
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.trim_start_matches('.')
        .split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// jq truthiness: only `null` and `false` are false
fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

// ============================================================================
// CONVERSIONS
// ============================================================================

macro_rules! ref_conversions {
    ($ref_ty:ty, $known:expr) => {
        impl IntoExpr for $ref_ty {
            fn into_expr(self) -> Expr {
                (&self).into_expr()
            }
        }

        impl IntoExpr for &$ref_ty {
            fn into_expr(self) -> Expr {
                match &self.0 {
                    RefState::Known(v) => Expr::Known(($known)(v)),
                    RefState::Computed(t) => t.clone().into_expr(),
                }
            }
        }

        impl From<$ref_ty> for Term {
            fn from(r: $ref_ty) -> Self {
                r.term()
            }
        }

        impl From<&$ref_ty> for Term {
            fn from(r: &$ref_ty) -> Self {
                r.term()
            }
        }

        impl From<FieldRef> for $ref_ty {
            fn from(f: FieldRef) -> Self {
                Self(RefState::Computed(f.term()))
            }
        }

        impl From<Deferred> for $ref_ty {
            fn from(d: Deferred) -> Self {
                Self(RefState::Computed(Term::Embedded(d)))
            }
        }
    };
}

ref_conversions!(StringRef, |s: &String| Value::String(s.clone()));
ref_conversions!(IntRef, |n: &i64| Value::from(*n));
ref_conversions!(BoolRef, |b: &bool| Value::Bool(*b));
ref_conversions!(ObjectRef, |v: &Value| v.clone());

impl From<&str> for StringRef {
    fn from(s: &str) -> Self {
        StringRef::known(s)
    }
}

impl From<String> for StringRef {
    fn from(s: String) -> Self {
        StringRef::known(s)
    }
}

impl From<i64> for IntRef {
    fn from(n: i64) -> Self {
        IntRef::known(n)
    }
}

impl From<i32> for IntRef {
    fn from(n: i32) -> Self {
        IntRef::known(n as i64)
    }
}

impl From<bool> for BoolRef {
    fn from(b: bool) -> Self {
        BoolRef::known(b)
    }
}
