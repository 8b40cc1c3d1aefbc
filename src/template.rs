//! Compile-time `${name}` interpolation with caching
//!
//! Context variables are spliced into manifest strings before the manifest
//! is emitted:
//! - Templates are tokenized once and the tokens cached behind an `Arc`
//! - A string that is exactly one `${name}` takes the variable's JSON type
//! - Every other `${...}` form (runtime refs, expressions) is left untouched

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use crate::error::{ErrorKind, Result, Rule, ValidationError};

/// Token representing a parsed template fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal text (stores range in original string)
    Literal(Range<usize>),
    /// Context variable: `${name}`
    Var(String),
}

/// Template resolver with caching
pub struct TemplateResolver {
    cache: DashMap<String, Arc<Vec<Token>>>,
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateResolver {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Parse template into tokens (with caching)
    pub fn tokenize(&self, template: &str) -> Arc<Vec<Token>> {
        if let Some(cached) = self.cache.get(template) {
            return Arc::clone(&cached);
        }

        let mut tokens = Vec::new();
        let mut chars = template.char_indices().peekable();
        let mut literal_start = 0;

        while let Some((i, ch)) = chars.next() {
            if ch != '$' || chars.peek().map(|(_, c)| *c) != Some('{') {
                continue;
            }
            chars.next(); // consume '{'

            let Some(end) = template[i + 2..].find('}').map(|off| i + 2 + off) else {
                break;
            };
            let name = &template[i + 2..end];
            if !is_identifier(name) {
                // Not ours; skip past it so `${ .a }` stays one literal
                while chars.peek().is_some_and(|(j, _)| *j <= end) {
                    chars.next();
                }
                continue;
            }

            if i > literal_start {
                tokens.push(Token::Literal(literal_start..i));
            }
            tokens.push(Token::Var(name.to_string()));
            literal_start = end + 1;
            while chars.peek().is_some_and(|(j, _)| *j <= end) {
                chars.next();
            }
        }

        if literal_start < template.len() {
            tokens.push(Token::Literal(literal_start..template.len()));
        }

        let tokens = Arc::new(tokens);
        self.cache.insert(template.to_string(), tokens.clone());
        tokens
    }

    /// Resolve one string.
    ///
    /// Returns the variable's value unchanged when the whole string is a
    /// single `${name}`; otherwise a string with every variable spliced in.
    pub fn resolve(&self, template: &str, vars: &BTreeMap<String, Value>) -> Result<Value> {
        let tokens = self.tokenize(template);

        if let [Token::Var(name)] = tokens.as_slice() {
            return vars
                .get(name)
                .cloned()
                .ok_or_else(|| missing_error(template, &[name.as_str()]));
        }

        let missing: Vec<&str> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Var(name) if !vars.contains_key(name) => Some(name.as_str()),
                _ => None,
            })
            .collect();
        if !missing.is_empty() {
            return Err(missing_error(template, &missing));
        }

        let mut result = String::with_capacity(template.len() * 2);
        for token in tokens.iter() {
            match token {
                Token::Literal(range) => result.push_str(&template[range.clone()]),
                Token::Var(name) => match &vars[name] {
                    Value::String(s) => result.push_str(s),
                    Value::Null => {}
                    other => result.push_str(&other.to_string()),
                },
            }
        }
        Ok(Value::String(result))
    }

    /// Resolve every string inside `value`, recursing into arrays and objects
    pub fn resolve_value(&self, value: &Value, vars: &BTreeMap<String, Value>) -> Result<Value> {
        match value {
            Value::String(s) if s.contains("${") => self.resolve(s, vars),
            Value::Array(items) => items
                .iter()
                .map(|v| self.resolve_value(v, vars))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.resolve_value(v, vars)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn missing_error(template: &str, names: &[&str]) -> crate::error::TaskGraphError {
    ValidationError::new(
        ErrorKind::Interpolation,
        "",
        Rule::Exists,
        format!(
            "context variable(s) not found: {}",
            names
                .iter()
                .map(|n| format!("'{}'", n))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    )
    .with_value(template)
    .into()
}

/// Global template resolver instance
pub static TEMPLATE_RESOLVER: Lazy<TemplateResolver> = Lazy::new(TemplateResolver::new);

/// Convenience function for interpolating a JSON tree
pub fn interpolate_variables(value: &Value, vars: &BTreeMap<String, Value>) -> Result<Value> {
    TEMPLATE_RESOLVER.resolve_value(value, vars)
}
