//! Named operator arguments: schema, validation and typed extraction.
//!
//! Arguments arrive as an ordered name → value map. Lazy values are only
//! forced when an accessor asks for them, so an operator that never reads an
//! argument never evaluates it.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::context::Context;
use crate::query::StaticQuery;
use crate::scope::Scope;
use crate::value::{LambdaRef, QueryRef, Row, Value};

pub type ArgResult<T> = std::result::Result<T, ArgError>;

/// Longest duration an argument resolves to. Anything longer is treated as
/// "never expires" and clamped, so deadlines computed from it stay in range.
pub const MAX_DURATION: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgError {
    #[error("missing required argument '{0}'")]
    Missing(String),

    #[error("argument '{name}' expects {expected}, got {got}")]
    WrongType {
        name: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("unexpected argument '{0}'")]
    Unknown(String),

    #[error("invalid argument '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArgKind {
    Any,
    /// A stored query, or a list coerced into one.
    Query,
    Str,
    Int,
    Bool,
    /// Seconds, integer or fractional.
    Duration,
    Lambda,
}

impl ArgKind {
    fn name(self) -> &'static str {
        match self {
            ArgKind::Any => "any",
            ArgKind::Query => "query",
            ArgKind::Str => "string",
            ArgKind::Int => "int",
            ArgKind::Bool => "bool",
            ArgKind::Duration => "duration",
            ArgKind::Lambda => "lambda",
        }
    }

    /// Whether an already-concrete value fits. Lazies are checked when forced.
    fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Lazy(_)) | (ArgKind::Any, _) => true,
            (ArgKind::Query, Value::Query(_) | Value::List(_)) => true,
            (ArgKind::Str, Value::Str(_)) => true,
            (ArgKind::Int, v) => v.as_int().is_some(),
            (ArgKind::Bool, Value::Bool(_)) => true,
            (ArgKind::Duration, Value::Int(_) | Value::Float(_)) => true,
            (ArgKind::Lambda, Value::Lambda(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub required: bool,
    pub doc: &'static str,
}

impl ArgSpec {
    pub const fn required(name: &'static str, kind: ArgKind, doc: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            doc,
        }
    }

    pub const fn optional(name: &'static str, kind: ArgKind, doc: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            doc,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Args {
    values: IndexMap<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// The raw, unforced value.
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// One-line snapshot, e.g. `key="Pid", timeout=60`. Nothing is forced.
    pub fn render(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| format!("{}={}", k, v.render()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Validate against a declared schema.
    ///
    /// `variadic` is the kind every undeclared argument must have; `None`
    /// rejects undeclared arguments.
    pub fn check(&self, specs: &[ArgSpec], variadic: Option<ArgKind>) -> ArgResult<()> {
        for spec in specs {
            match self.values.get(spec.name) {
                None if spec.required => return Err(ArgError::Missing(spec.name.into())),
                None => {}
                Some(v) if !spec.kind.accepts(v) => {
                    return Err(ArgError::WrongType {
                        name: spec.name.into(),
                        expected: spec.kind.name(),
                        got: v.kind(),
                    })
                }
                Some(_) => {}
            }
        }
        for (name, value) in &self.values {
            if specs.iter().any(|s| s.name == name) {
                continue;
            }
            match variadic {
                None => return Err(ArgError::Unknown(name.clone())),
                Some(kind) if !kind.accepts(value) => {
                    return Err(ArgError::WrongType {
                        name: name.clone(),
                        expected: kind.name(),
                        got: value.kind(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// The forced value, if the argument was given.
    pub async fn value(&self, ctx: &Context, scope: &Scope, name: &str) -> Option<Value> {
        match self.values.get(name) {
            Some(v) => Some(v.clone().force(ctx, scope).await),
            None => None,
        }
    }

    pub async fn required(&self, ctx: &Context, scope: &Scope, name: &str) -> ArgResult<Value> {
        self.value(ctx, scope, name)
            .await
            .ok_or_else(|| ArgError::Missing(name.into()))
    }

    pub async fn query(&self, ctx: &Context, scope: &Scope, name: &str) -> ArgResult<QueryRef> {
        let value = self.required(ctx, scope, name).await?;
        let got = value.kind();
        to_query(value).ok_or_else(|| ArgError::WrongType {
            name: name.into(),
            expected: "query",
            got,
        })
    }

    pub async fn string(&self, ctx: &Context, scope: &Scope, name: &str) -> ArgResult<String> {
        self.opt_string(ctx, scope, name)
            .await?
            .ok_or_else(|| ArgError::Missing(name.into()))
    }

    pub async fn opt_string(
        &self,
        ctx: &Context,
        scope: &Scope,
        name: &str,
    ) -> ArgResult<Option<String>> {
        match self.value(ctx, scope, name).await {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s)),
            Some(other) => Err(wrong_type(name, "string", &other)),
        }
    }

    pub async fn opt_u64(&self, ctx: &Context, scope: &Scope, name: &str) -> ArgResult<Option<u64>> {
        match self.value(ctx, scope, name).await {
            None | Some(Value::Null) => Ok(None),
            Some(v) => match v.as_int() {
                Some(i) if i >= 0 => Ok(Some(i as u64)),
                Some(i) => Err(ArgError::Invalid {
                    name: name.into(),
                    reason: format!("must not be negative (got {i})"),
                }),
                None => Err(wrong_type(name, "int", &v)),
            },
        }
    }

    pub async fn opt_bool(&self, ctx: &Context, scope: &Scope, name: &str) -> ArgResult<Option<bool>> {
        match self.value(ctx, scope, name).await {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(other) => Err(wrong_type(name, "bool", &other)),
        }
    }

    /// Seconds as an int or float, clamped to [`MAX_DURATION`].
    pub async fn opt_duration(
        &self,
        ctx: &Context,
        scope: &Scope,
        name: &str,
    ) -> ArgResult<Option<Duration>> {
        match self.value(ctx, scope, name).await {
            None | Some(Value::Null) => Ok(None),
            Some(v) => match v.as_float() {
                Some(secs) => match Duration::try_from_secs_f64(secs) {
                    Ok(d) => Ok(Some(d.min(MAX_DURATION))),
                    Err(_) => Err(ArgError::Invalid {
                        name: name.into(),
                        reason: format!("not a valid duration: {secs}"),
                    }),
                },
                None => Err(wrong_type(name, "duration", &v)),
            },
        }
    }

    pub async fn opt_lambda(
        &self,
        ctx: &Context,
        scope: &Scope,
        name: &str,
    ) -> ArgResult<Option<LambdaRef>> {
        match self.value(ctx, scope, name).await {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Lambda(l)) => Ok(Some(l)),
            Some(other) => Err(wrong_type(name, "lambda", &other)),
        }
    }

    /// Every argument not named in `reserved`, in declaration order.
    pub fn rest(&self, reserved: &[&str]) -> Vec<(String, Value)> {
        self.values
            .iter()
            .filter(|(k, _)| !reserved.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Coerce a value into a stored query. Lists become a static query whose
/// rows are the list elements (non-row elements wrapped as `_value`).
pub fn to_query(value: Value) -> Option<QueryRef> {
    match value {
        Value::Query(q) => Some(q),
        Value::List(items) => {
            let rows = items
                .into_iter()
                .map(|item| match item {
                    Value::Row(row) => row,
                    other => Row::new().with("_value", other),
                })
                .collect();
            Some(Arc::new(StaticQuery::new(rows)))
        }
        _ => None,
    }
}

fn wrong_type(name: &str, expected: &'static str, got: &Value) -> ArgError {
    ArgError::WrongType {
        name: name.into(),
        expected,
        got: got.kind(),
    }
}
