//! Associative protocol: member access over heterogeneous values.
//!
//! Values come in a handful of shapes (row sequences, ordered collections,
//! rows with named fields, keyed objects, plain scalars). Callers classify a
//! value once with [`shape`] and match on the result instead of probing for
//! capabilities at runtime.

use std::fmt;

use async_trait::async_trait;

use crate::context::Context;
use crate::scope::Scope;
use crate::value::{ObjectRef, QueryRef, Row, Value};

/// A stateful object exposed to queries as an ordinary value.
#[async_trait]
pub trait Associative: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &'static str;

    /// Read one member. `None` when the key is absent.
    async fn get(&self, ctx: &Context, scope: &Scope, key: &str) -> Option<Value>;

    /// Names of the members currently present.
    fn members(&self) -> Vec<String>;

    /// Bring the members up to date before they are enumerated. Objects
    /// that fill themselves lazily override this.
    async fn refresh(&self, _ctx: &Context, _scope: &Scope) {}

    /// Store a member. Read-only objects return `false`.
    fn set(&self, _key: &str, _value: Value) -> bool {
        false
    }
}

/// The enumeration shape of a value.
#[derive(Debug, Clone)]
pub enum Shape {
    /// A lazily produced row sequence.
    Stream(QueryRef),
    /// A concrete ordered collection.
    Ordered(Vec<Value>),
    /// A row with named fields.
    Fields(Row),
    /// An object exposing named members.
    Keyed(ObjectRef),
    /// Anything else, including null.
    Scalar(Value),
}

pub fn shape(value: &Value) -> Shape {
    match value {
        Value::Query(q) => Shape::Stream(q.clone()),
        Value::List(items) => Shape::Ordered(items.clone()),
        Value::Row(row) => Shape::Fields(row.clone()),
        Value::Object(obj) => Shape::Keyed(obj.clone()),
        other => Shape::Scalar(other.clone()),
    }
}

/// Read `key` from `value`. Lazies are forced first; list members are
/// addressed by decimal index.
pub async fn get_member(ctx: &Context, scope: &Scope, value: &Value, key: &str) -> Option<Value> {
    let forced;
    let value = if let Value::Lazy(_) = value {
        forced = value.clone().force(ctx, scope).await;
        &forced
    } else {
        value
    };

    match value {
        Value::Row(row) => row.get(key).cloned(),
        Value::List(items) => key.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
        Value::Object(obj) => obj.get(ctx, scope, key).await,
        _ => None,
    }
}

/// Member names of `value` without forcing anything.
pub fn members(value: &Value) -> Vec<String> {
    match value {
        Value::Row(row) => row.keys().map(str::to_string).collect(),
        Value::Object(obj) => obj.members(),
        Value::List(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Store `key` on a writable object. Returns `false` for anything else.
pub fn set_member(value: &Value, key: &str, member: Value) -> bool {
    match value {
        Value::Object(obj) => obj.set(key, member),
        _ => false,
    }
}
