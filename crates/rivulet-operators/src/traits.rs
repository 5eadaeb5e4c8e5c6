//! Operator traits + common interfaces.
//!
//! An operator is either a [`Plugin`] (produces a row stream) or a
//! [`Function`] (produces one value). Both describe themselves through
//! [`OperatorInfo`], which the exec runtime uses to validate arguments before
//! the call.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use rivulet_core::args::{ArgError, ArgKind, ArgResult, ArgSpec, Args};
use rivulet_core::{Context, RowStream, Scope, Value};

#[derive(Debug, Error)]
pub enum OpError {
    #[error(transparent)]
    Args(#[from] ArgError),

    #[error("state error: {0}")]
    State(#[from] rivulet_state::Error),

    #[error("execution error: {0}")]
    Exec(String),
}

/// Name, documentation and argument schema of one operator.
#[derive(Debug, Clone, Serialize)]
pub struct OperatorInfo {
    pub name: &'static str,
    pub doc: &'static str,
    pub args: Vec<ArgSpec>,
    /// Kind of every undeclared argument, for operators taking named
    /// sub-queries. `None` rejects undeclared arguments.
    pub variadic: Option<ArgKind>,
}

impl OperatorInfo {
    pub fn new(name: &'static str, doc: &'static str, args: Vec<ArgSpec>) -> Self {
        Self {
            name,
            doc,
            args,
            variadic: None,
        }
    }

    pub fn variadic(mut self, kind: ArgKind) -> Self {
        self.variadic = Some(kind);
        self
    }

    pub fn check(&self, args: &Args) -> ArgResult<()> {
        args.check(&self.args, self.variadic)
    }
}

/// An operator producing a row stream.
///
/// Invariants:
/// - `call` returns immediately; the work runs on its own task.
/// - Failures are logged through the scope and close the stream early. They
///   never surface as a panic.
pub trait Plugin: Send + Sync + 'static {
    fn info(&self) -> OperatorInfo;

    fn call(&self, ctx: &Context, scope: &Scope, args: Args) -> RowStream;
}

/// An operator producing a single value. Failures log and yield `Null`.
#[async_trait]
pub trait Function: Send + Sync + 'static {
    fn info(&self) -> OperatorInfo;

    async fn call(&self, ctx: &Context, scope: &Scope, args: &Args) -> Value;
}
