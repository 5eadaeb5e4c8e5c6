//! Deferred arguments: thunks forced on demand and callable lambdas.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::Context;
use crate::scope::Scope;
use crate::value::Value;

/// Lazies that reduce to other lazies are followed at most this many times.
const MAX_FORCE_DEPTH: usize = 64;

#[async_trait]
pub trait Lazy: Send + Sync + fmt::Debug {
    async fn reduce(&self, ctx: &Context, scope: &Scope) -> Value;

    fn describe(&self) -> String;
}

#[async_trait]
pub trait Lambda: Send + Sync + fmt::Debug {
    async fn call(&self, ctx: &Context, scope: &Scope, args: &[Value]) -> Value;

    fn describe(&self) -> String;
}

impl Value {
    /// Force lazies until a concrete value remains.
    pub async fn force(self, ctx: &Context, scope: &Scope) -> Value {
        let mut value = self;
        for _ in 0..MAX_FORCE_DEPTH {
            match value {
                Value::Lazy(lazy) => value = lazy.reduce(ctx, scope).await,
                other => return other,
            }
        }
        tracing::warn!("lazy value did not settle after {MAX_FORCE_DEPTH} reductions");
        Value::Null
    }
}

type LazyClosure = dyn Fn(Context, Scope) -> BoxFuture<'static, Value> + Send + Sync;

/// A lazy backed by an async closure.
#[derive(Clone)]
pub struct LazyFn {
    name: String,
    f: Arc<LazyClosure>,
}

impl LazyFn {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Context, Scope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(move |ctx, scope| Box::pin(f(ctx, scope))),
        }
    }
}

impl fmt::Debug for LazyFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyFn").field("name", &self.name).finish()
    }
}

#[async_trait]
impl Lazy for LazyFn {
    async fn reduce(&self, ctx: &Context, scope: &Scope) -> Value {
        (self.f)(ctx.clone(), scope.clone()).await
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

type LambdaClosure = dyn Fn(Context, Scope, Vec<Value>) -> BoxFuture<'static, Value> + Send + Sync;

/// A lambda backed by an async closure.
#[derive(Clone)]
pub struct LambdaFn {
    name: String,
    f: Arc<LambdaClosure>,
}

impl LambdaFn {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Context, Scope, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(move |ctx, scope, args| Box::pin(f(ctx, scope, args))),
        }
    }
}

impl fmt::Debug for LambdaFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaFn").field("name", &self.name).finish()
    }
}

#[async_trait]
impl Lambda for LambdaFn {
    async fn call(&self, ctx: &Context, scope: &Scope, args: &[Value]) -> Value {
        (self.f)(ctx.clone(), scope.clone(), args.to_vec()).await
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
