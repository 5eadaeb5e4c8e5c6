//! Runtime: resolve operators by name, validate arguments and run them
//! against the engine's root scope.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use rivulet_core::args::{ArgError, Args};
use rivulet_core::config::EngineConfig;
use rivulet_core::{Context, Row, RowStream, Scope, ScopeLogger, TracingLogger, Value};
use rivulet_operators::{Function, Plugin, PluginCall, Registry};

use crate::metrics;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("'{name}' is a {actual}, not a {expected}")]
    WrongKind {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{operator}: {source}")]
    Args {
        operator: String,
        #[source]
        source: ArgError,
    },

    #[error(transparent)]
    Config(#[from] rivulet_core::Error),
}

/// Engine owns the registry, the root scope and the root context.
///
/// Dropping the engine closes it.
pub struct Engine {
    registry: Registry,
    scope: Scope,
    ctx: Context,
}

impl Engine {
    pub fn new(cfg: EngineConfig) -> Result<Self, ExecError> {
        Self::with_logger(cfg, Arc::new(TracingLogger))
    }

    /// Configuration from `RIVULET_*` environment variables.
    pub fn from_env() -> Result<Self, ExecError> {
        Self::new(EngineConfig::from_env())
    }

    pub fn with_logger(cfg: EngineConfig, logger: Arc<dyn ScopeLogger>) -> Result<Self, ExecError> {
        cfg.validate()?;
        Ok(Self {
            registry: Registry::new(),
            scope: Scope::with_logger(cfg, logger),
            ctx: Context::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        self.scope.config()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    fn lookup_plugin(&self, name: &str) -> Result<Arc<dyn Plugin>, ExecError> {
        match self.registry.plugin(name) {
            Some(p) => Ok(p),
            None if self.registry.function(name).is_some() => Err(ExecError::WrongKind {
                name: name.to_string(),
                expected: "plugin",
                actual: "function",
            }),
            None => Err(ExecError::UnknownOperator(name.to_string())),
        }
    }

    fn lookup_function(&self, name: &str) -> Result<Arc<dyn Function>, ExecError> {
        match self.registry.function(name) {
            Some(f) => Ok(f),
            None if self.registry.plugin(name).is_some() => Err(ExecError::WrongKind {
                name: name.to_string(),
                expected: "function",
                actual: "plugin",
            }),
            None => Err(ExecError::UnknownOperator(name.to_string())),
        }
    }

    fn checked(name: &str, result: Result<(), ArgError>) -> Result<(), ExecError> {
        result.map_err(|source| {
            metrics::record_rejected(name, &source.to_string());
            ExecError::Args {
                operator: name.to_string(),
                source,
            }
        })
    }

    /// Start a plugin and return its output stream.
    pub fn plugin(&self, name: &str, args: Args) -> Result<RowStream, ExecError> {
        let plugin = self.lookup_plugin(name)?;
        Self::checked(name, plugin.info().check(&args))?;
        metrics::record_call("plugin", name, args.len());
        Ok(plugin.call(&self.ctx, &self.scope, args))
    }

    /// Run a plugin to completion and collect every row.
    pub async fn collect(&self, name: &str, args: Args) -> Result<Vec<Row>, ExecError> {
        Ok(self.plugin(name, args)?.collect(&self.ctx).await)
    }

    /// Call a function.
    pub async fn function(&self, name: &str, args: Args) -> Result<Value, ExecError> {
        let function = self.lookup_function(name)?;
        Self::checked(name, function.info().check(&args))?;
        metrics::record_call("function", name, args.len());
        let started = Instant::now();
        let value = function.call(&self.ctx, &self.scope, &args).await;
        metrics::record_function_done(name, started.elapsed(), value.is_null());
        Ok(value)
    }

    /// A configured plugin call as a stored query, for passing to other
    /// operators. Nothing runs until the query is evaluated.
    pub fn query(&self, name: &str, args: Args) -> Result<Value, ExecError> {
        let plugin = self.lookup_plugin(name)?;
        Self::checked(name, plugin.info().check(&args))?;
        Ok(Value::query(PluginCall::new(plugin, args)))
    }

    /// Cancel everything in flight and tear down the root scope.
    /// Idempotent.
    pub fn close(&self) {
        self.ctx.cancel();
        self.scope.close();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("scope", &self.scope)
            .field("registry", &self.registry)
            .finish()
    }
}
