//! Name → operator lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::{Cache, Lru, Memoize};
use crate::combine::{Batch, Chain, Combine, For, Foreach, Items, Sampler, Switch};
use crate::dedup::Dedup;
use crate::diff::Diff;
use crate::monitor::Invocations;
use crate::traits::{Function, OperatorInfo, Plugin};
use crate::window::{Fifo, Sequence};

#[derive(Clone, Default)]
pub struct Registry {
    plugins: BTreeMap<&'static str, Arc<dyn Plugin>>,
    functions: BTreeMap<&'static str, Arc<dyn Function>>,
}

impl Registry {
    /// A registry holding every built-in operator.
    pub fn new() -> Self {
        let mut reg = Self::default();
        reg.register_plugin(Dedup);
        reg.register_plugin(Fifo);
        reg.register_plugin(Sequence);
        reg.register_plugin(Diff);
        reg.register_plugin(Batch);
        reg.register_plugin(Chain);
        reg.register_plugin(Combine);
        reg.register_plugin(Switch);
        reg.register_plugin(For);
        reg.register_plugin(Foreach);
        reg.register_plugin(Items);
        reg.register_plugin(Sampler);
        reg.register_plugin(Invocations);

        reg.register_function(Cache);
        reg.register_function(Memoize);
        reg.register_function(Lru);
        reg
    }

    /// Later registrations replace earlier ones with the same name.
    pub fn register_plugin<P: Plugin>(&mut self, plugin: P) {
        let name = plugin.info().name;
        self.plugins.insert(name, Arc::new(plugin));
    }

    pub fn register_function<F: Function>(&mut self, function: F) {
        let name = function.info().name;
        self.functions.insert(name, Arc::new(function));
    }

    pub fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name).cloned()
    }

    pub fn function(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.get(name).cloned()
    }

    /// Info for every operator, plugins first, each group sorted by name.
    pub fn infos(&self) -> Vec<OperatorInfo> {
        self.plugins
            .values()
            .map(|p| p.info())
            .chain(self.functions.values().map(|f| f.info()))
            .collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}
