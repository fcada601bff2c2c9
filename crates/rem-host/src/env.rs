//! In-memory environment storage
//!
//! The default host bridge implementation: a plain map from string keys to
//! integers or callables. Callables are installed host-side; programs can
//! only write integers through the set instruction.

use std::collections::HashMap;
use std::rc::Rc;

use rem_core::{Callable, EnvValue, HostBridge};

/// Map-backed host environment
#[derive(Default)]
pub struct MemoryEnvironment {
    vars: HashMap<String, EnvValue>,
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an integer variable
    pub fn define_int(&mut self, key: &str, value: i32) {
        self.vars.insert(key.to_string(), EnvValue::Int(value));
    }

    /// Install a host callable
    pub fn define_callable(&mut self, key: &str, callable: Rc<dyn Callable>) {
        self.vars
            .insert(key.to_string(), EnvValue::Callable(callable));
    }
}

impl HostBridge for MemoryEnvironment {
    fn environment_get(&self, key: &str) -> Option<EnvValue> {
        self.vars.get(key).cloned()
    }

    fn environment_set(&mut self, key: &str, value: i32) {
        self.vars.insert(key.to_string(), EnvValue::Int(value));
    }
}
