//! Host-side collaborators for the Register Execution Machine
//!
//! This crate implements the environment storage and builtin callables the
//! core only consumes through its host bridge interface. It intentionally
//! contains no execution semantics.

pub mod builtins;
pub mod env;

pub use builtins::{OutputSink, Println};
pub use env::MemoryEnvironment;

#[cfg(test)]
mod tests {
    use super::*;
    use rem_core::{EnvValue, HostBridge};

    #[test]
    fn environment_set_overwrites_callables_with_ints() {
        let mut env = MemoryEnvironment::new();
        env.define_callable("f", Println::stdout());
        env.environment_set("f", 3);
        assert!(matches!(env.environment_get("f"), Some(EnvValue::Int(3))));
    }

    #[test]
    fn missing_keys_read_as_none() {
        let env = MemoryEnvironment::new();
        assert!(env.environment_get("absent").is_none());
    }
}
