use crate::core::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A callable bound to a block, invoked with the block's fixed arguments
pub type BlockFn = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Name to callable table used to resolve textual block references
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, BlockFn>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under `name`, replacing any previous entry
    pub fn register<F>(&mut self, name: &str, func: F) -> &mut Self
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.functions.insert(name.to_string(), Arc::new(func));
        self
    }

    /// Builder-style variant of [`register`](Self::register)
    pub fn with<F>(mut self, name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.register(name, func);
        self
    }

    pub fn get(&self, name: &str) -> Option<BlockFn> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
