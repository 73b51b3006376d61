use crate::core::functions::BlockFn;
use crate::core::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Span, in ticks, given to the last block when it declares no end
pub const DEFAULT_SPAN: f64 = 100.0;

/// Serialized block definition, as produced by an external editor
///
/// `title` is a textual reference (`name` or `name(arg, ...)`). An explicit
/// `args` list takes precedence over arguments parsed from the title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDef {
    pub title: String,
    pub start: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Value>>,
}

/// How a block gets its callable
#[derive(Clone)]
pub enum Binding {
    /// Resolve the title against the function registry at load time
    Reference,
    /// Already-resolved callable
    Direct(BlockFn),
}

/// Input to a registry load: a block before default-filling and resolution
#[derive(Clone)]
pub struct BlockSpec {
    pub title: String,
    pub start: f64,
    pub end: Option<f64>,
    pub args: Option<Vec<Value>>,
    pub binding: Binding,
}

impl BlockSpec {
    /// Block whose title is resolved by name, e.g. `"circle(10, 'red')"`
    pub fn reference(title: &str, start: f64) -> Self {
        Self {
            title: title.to_string(),
            start,
            end: None,
            args: None,
            binding: Binding::Reference,
        }
    }

    /// Block bound directly to a callable; `label` is only used for reporting
    pub fn direct<F>(label: &str, start: f64, func: F) -> Self
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        Self {
            title: label.to_string(),
            start,
            end: None,
            args: None,
            binding: Binding::Direct(Arc::new(func)),
        }
    }

    pub fn with_end(mut self, end: f64) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = Some(args);
        self
    }
}

impl From<BlockDef> for BlockSpec {
    fn from(def: BlockDef) -> Self {
        Self {
            title: def.title,
            start: def.start,
            end: def.end,
            args: def.args,
            binding: Binding::Reference,
        }
    }
}

impl fmt::Debug for BlockSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let binding = match self.binding {
            Binding::Reference => "reference",
            Binding::Direct(_) => "direct",
        };
        f.debug_struct("BlockSpec")
            .field("title", &self.title)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("args", &self.args)
            .field("binding", &binding)
            .finish()
    }
}

/// Identifying label and bounds of a block, without its callable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub title: String,
    pub start: f64,
    pub end: f64,
}

/// A loaded block: interval, resolved callable and activation edge state
#[derive(Clone)]
pub struct Block {
    pub title: String,
    pub start: f64,
    pub end: f64,
    pub(crate) args: Vec<Value>,
    pub(crate) callback: Option<BlockFn>,
    pub(crate) active: bool,
}

impl Block {
    pub(crate) fn new(
        title: String,
        start: f64,
        end: f64,
        args: Vec<Value>,
        callback: Option<BlockFn>,
    ) -> Self {
        Self {
            title,
            start,
            end,
            args,
            callback,
            active: false,
        }
    }

    /// Whether `position` lies within `[start, end]`
    pub fn contains(&self, position: f64) -> bool {
        self.start <= position && position <= self.end
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// False when the block's reference failed to resolve
    pub fn is_resolved(&self) -> bool {
        self.callback.is_some()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            title: self.title.clone(),
            start: self.start,
            end: self.end,
        }
    }

    /// Call the bound function with the fixed arguments; unresolved blocks do nothing
    pub(crate) fn invoke(&self) {
        if let Some(callback) = &self.callback {
            callback(&self.args);
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("title", &self.title)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("args", &self.args)
            .field("resolved", &self.is_resolved())
            .field("active", &self.active)
            .finish()
    }
}

/// Fill missing ends in declaration order
///
/// A block without an end runs until one unit before the next block starts;
/// the last one runs for `span` units ([`DEFAULT_SPAN`] ticks, converted to
/// the clock's unit by the caller).
pub fn default_ends(specs: &[BlockSpec], span: f64) -> Vec<f64> {
    specs
        .iter()
        .enumerate()
        .map(|(i, spec)| match spec.end {
            Some(end) => end,
            None => match specs.get(i + 1) {
                Some(next) => next.start - 1.0,
                None => spec.start + span,
            },
        })
        .collect()
}
