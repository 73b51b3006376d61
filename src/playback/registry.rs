use crate::core::{
    default_ends, parse_call, Binding, Block, BlockFn, BlockSpec, BlockSummary, FunctionRegistry, Value,
};
use crate::host::{HostLink, Notification};
use tracing::{debug, warn};

/// Block transitions for one tick, as indices in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Activation {
    /// Inactive blocks whose interval now contains the position
    pub entering: Vec<usize>,
    /// Every block whose interval contains the position
    pub active: Vec<usize>,
    /// Active blocks that no longer contain the position
    pub leaving: Vec<usize>,
}

/// Ordered block collection
///
/// Blocks are kept in declaration order, which is also the order callbacks
/// run and edge hooks fire in.
#[derive(Debug, Default)]
pub struct BlockRegistry {
    blocks: Vec<Block>,
    end: f64,
    locked: bool,
}

impl BlockRegistry {
    /// Load blocks: fill default ends, then resolve every callable
    ///
    /// `span` is the length given to a trailing block without an end, in
    /// the clock's unit. Unresolvable references are kept as no-op blocks
    /// and reported to `host` as `timelineFunctionMissing`.
    pub fn load(specs: Vec<BlockSpec>, span: f64, functions: &FunctionRegistry, host: &dyn HostLink) -> Self {
        let ends = default_ends(&specs, span);
        let blocks: Vec<Block> = specs
            .into_iter()
            .zip(ends)
            .map(|(spec, end)| resolve(spec, end, functions, host))
            .collect();

        let end = blocks.iter().fold(0.0_f64, |acc, b| acc.max(b.end));
        debug!("Loaded {} blocks, timeline end {}", blocks.len(), end);

        Self {
            blocks,
            end,
            locked: false,
        }
    }

    /// Like [`load`](Self::load), but later replacements are refused
    pub fn load_locked(specs: Vec<BlockSpec>, span: f64, functions: &FunctionRegistry, host: &dyn HostLink) -> Self {
        let mut registry = Self::load(specs, span, functions, host);
        registry.locked = true;
        registry
    }

    /// Swap in a new block set. Returns false (and changes nothing) when locked
    pub fn replace(
        &mut self,
        specs: Vec<BlockSpec>,
        span: f64,
        functions: &FunctionRegistry,
        host: &dyn HostLink,
    ) -> bool {
        if self.locked {
            debug!("Registry is locked by initial blocks, ignoring replace");
            return false;
        }
        *self = Self::load(specs, span, functions, host);
        true
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Largest block end, 0 when empty
    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn summaries(&self) -> Vec<BlockSummary> {
        self.blocks.iter().map(Block::summary).collect()
    }

    /// Work out which blocks enter, run and leave at `position`
    ///
    /// On the final tick of a run every block is treated as leaving after
    /// its callback, since no later tick will close it.
    pub fn plan(&self, position: f64, final_tick: bool) -> Activation {
        let mut activation = Activation::default();
        for (i, block) in self.blocks.iter().enumerate() {
            let inside = block.contains(position);
            if inside {
                activation.active.push(i);
                if !block.active {
                    activation.entering.push(i);
                }
            }
            if (block.active || inside) && (!inside || final_tick) {
                activation.leaving.push(i);
            }
        }
        activation
    }

    pub(crate) fn set_active(&mut self, index: usize, active: bool) {
        if let Some(block) = self.blocks.get_mut(index) {
            block.active = active;
        }
    }

    pub(crate) fn invoke(&self, index: usize) {
        if let Some(block) = self.blocks.get(index) {
            block.invoke();
        }
    }

    /// Clear edge state without firing anything
    pub(crate) fn deactivate_all(&mut self) {
        for block in &mut self.blocks {
            block.active = false;
        }
    }
}

fn resolve(spec: BlockSpec, end: f64, functions: &FunctionRegistry, host: &dyn HostLink) -> Block {
    let end = if end < spec.start {
        warn!(
            "Block {:?} ends at {} before it starts at {}, clamping",
            spec.title, end, spec.start
        );
        spec.start
    } else {
        end
    };

    let (callback, parsed_args) = match spec.binding {
        Binding::Direct(func) => (Some(func), Vec::new()),
        Binding::Reference => resolve_reference(&spec.title, functions, host),
    };

    let args = spec.args.unwrap_or(parsed_args);
    Block::new(spec.title, spec.start, end, args, callback)
}

/// Look `title` up as a registered name first, then as a call expression
fn resolve_reference(
    title: &str,
    functions: &FunctionRegistry,
    host: &dyn HostLink,
) -> (Option<BlockFn>, Vec<Value>) {
    if let Some(func) = functions.get(title) {
        return (Some(func), Vec::new());
    }

    match parse_call(title) {
        Ok(call) => match functions.get(&call.name) {
            Some(func) => (Some(func), call.args),
            None => {
                warn!("Function {:?} for block {:?} not found", call.name, title);
                host.notify(Notification::TimelineFunctionMissing(title.to_string()));
                (None, call.args)
            }
        },
        Err(e) => {
            warn!("Malformed block reference {:?}: {}", title, e);
            host.notify(Notification::TimelineFunctionMissing(title.to_string()));
            (None, Vec::new())
        }
    }
}
