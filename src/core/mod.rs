pub mod block;
pub mod functions;
pub mod reference;
pub mod value;

pub use block::{default_ends, Binding, Block, BlockDef, BlockSpec, BlockSummary, DEFAULT_SPAN};
pub use functions::{BlockFn, FunctionRegistry};
pub use reference::{parse_call, CallExpr};
pub use value::Value;
