//! Built-in engine and tools.
//!
//! - `EchoEngine` - streams prompts back; drives `calc` for `calc a op b`
//! - `InMemoryToolRegistry` - in-process tool table with `calc`

mod echo;
mod tools;

pub use echo::{EchoEngine, EchoEngineConfig, EchoEngineFactory};
pub use tools::{calc, InMemoryToolRegistry, ToolFn, CALC_TOOL};
