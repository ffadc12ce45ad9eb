//! Orascope Engine - the MCP tool surface
//!
//! Layer 3 of the service. Each tool is a pure function over
//! `(arguments, cache, connector)` with a bounded response size and a
//! per-call deadline. The explicit tool table is the registration
//! mechanism; the MCP transport iterates it to advertise tools.

mod context;
mod handlers;
mod invalidation;
mod shape;
mod tools;


pub use context::{AppContext, EngineConfig};
pub use shape::*;
pub use tools::{ToolRegistry, ToolSpec};
