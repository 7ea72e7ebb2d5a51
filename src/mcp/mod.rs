//! Model Context Protocol server over stdio.

mod handler;
pub mod protocol;
mod render;
mod resources;
mod server;
mod tools;

pub use handler::McpHandler;
pub use server::serve_stdio;
pub use tools::{tool_catalog, Toolbox};
