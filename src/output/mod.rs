mod progress;
mod styling;
mod tables;

pub use progress::Spinner;
pub use tables::print_tool_catalog;

use styling::{dim, magenta_bold};

/// Prints the travis-lens banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔭 travis-lens"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Travis CI tools for MCP clients")
    );
}
