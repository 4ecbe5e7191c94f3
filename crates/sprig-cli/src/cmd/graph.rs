//! Graph command

use std::io::Write;

use anyhow::Result;

use super::Context;

/// Print the dependency graph of every package as Graphviz dot.
pub fn graph(ctx: &mut Context, title: &str) -> Result<()> {
    let mut out = std::io::stdout().lock();
    ctx.registry.graph_dependencies(&mut out, title)?;
    out.flush()?;
    Ok(())
}
