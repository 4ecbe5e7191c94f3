//! Mirrors command

use anyhow::Result;

use super::Context;

/// Print configured mirror bases in the order they are tried.
pub fn mirrors(ctx: &Context) -> Result<()> {
    let mirrors = &ctx.settings.stage.mirrors;
    if mirrors.is_empty() {
        ctx.output.info("No mirrors configured");
        return Ok(());
    }
    for (i, base) in mirrors.iter().enumerate() {
        println!("{:>3}  {base}", i + 1);
    }
    Ok(())
}
