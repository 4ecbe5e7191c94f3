//! Clean and purge commands

use anyhow::{Context as _, Result};
use sprig_core::stage;

use super::{Context, for_each_spec};

/// Remove the stage of each spec
pub async fn clean(ctx: &mut Context, specs: &[String]) -> Result<()> {
    for_each_spec(ctx, specs, async |ctx, spec| {
        let pkg = ctx.concrete_package(spec)?;
        let mut stage = pkg.stage(ctx.stage_config())?;
        pkg.do_clean_dist(&mut stage)?;
        ctx.output.success(&format!("Cleaned {}", pkg.spec()));
        Ok(())
    })
    .await
}

/// Remove every stage under the stage root
pub fn purge(ctx: &Context) -> Result<()> {
    let config = &ctx.settings.stage;
    let removed = stage::purge(config)
        .with_context(|| format!("Failed to purge {}", config.stage_root.display()))?;
    ctx.output.success(&format!(
        "Removed {removed} stage(s) from {}",
        config.stage_root.display()
    ));
    Ok(())
}
