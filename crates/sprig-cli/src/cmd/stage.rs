//! Fetch, stage and restage commands

use anyhow::Result;

use super::{Context, for_each_spec};

/// Download source archives for each spec
pub async fn fetch(ctx: &mut Context, specs: &[String]) -> Result<()> {
    for_each_spec(ctx, specs, async |ctx, spec| {
        let pkg = ctx.concrete_package(spec)?;
        let mut stage = pkg.stage(ctx.stage_config())?;
        pkg.do_fetch(&mut stage, ctx.checksum).await?;
        ctx.output
            .success(&format!("Fetched {} into {}", pkg.spec(), stage.path().display()));
        Ok(())
    })
    .await
}

/// Fetch and expand each spec, printing the source directory
pub async fn stage(ctx: &mut Context, specs: &[String]) -> Result<()> {
    for_each_spec(ctx, specs, async |ctx, spec| {
        let pkg = ctx.concrete_package(spec)?;
        let mut stage = pkg.stage(ctx.stage_config())?;
        let source = pkg.do_stage(&mut stage, ctx.checksum).await?;
        ctx.output
            .success(&format!("Staged {} in {}", pkg.spec(), source.display()));
        Ok(())
    })
    .await
}

/// Re-expand previously fetched sources, discarding build products
pub async fn restage(ctx: &mut Context, specs: &[String]) -> Result<()> {
    for_each_spec(ctx, specs, async |ctx, spec| {
        let pkg = ctx.concrete_package(spec)?;
        let mut stage = pkg.stage(ctx.stage_config())?;
        pkg.do_clean_work(&mut stage).await?;
        ctx.output.success(&format!("Restaged {}", pkg.spec()));
        Ok(())
    })
    .await
}
