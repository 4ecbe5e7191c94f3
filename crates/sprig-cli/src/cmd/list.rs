//! List command

use anyhow::Result;

use super::Context;
use crate::ui::columns;

/// Print every package with a recipe, in columns.
pub fn list(ctx: &mut Context) -> Result<()> {
    let names: Vec<String> = ctx
        .registry
        .all_package_names()?
        .iter()
        .map(ToString::to_string)
        .collect();

    if names.is_empty() {
        ctx.output.info(&format!(
            "No packages found in {}",
            ctx.registry.root().display()
        ));
        return Ok(());
    }

    columns::colify(&mut std::io::stdout().lock(), &names, 0)?;
    Ok(())
}
