//! Find command

use anyhow::{Context as _, Result};
use sprig_core::DirectoryLayout;
use sprig_schema::Spec;

use super::Context;
use crate::ui::columns;

/// List installed packages, optionally only those satisfying a spec.
pub fn find(ctx: &mut Context, spec: Option<&str>) -> Result<()> {
    let layout = DirectoryLayout::new(&ctx.settings.install_root);
    let installed = match spec {
        Some(spec_str) => {
            let mut constraint: Spec = spec_str
                .parse()
                .with_context(|| format!("Invalid spec '{spec_str}'"))?;
            constraint.normalize();
            ctx.registry.get_installed(&layout, &constraint)?
        }
        None => ctx.registry.installed_known_package_specs(&layout)?,
    };

    if installed.is_empty() {
        ctx.output.info("No installed packages found");
        return Ok(());
    }

    let specs: Vec<String> = installed.iter().map(ToString::to_string).collect();
    columns::colify(&mut std::io::stdout().lock(), &specs, 0)?;
    Ok(())
}
