//! Providers command

use anyhow::{Context as _, Result};
use sprig_schema::Spec;

use super::Context;
use crate::ui::columns;

/// Print the packages that can provide a virtual package.
pub fn providers(ctx: &mut Context, spec_str: &str) -> Result<()> {
    let mut vspec: Spec = spec_str
        .parse()
        .with_context(|| format!("Invalid spec '{spec_str}'"))?;
    vspec.normalize();

    let providers: Vec<String> = ctx
        .registry
        .providers_for(&vspec)?
        .iter()
        .map(ToString::to_string)
        .collect();
    columns::colify(&mut std::io::stdout().lock(), &providers, 0)?;
    Ok(())
}
