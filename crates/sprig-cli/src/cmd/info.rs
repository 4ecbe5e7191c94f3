//! Info command

use anyhow::Result;

use super::Context;

/// Show a package's recipe: versions, dependencies, virtuals and variants.
pub fn info(ctx: &mut Context, package: &str) -> Result<()> {
    let class = ctx.registry.get_class_for_package_name(package)?;
    let def = &class.def;
    let out = &ctx.output;
    let icons = &out.theme().icons;

    println!("{}", out.package(class.name.as_str()));
    if !def.description.is_empty() {
        println!("  {}", def.description);
    }
    if !def.homepage.is_empty() {
        println!("  Homepage: {}", def.homepage);
    }
    println!();

    out.section("Versions");
    if def.versions.is_empty() {
        println!("  None");
    }
    for (version, vdef) in def.versions.iter().rev() {
        let marker = if vdef.sha256.is_some() {
            icons.checksum
        } else {
            icons.no_checksum
        };
        match &vdef.url {
            Some(url) => println!("  {marker} {:<12} {}", version.to_string(), out.dim(url)),
            None => println!("  {marker} {version}"),
        }
    }
    println!();

    out.section("Dependencies");
    if def.depends_on.is_empty() {
        println!("  None");
    }
    for dep in &def.depends_on {
        println!("  {dep}");
    }
    println!();

    if !def.provides.is_empty() {
        out.section("Provides");
        for provided in &def.provides {
            match &provided.when {
                Some(when) => println!("  {} when @{when}", provided.spec),
                None => println!("  {}", provided.spec),
            }
        }
        println!();
    }

    if !def.variants.is_empty() {
        out.section("Variants");
        for (name, variant) in &def.variants {
            let default = if variant.default { "+" } else { "~" };
            println!("  {default}{name:<16} {}", variant.description);
        }
        println!();
    }

    println!("  {}", out.dim(&class.path.display().to_string()));
    Ok(())
}
