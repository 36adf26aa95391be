use console::style;

use crate::config::AppConfig;
use crate::error::Result;
use crate::hardware::{self, Capability};
use crate::manifest::Manifest;
use crate::process::SystemRunner;
use crate::resolve::resolve;

pub fn execute(
    config: &AppConfig,
    manifest: Option<String>,
    forced: Option<Capability>,
    json: bool,
) -> Result<()> {
    let path = super::manifest_path(config, manifest);
    let capability = hardware::resolve_capability(&SystemRunner, &config.probe, forced);

    let manifest = Manifest::load(&path)?;
    let resolution = resolve(&manifest.requirements, &config.accelerated, capability);

    if json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
        return Ok(());
    }

    println!(
        "{} {} {}",
        style("Resolved").bold().cyan(),
        style(path.display()).white(),
        style(format!("for {}", capability)).dim()
    );
    println!();

    for entry in &resolution.entries {
        if entry.accelerated && !capability.has_gpu() {
            println!(
                "  {} {}",
                entry.spec,
                style(format!("--index-url {}", config.accelerated.cpu_index_url)).dim()
            );
        } else {
            println!("  {}", entry.spec);
        }
    }

    if !manifest.pip_options.is_empty() {
        println!();
        println!(
            "  {}  {}",
            style("pip options").dim(),
            manifest.pip_options.join(" ")
        );
    }

    Ok(())
}
