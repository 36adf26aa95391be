use anyhow::Context;
use console::style;

use crate::config::{AppConfig, CONFIG_FILE_NAME};
use crate::error::{ReqsmithError, Result};

pub fn show() -> Result<()> {
    let config = AppConfig::load_from_cwd()?;

    println!("{}", style("Effective Configuration").bold().cyan());
    println!();
    print!("{}", config.to_yaml()?);
    println!();

    match AppConfig::discover() {
        Some(path) => println!("Config file: {}", style(path.display()).dim()),
        None => println!(
            "{} Run {} to create one.",
            style("No reqsmith.yaml found, using defaults.").dim(),
            style("reqsmith config init").cyan()
        ),
    }
    println!("Manifest:    {}", style(config.manifest_path().display()).dim());

    Ok(())
}

pub fn init(force: bool) -> Result<()> {
    let path = std::env::current_dir()
        .context("Failed to determine the current directory")?
        .join(CONFIG_FILE_NAME);

    if path.exists() && !force {
        return Err(ReqsmithError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }

    AppConfig::default().save(&path)?;

    println!("{}", style("✓ Configuration saved!").green().bold());
    println!("Config file: {}", style(path.display()).dim());
    println!(
        "\nRun {} to install your requirements.",
        style("reqsmith install").cyan()
    );

    Ok(())
}
