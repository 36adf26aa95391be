use console::style;

use crate::config::AppConfig;
use crate::error::Result;
use crate::hardware::detect_cuda;
use crate::process::SystemRunner;

pub fn execute(config: &AppConfig) -> Result<()> {
    if detect_cuda(&SystemRunner, &config.probe) {
        println!(
            "{} CUDA GPU detected {}",
            style("✓").green().bold(),
            style(format!("({} responded)", config.probe.command)).dim()
        );
    } else {
        println!(
            "{} No CUDA GPU detected {}",
            style("●").yellow().bold(),
            style(format!("({} missing or not reporting a GPU)", config.probe.command)).dim()
        );
    }

    Ok(())
}
