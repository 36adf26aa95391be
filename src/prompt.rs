//! Operator confirmation.
//!
//! The environment guard asks through [`ConfirmPrompt`] so that `--yes`
//! and tests can answer without a terminal.

use console::style;
use dialoguer::Confirm;

use crate::error::Result;

pub trait ConfirmPrompt {
    /// Ask a yes/no question. `default` is used when the operator just
    /// presses Enter.
    fn confirm(&self, message: &str, default: bool) -> Result<bool>;

    /// Show a warning before a question.
    fn warn(&self, message: &str);
}

/// Interactive prompt on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl ConfirmPrompt for TerminalPrompt {
    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        let confirmed = Confirm::new()
            .with_prompt(format!("  {} {}", style("?").cyan().bold(), message))
            .default(default)
            .interact()?;
        Ok(confirmed)
    }

    fn warn(&self, message: &str) {
        println!("  {} {}", style("!").yellow().bold(), style(message).yellow());
    }
}

/// Answers yes to everything (`--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirmPrompt;

impl ConfirmPrompt for AutoConfirmPrompt {
    fn confirm(&self, message: &str, _default: bool) -> Result<bool> {
        tracing::debug!("auto-confirmed: {}", message);
        Ok(true)
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}
