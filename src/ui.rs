use colored::Colorize;
use declarative::{ApplyResult, ConfirmCallback, PlannedAction, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Symbol and label for a planned action
pub fn action_symbol(action: &PlannedAction) -> String {
    match action {
        PlannedAction::Create(_) => "+".green().to_string(),
        PlannedAction::Update(_) => "~".yellow().to_string(),
        PlannedAction::Replace(_) => "-/+".red().to_string(),
        PlannedAction::Delete => "-".red().to_string(),
        PlannedAction::NoOp => "=".dimmed().to_string(),
    }
}

/// Symbol for the outcome of one entity
pub fn result_symbol(result: &ApplyResult) -> String {
    match result {
        ApplyResult::Failed { .. } => "✗".red().to_string(),
        ApplyResult::Skipped { .. } => "○".dimmed().to_string(),
        ApplyResult::NoChange => "=".dimmed().to_string(),
        _ => "✓".green().to_string(),
    }
}

// ============================================================================
// Callbacks
// ============================================================================

/// Asks on the terminal unless `--yes` was given
pub struct Prompt {
    pub yes: bool,
}

impl ConfirmCallback for Prompt {
    fn confirm(&mut self, prompt: &str) -> declarative::Result<bool> {
        if self.yes {
            return Ok(true);
        }

        match dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
        {
            Ok(confirmed) => Ok(confirmed),
            Err(e) => {
                // No terminal to ask on; destructive changes need --yes.
                log::warn!("Cannot prompt for confirmation ({e}), declining");
                Ok(false)
            }
        }
    }
}

/// Progress bar over the entities of a plan
pub struct BarProgress {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl BarProgress {
    pub fn new(quiet: bool) -> Self {
        Self { bar: None, quiet }
    }
}

impl ProgressCallback for BarProgress {
    fn on_batch_start(&mut self, count: usize) {
        if self.quiet {
            return;
        }
        let bar = ProgressBar::new(count as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        self.bar = Some(bar);
    }

    fn on_entity_start(&mut self, address: &str, action: &PlannedAction) {
        log::debug!("{address}: {action}");
    }

    fn on_entity_complete(&mut self, address: &str, result: &ApplyResult) {
        if let Some(bar) = &self.bar {
            bar.set_message(address.to_string());
            if let ApplyResult::Failed { error } = result {
                bar.suspend(|| println!("  {} {} ({})", "✗".red(), address, error));
            }
            bar.inc(1);
        }
    }

    fn on_batch_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
