//! Output for focusctl subcommands.

use crate::scenario::Report;
use audiofocus::{AudioManager, ContentType, SessionIntent, StreamUsage, Verdict};
use focusconf::{ConfigSources, FocusConfig};
use owo_colors::OwoColorize;

/// Applies colors unless the user asked for plain output.
pub struct Style {
    no_color: bool,
}

impl Style {
    pub fn new(no_color: bool) -> Self {
        Self { no_color }
    }

    pub fn verdict(&self, verdict: Verdict) -> String {
        let name = verdict.name();
        if self.no_color {
            return name.to_string();
        }
        match verdict {
            Verdict::Allow => name.green().to_string(),
            Verdict::DuckUnduck => name.cyan().to_string(),
            Verdict::PauseResume => name.yellow().to_string(),
            Verdict::Stop => name.red().to_string(),
            Verdict::Deny => name.bright_red().bold().to_string(),
        }
    }

    pub fn heading(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.bold().to_string()
        }
    }

    pub fn dim(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.dimmed().to_string()
        }
    }

    pub fn pass(&self, ok: bool) -> String {
        match (ok, self.no_color) {
            (true, true) => "ok".to_string(),
            (false, true) => "FAIL".to_string(),
            (true, false) => "ok".bright_green().to_string(),
            (false, false) => "FAIL".bright_red().bold().to_string(),
        }
    }
}

pub fn decide(
    manager: &AudioManager,
    incumbent: (ContentType, StreamUsage),
    candidate: (ContentType, StreamUsage),
    style: &Style,
) {
    let incumbent = SessionIntent::new(incumbent.0, incumbent.1);
    let candidate = SessionIntent::new(candidate.0, candidate.1);
    let verdict = manager
        .arbitrator()
        .config()
        .policy
        .decide(incumbent, candidate);

    println!(
        "{} ({}) <- {} ({}): {}",
        incumbent,
        incumbent.focus_class(),
        candidate,
        candidate.focus_class(),
        style.verdict(verdict)
    );
}

pub fn table(manager: &AudioManager, style: &Style) {
    let policy = &manager.arbitrator().config().policy;

    for incumbent in StreamUsage::ALL {
        let header = format!("{incumbent} playing ({})", incumbent.focus_class());
        println!("{}", style.heading(&header));
        for candidate in StreamUsage::ALL {
            let verdict = policy.decide(
                SessionIntent::new(ContentType::Unknown, incumbent),
                SessionIntent::new(ContentType::Unknown, candidate),
            );
            println!("  {:<22} {}", candidate.name(), style.verdict(verdict));
        }
    }

    if !policy.rules().is_empty() {
        println!(
            "{}",
            style.dim(&format!("{} configured rule(s) applied", policy.rules().len()))
        );
    }
}

pub fn print_report(report: &Report, style: &Style) {
    if !report.name.is_empty() {
        println!("{}", style.heading(&report.name));
    }

    for step in &report.steps {
        println!(
            "{:>3}. {} {} {}",
            step.index,
            step.session,
            step.action.name(),
            style.pass(step.failure.is_none())
        );
        if let Some(error) = &step.error {
            println!("       {}", style.dim(&format!("error: {error}")));
        }
        for event in &step.events {
            println!("       {}", style.dim(event));
        }
        if let Some(failure) = &step.failure {
            println!("       {failure}");
        }
    }

    let failures = report.failures();
    println!(
        "{} steps, {} failed",
        report.steps.len(),
        if failures == 0 {
            style.pass(true)
        } else {
            failures.to_string()
        }
    );
}

pub fn show_config(config: &FocusConfig, sources: &ConfigSources, style: &Style) {
    if sources.files.is_empty() {
        println!("{}", style.dim("# no config files found, using defaults"));
    }
    for file in &sources.files {
        println!("{}", style.dim(&format!("# loaded {}", file.display())));
    }
    for var in &sources.env_overrides {
        println!("{}", style.dim(&format!("# override {var}")));
    }
    print!("{}", config.to_toml());
}
