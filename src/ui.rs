//! Terminal feedback for the `workbench` binary.
//!
//! On a TTY steps are shown with an `indicatif` spinner and frame loops with a
//! counter bar. Otherwise everything degrades to plain `==>` lines on stderr.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Style {
    Auto,
    Plain,
    Fancy,
}

impl Style {
    /// `plain` and `fancy` pick a style; anything else means auto.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => Style::Plain,
            Some("fancy") => Style::Fancy,
            _ => Style::Auto,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Reporter {
    style: Style,
    is_tty: bool,
    quiet: bool,
}

impl Reporter {
    pub fn new(style: Style, is_tty: bool, quiet: bool) -> Self {
        Self {
            style,
            is_tty,
            quiet,
        }
    }

    fn animated(&self) -> bool {
        self.is_tty
            && match self.style {
                Style::Fancy => true,
                Style::Auto => !self.quiet,
                Style::Plain => false,
            }
    }

    /// Announce a step; completion is reported when the guard drops.
    pub fn step(&self, name: &str) -> Step {
        if !self.animated() {
            eprintln!("==> {name}");
            return Step::new(name, None);
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("{name}…"));
        Step::new(name, Some(spinner))
    }

    /// Counter for a frame loop. `total` is known for finite sources.
    pub fn frames(&self, total: Option<u64>) -> FrameCounter {
        if !self.animated() {
            return FrameCounter {
                bar: None,
                count: 0,
            };
        }
        let bar = match total {
            Some(total) => ProgressBar::new(total),
            None => ProgressBar::new_spinner(),
        };
        bar.set_draw_target(ProgressDrawTarget::stderr());
        let template = if total.is_some() {
            "{bar:30} {pos}/{len} {msg}"
        } else {
            "{spinner} {pos} frames {msg}"
        };
        bar.set_style(
            ProgressStyle::with_template(template)
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        FrameCounter {
            bar: Some(bar),
            count: 0,
        }
    }
}

pub struct Step {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    failed: bool,
}

impl Step {
    fn new(name: &str, spinner: Option<ProgressBar>) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
            spinner,
            failed: false,
        }
    }

    /// Report the step as failed instead of done.
    pub fn fail(mut self) {
        self.failed = true;
    }
}

impl Drop for Step {
    fn drop(&mut self) {
        let mark = if self.failed { "✘" } else { "✔" };
        let message = format!("{mark} {} ({})", self.name, format_elapsed(self.start.elapsed()));
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

pub struct FrameCounter {
    bar: Option<ProgressBar>,
    count: u64,
}

impl FrameCounter {
    /// Count one processed frame. `status` is shown next to the counter.
    pub fn tick(&mut self, status: Option<&str>) {
        self.count += 1;
        if let Some(bar) = &self.bar {
            bar.inc(1);
            if let Some(status) = status {
                bar.set_message(status.to_string());
            }
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Drop for FrameCounter {
    fn drop(&mut self) {
        match &self.bar {
            Some(bar) => bar.finish_and_clear(),
            None => eprintln!("==> {} frames", self.count),
        }
    }
}

fn format_elapsed(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
