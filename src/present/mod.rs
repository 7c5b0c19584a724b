//! Result Presentation
//!
//! Renders the extracted items as a list, or the explicit empty-state view
//! when nothing was found. Purely presentational: errors are reported by
//! the producing stage before results ever reach this module. Also hosts
//! the console implementation of the pipeline's feedback surface.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;

use crate::extract::EntityItem;
use crate::pipeline::Feedback;

/// Output format for the results list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable list
    #[default]
    Table,
    /// JSON array of items
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Render the ordered item list to the given writer
pub fn render(items: &[EntityItem], format: OutputFormat, out: &mut impl Write) -> io::Result<()> {
    match format {
        OutputFormat::Table => render_table(items, out),
        OutputFormat::Json => render_json(items, out),
    }
}

fn render_table(items: &[EntityItem], out: &mut impl Write) -> io::Result<()> {
    if items.is_empty() {
        writeln!(out, "No entities found in the captured text.")?;
        return Ok(());
    }

    writeln!(out, "Found {} entities:", items.len())?;
    writeln!(out)?;

    let name_width = items.iter().map(|i| i.name.len()).max().unwrap_or(0);
    for (index, item) in items.iter().enumerate() {
        writeln!(
            out,
            "{:3}. {:name_width$}  [{}]  {}",
            index + 1,
            item.name,
            item.kind,
            item.description,
        )?;
    }

    Ok(())
}

fn render_json(items: &[EntityItem], out: &mut impl Write) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, items)?;
    writeln!(out)
}

/// Console feedback: an indicatif spinner for the busy indicator, stderr
/// lines for transient notices
pub struct SpinnerFeedback {
    spinner: Mutex<Option<ProgressBar>>,
}

impl SpinnerFeedback {
    /// Create the feedback surface; the spinner appears on first busy
    pub fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
        }
    }
}

impl Default for SpinnerFeedback {
    fn default() -> Self {
        Self::new()
    }
}

impl Feedback for SpinnerFeedback {
    fn set_busy(&self, busy: bool) {
        let mut guard = self.spinner.lock().unwrap_or_else(|e| e.into_inner());
        if busy {
            if guard.is_none() {
                let bar = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
                    bar.set_style(style);
                }
                bar.set_message("Scanning...");
                bar.enable_steady_tick(Duration::from_millis(80));
                *guard = Some(bar);
            }
        } else if let Some(bar) = guard.take() {
            bar.finish_and_clear();
        }
    }

    fn notice(&self, message: &str) {
        let guard = self.spinner.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(bar) => bar.println(message),
            None => eprintln!("{}", message),
        }
    }
}
