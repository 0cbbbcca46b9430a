//! User-facing progress and outcome reporting.

use std::future::Future;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;

/// Surface the command layer reports to.
pub trait Reporter {
    /// Start a progress indicator; it is cleared by [`Reporter::finish`].
    fn start(&mut self, message: &str);

    fn finish(&mut self);

    fn success(&mut self, message: &str);

    fn failure(&mut self, message: &str);

    fn info(&mut self, message: &str);

    fn json(&mut self, value: &Value);
}

/// Run `fut` with a progress indicator shown for its duration.
pub async fn with_spinner<R, F, T>(reporter: &mut R, message: &str, fut: F) -> T
where
    R: Reporter + ?Sized,
    F: Future<Output = T>,
{
    reporter.start(message);
    let result = fut.await;
    reporter.finish();
    result
}

/// Terminal reporter: indicatif spinner, colored marks on stdout/stderr.
#[derive(Default)]
pub struct ConsoleReporter {
    spinner: Option<ProgressBar>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for ConsoleReporter {
    fn start(&mut self, message: &str) {
        let pb = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(template);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        self.spinner = Some(pb);
    }

    fn finish(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    fn success(&mut self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    fn failure(&mut self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    fn info(&mut self, message: &str) {
        println!("{}", message);
    }

    fn json(&mut self, value: &Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(_) => println!("{}", value),
        }
    }
}

/// Records everything reported, for tests and embedding.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<Reported>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reported {
    Start(String),
    Finish,
    Success(String),
    Failure(String),
    Info(String),
    Json(Value),
}

impl Reporter for RecordingReporter {
    fn start(&mut self, message: &str) {
        self.events.push(Reported::Start(message.to_string()));
    }

    fn finish(&mut self) {
        self.events.push(Reported::Finish);
    }

    fn success(&mut self, message: &str) {
        self.events.push(Reported::Success(message.to_string()));
    }

    fn failure(&mut self, message: &str) {
        self.events.push(Reported::Failure(message.to_string()));
    }

    fn info(&mut self, message: &str) {
        self.events.push(Reported::Info(message.to_string()));
    }

    fn json(&mut self, value: &Value) {
        self.events.push(Reported::Json(value.clone()));
    }
}
