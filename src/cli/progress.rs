use std::time::{Duration, Instant};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use crate::events::{EventPayload, JobEvent, LogLevel};
use crate::models::record::ResultRecord;
use crate::pipeline::{JobOutcome, JobStatus};
use crate::utils::formatting::{format_duration, format_rate};

/// Terminal view of one running job: a work bar, a status spinner and
/// findings printed above them.
pub struct JobProgress {
    multi: MultiProgress,
    work_bar: Option<ProgressBar>,
    status_bar: ProgressBar,
    findings: u64,
    verbose: bool,
    start_time: Instant,
}

impl JobProgress {
    pub fn new(label: &str, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let status_bar = multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
            status_bar.set_style(style);
        }
        status_bar.set_message(format!("Starting {}...", label));
        status_bar.enable_steady_tick(Duration::from_millis(120));

        Self {
            multi,
            work_bar: None,
            status_bar,
            findings: 0,
            verbose,
            start_time: Instant::now(),
        }
    }

    pub fn handle_event(&mut self, event: &JobEvent) {
        match &event.payload {
            EventPayload::Log { level, message } => {
                if *level == LogLevel::Debug && !self.verbose {
                    return;
                }
                self.println(&render_log(*level, message));
            }
            EventPayload::Result { record } => {
                self.findings += 1;
                self.println(&render_record(record));
                self.update_status(None);
            }
            EventPayload::Progress { completed, total } => {
                if let Some(total) = total {
                    let bar = self.work_bar(*total);
                    bar.set_position(*completed);
                }
                self.update_status(Some(*completed));
            }
            EventPayload::Complete { outcome } => self.finish(outcome),
        }
    }

    fn work_bar(&mut self, total: u64) -> &ProgressBar {
        let multi = &self.multi;
        let status_bar = &self.status_bar;
        let bar = self.work_bar.get_or_insert_with(|| {
            let bar = multi.insert_before(status_bar, ProgressBar::new(total));
            if let Ok(style) = ProgressStyle::default_bar()
                .template("  {bar:30.cyan/dark_gray} {pos}/{len} | eta {eta}")
            {
                bar.set_style(style.progress_chars("█▓░"));
            }
            bar
        });
        if bar.length() != Some(total) {
            bar.set_length(total);
        }
        bar
    }

    fn update_status(&self, completed: Option<u64>) {
        let elapsed = self.start_time.elapsed().as_millis() as u64;
        let rate = completed
            .map(|c| format!(" | {}", format_rate(c, elapsed)))
            .unwrap_or_default();
        self.status_bar.set_message(format!(
            "{} | {} findings{}",
            format_duration(elapsed),
            self.findings,
            rate,
        ));
    }

    fn finish(&mut self, outcome: &JobOutcome) {
        if let Some(bar) = self.work_bar.take() {
            match outcome.status {
                JobStatus::Completed => bar.finish_and_clear(),
                _ => bar.abandon(),
            }
        }
        self.status_bar.finish_with_message(render_outcome(outcome));
    }

    /// Print a line above the bars.
    pub fn println(&self, msg: &str) {
        let _ = self.multi.println(msg);
    }
}

pub fn render_log(level: LogLevel, message: &str) -> String {
    match level {
        LogLevel::Debug => format!("  {}", style(message).dim()),
        LogLevel::Info => format!("  {} {}", style("·").cyan(), message),
        LogLevel::Warn => format!("  {} {}", style("!").yellow().bold(), style(message).yellow()),
        LogLevel::Error => format!("  {} {}", style("✗").red().bold(), style(message).red()),
    }
}

pub fn render_record(record: &ResultRecord) -> String {
    let marker = match record {
        ResultRecord::Credential { .. } => style("⚑").red().bold(),
        ResultRecord::Poc { matched: Some(true), .. } => style("⚑").red().bold(),
        ResultRecord::Poc { error: Some(_), .. } => style("⚑").yellow(),
        _ => style("⚑").green(),
    };
    format!("  {} {}", marker, record.summary())
}

pub fn render_outcome(outcome: &JobOutcome) -> String {
    let status = match outcome.status {
        JobStatus::Completed => style(outcome.status.as_str()).green().bold(),
        JobStatus::Cancelled => style(outcome.status.as_str()).yellow().bold(),
        JobStatus::Failed | JobStatus::Running | JobStatus::Paused => style(outcome.status.as_str()).red().bold(),
    };
    let mut line = format!(
        "Job {}: {} findings | {}/{} items | {}",
        status,
        outcome.findings,
        outcome.completed,
        outcome.dispatched,
        format_duration(outcome.duration_ms),
    );
    if let Some(error) = &outcome.error {
        line.push_str(&format!(" | {}", style(error).red()));
    }
    line
}
