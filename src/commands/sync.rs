//! Main sync command

use crate::executor::{run_pass, Pass, ProgressSink, SyncEvent};
use crate::types::{RunReport, SyncError};
use crate::Config;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Merged reports of every pass a run performed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub metadata: Option<RunReport>,
    pub links: Option<RunReport>,
}

impl SyncSummary {
    fn slot(&mut self, pass: Pass) -> &mut Option<RunReport> {
        match pass {
            Pass::Links => &mut self.links,
            Pass::Metadata => &mut self.metadata,
        }
    }

    /// Fold one per-source report into the pass total.
    pub fn record(&mut self, pass: Pass, report: &RunReport) {
        self.slot(pass)
            .get_or_insert_with(RunReport::default)
            .merge(report);
    }

    pub fn total_errors(&self) -> u64 {
        self.metadata.map_or(0, |r| r.errors) + self.links.map_or(0, |r| r.errors)
    }
}

/// Run the sync operation
pub fn run(config: Config) -> Result<SyncSummary, SyncError> {
    run_with_progress(&config, None)
}

/// Run every selected pass over every source, in pass order.
///
/// All sources get their metadata pass before any link pass starts. A
/// run-level failure stops the command; per-file failures only count.
pub fn run_with_progress(
    config: &Config,
    sink: Option<ProgressSink>,
) -> Result<SyncSummary, SyncError> {
    config.validate()?;

    let mut summary = SyncSummary::default();
    for pass in config.passes.passes() {
        for source in &config.sources {
            let job = config.job_for(source, *pass)?;
            let report = run_pass(&job, *pass, sink.clone())?;
            summary.record(*pass, &report);
        }
    }
    Ok(summary)
}

/// Human-readable totals per pass
pub fn format_summary(summary: &SyncSummary) -> String {
    let mut lines = Vec::new();
    for (label, report) in [("Metadata", summary.metadata), ("Links", summary.links)] {
        if let Some(report) = report {
            lines.push(format!("{} pass:", label));
            for line in report.to_string().lines() {
                lines.push(format!("  {}", line));
            }
        }
    }
    if lines.is_empty() {
        return "Nothing to do.".to_string();
    }
    lines.join("\n")
}

/// Per-file failure collected from progress events
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    kind: &'static str,
    path: PathBuf,
    message: String,
}

impl ErrorRecord {
    /// Build a record from a failure event; other events yield `None`.
    pub fn from_event(event: &SyncEvent) -> Option<Self> {
        match event {
            SyncEvent::TaskFailed {
                path, kind, error, ..
            } => Some(Self {
                kind: *kind,
                path: path.clone(),
                message: error.clone(),
            }),
            _ => None,
        }
    }
}

/// Progress sink that collects failures, chained in front of `inner`.
pub fn collecting_sink(
    records: Arc<Mutex<Vec<ErrorRecord>>>,
    inner: Option<ProgressSink>,
) -> ProgressSink {
    Arc::new(move |event: &SyncEvent| {
        if let Some(record) = ErrorRecord::from_event(event) {
            if let Ok(mut records) = records.lock() {
                records.push(record);
            }
        }
        if let Some(inner) = &inner {
            inner(event);
        }
    })
}

/// Failures grouped by kind, first three of each shown.
pub fn format_error_summary(records: &[ErrorRecord]) -> String {
    let mut groups: BTreeMap<&'static str, Vec<&ErrorRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.kind).or_default().push(record);
    }

    let mut lines = Vec::new();
    lines.push("Error summary:".to_string());
    for (kind, items) in groups {
        lines.push(format!("  {} ({}):", kind, items.len()));
        for record in items.iter().take(3) {
            lines.push(format!("    - {}", record.message));
            lines.push(format!("      Path: {}", record.path.display()));
        }
        if items.len() > 3 {
            lines.push(format!("    - ... {} more", items.len() - 3));
        }
    }
    lines.join("\n")
}
