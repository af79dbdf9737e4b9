//! Repair progress reporting.
//!
//! Reports observable progress while `shardrepair repair` runs so operators
//! see what is being enumerated and how much is left. Progress is emitted on
//! **stderr** so the repair log on stdout stays parseable for scripts.

use std::io::Write;

/// A single progress event for a repair run.
#[derive(Clone, Debug, PartialEq)]
pub enum RepairProgressEvent {
    /// Object ids are being enumerated. Total unknown.
    Enumerating { collection: String },
    /// Repair reads in progress: n objects processed out of total.
    Repairing {
        collection: String,
        n: u64,
        total: u64,
    },
    /// The job was stopped before completion.
    Stopped {
        collection: String,
        n: u64,
        total: u64,
    },
}

/// Reports repair progress. Implementations write to stderr (human or JSON).
pub trait RepairProgressReporter: Send + Sync {
    fn report(&self, event: RepairProgressEvent);
}

/// Human-friendly progress on stderr: "repair Article  1,500 / 3,250 objects (46%)".
pub struct StderrProgress;

impl RepairProgressReporter for StderrProgress {
    fn report(&self, event: RepairProgressEvent) {
        let line = match &event {
            RepairProgressEvent::Enumerating { collection } => {
                format!("repair {}  enumerating objects...\n", collection)
            }
            RepairProgressEvent::Repairing {
                collection,
                n,
                total,
            } => format!(
                "repair {}  {} / {} objects ({}%)\n",
                collection,
                format_number(*n),
                format_number(*total),
                percent(*n, *total)
            ),
            RepairProgressEvent::Stopped {
                collection,
                n,
                total,
            } => format!(
                "repair {}  stopped at {} / {} objects\n",
                collection,
                format_number(*n),
                format_number(*total)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl RepairProgressReporter for JsonProgress {
    fn report(&self, event: RepairProgressEvent) {
        let obj = match &event {
            RepairProgressEvent::Enumerating { collection } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "phase": "enumerating"
            }),
            RepairProgressEvent::Repairing {
                collection,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "phase": "repairing",
                "n": n,
                "total": total
            }),
            RepairProgressEvent::Stopped {
                collection,
                n,
                total,
            } => serde_json::json!({
                "event": "stopped",
                "collection": collection,
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl RepairProgressReporter for NoProgress {
    fn report(&self, _event: RepairProgressEvent) {}
}

fn percent(n: u64, total: u64) -> u64 {
    if total == 0 {
        100
    } else {
        (n.min(total) * 100) / total
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn RepairProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
