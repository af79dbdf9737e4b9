//! Foreground repair loop used by `shardrepair repair`.
//!
//! Calls [`RepairSession::continue_repair`] one batch at a time, prints the
//! log delta, reports progress, and checks for a stop signal between
//! batches. A stop never interrupts a batch that is already running.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use anyhow::Result;

use crate::progress::{RepairProgressEvent, RepairProgressReporter};
use crate::repair::JobHandle;
use crate::session::RepairSession;

/// How a driven repair ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveOutcome {
    Completed { total: usize },
    Stopped { processed: usize, total: usize },
}

/// Drive `handle` to completion, or until `stop` resolves.
///
/// Log lines are written to `out`; progress goes to `reporter`.
pub async fn drive_repair<F>(
    session: &mut RepairSession,
    handle: &JobHandle,
    pause: Duration,
    reporter: &dyn RepairProgressReporter,
    out: &mut dyn Write,
    stop: F,
) -> Result<DriveOutcome>
where
    F: Future,
{
    tokio::pin!(stop);

    loop {
        let update = session.continue_repair(handle.id).await?;
        for line in &update.log_delta {
            writeln!(out, "{}", line)?;
        }
        out.flush()?;

        reporter.report(RepairProgressEvent::Repairing {
            collection: handle.collection.clone(),
            n: update.processed as u64,
            total: update.total as u64,
        });

        if update.done {
            return Ok(DriveOutcome::Completed {
                total: update.total,
            });
        }

        tokio::select! {
            biased;
            _ = &mut stop => {
                session.stop_repair(handle.id)?;
                reporter.report(RepairProgressEvent::Stopped {
                    collection: handle.collection.clone(),
                    n: update.processed as u64,
                    total: update.total as u64,
                });
                writeln!(
                    out,
                    "Read repair stopped for '{}' after {} of {} objects.",
                    handle.collection, update.processed, update.total
                )?;
                return Ok(DriveOutcome::Stopped {
                    processed: update.processed,
                    total: update.total,
                });
            }
            _ = tokio::time::sleep(pause) => {}
        }
    }
}
