//! Flush Scheduler
//!
//! Fires once per day at a configured local time in a configured timezone.
//! The loop is explicit: compute the next trigger instant, sleep until then
//! under the cancellation token, drain the buffer, write every non-empty
//! batch, then run exactly one retention pass. Missed triggers while the
//! process was down are not caught up; the next occurrence fires with
//! whatever has accumulated.
//!
//! Writes and retention run synchronously inside this task. A slow flush
//! delays only the next trigger check; the feed client is unaffected.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::buffer::RecordBuffer;
use crate::infrastructure::storage::{BatchWriter, RetentionEnforcer, RetentionReport};

// =============================================================================
// Schedule
// =============================================================================

/// A daily time-of-day in a named timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushSchedule {
    /// Local wall-clock time of the daily trigger.
    pub flush_time: NaiveTime,
    /// Timezone the trigger and output file dates are interpreted in.
    pub timezone: Tz,
}

impl FlushSchedule {
    /// Create a schedule.
    #[must_use]
    pub const fn new(flush_time: NaiveTime, timezone: Tz) -> Self {
        Self {
            flush_time,
            timezone,
        }
    }

    /// The next trigger instant strictly after `now`.
    ///
    /// A local time that does not exist on a given day (DST gap) or is
    /// ambiguous resolves to the earliest valid instant; if the whole day
    /// has no valid occurrence, the search moves to the next day.
    #[must_use]
    pub fn next_trigger(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_now = now.with_timezone(&self.timezone);

        // Today, tomorrow, and one spare day for DST gaps.
        for offset in 0..=2u64 {
            let Some(date) = local_now.date_naive().checked_add_days(Days::new(offset)) else {
                continue;
            };
            let candidate = self
                .timezone
                .from_local_datetime(&date.and_time(self.flush_time))
                .earliest();
            if let Some(candidate) = candidate
                && candidate > local_now
            {
                return candidate.with_timezone(&Utc);
            }
        }

        // Unreachable for any real timezone; fall back to one day out.
        now + chrono::Duration::hours(24)
    }

    /// The wall-clock date at `now` in the schedule's timezone, used to name
    /// output files.
    #[must_use]
    pub fn current_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Summary of one flush trigger, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushSummary {
    /// Batches written successfully.
    pub batches_written: usize,
    /// Records across all written batches.
    pub records_written: usize,
    /// Batches whose write failed; their records are lost.
    pub batches_failed: usize,
    /// The retention pass run after the writes.
    pub retention: RetentionReport,
}

/// Drives the daily drain-write-evict cycle.
pub struct FlushScheduler {
    schedule: FlushSchedule,
    buffer: Arc<RecordBuffer>,
    writer: BatchWriter,
    retention: RetentionEnforcer,
    cancel: CancellationToken,
}

impl FlushScheduler {
    /// Create a scheduler.
    #[must_use]
    pub const fn new(
        schedule: FlushSchedule,
        buffer: Arc<RecordBuffer>,
        writer: BatchWriter,
        retention: RetentionEnforcer,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            schedule,
            buffer,
            writer,
            retention,
            cancel,
        }
    }

    /// Run the trigger loop until cancelled. An in-progress flush finishes
    /// before the task observes cancellation.
    pub async fn run(self) {
        loop {
            let now = Utc::now();
            let next = self.schedule.next_trigger(now);
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::info!(
                next_trigger = %next,
                wait_secs = wait.as_secs(),
                "flush scheduled"
            );

            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("flush scheduler cancelled, unflushed records are dropped");
                    return;
                }
                () = tokio::time::sleep(wait) => {}
            }

            let date = self.schedule.current_date(Utc::now());
            let summary = self.flush_once(date);
            tracing::info!(
                date = %date,
                batches_written = summary.batches_written,
                records_written = summary.records_written,
                batches_failed = summary.batches_failed,
                storage_bytes = summary.retention.total_bytes_after,
                "flush complete"
            );
        }
    }

    /// Drain the buffer, write every non-empty batch under `date`, then run
    /// one retention pass. Write failures are logged per key and never stop
    /// the flush.
    pub fn flush_once(&self, date: NaiveDate) -> FlushSummary {
        let drained = self.buffer.drain_all();

        let mut batches_written = 0;
        let mut records_written = 0;
        let mut batches_failed = 0;

        for (key, records) in &drained {
            if records.is_empty() {
                continue;
            }
            match self.writer.write_batch(key, date, records) {
                Ok(path) => {
                    batches_written += 1;
                    records_written += records.len();
                    tracing::info!(
                        key = %key,
                        records = records.len(),
                        path = %path.display(),
                        "wrote batch"
                    );
                }
                Err(e) => {
                    batches_failed += 1;
                    tracing::error!(
                        key = %key,
                        records = records.len(),
                        error = %e,
                        "failed to write batch, records lost"
                    );
                }
            }
        }

        let retention = self.retention.enforce();

        FlushSummary {
            batches_written,
            records_written,
            batches_failed,
            retention,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
