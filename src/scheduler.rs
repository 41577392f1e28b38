use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::warn;

/// Quiet interval before a burst of edits is flushed to disk
pub const DEFAULT_QUIET_MS: u64 = 3000;

/// What happened when a scheduled save ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Another save was already in flight; the write was re-armed,
    /// not dropped
    Locked,
    /// The write itself failed; re-armed for retry
    Failed,
}

/// Debounces change notifications into a single snapshot write after a
/// contiguous quiet period, and guards against overlapping writes.
///
/// States: idle (no deadline), pending (deadline armed), saving
/// (guard held for the duration of the write closure). Every change
/// notification restarts the deadline, so the timer only fires after
/// the edits stop.
#[derive(Debug)]
pub struct SaveScheduler {
    quiet: Duration,
    deadline: Option<Instant>,
    saving: bool,
}

impl SaveScheduler {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
            saving: false,
        }
    }

    pub fn quiet_interval(&self) -> Duration {
        self.quiet
    }

    /// Called on every model mutation. Arms the deadline, or pushes
    /// an already-armed one further into the future.
    pub fn note_change(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True once the armed deadline has elapsed
    pub fn due(&self, now: Instant) -> bool {
        self.deadline.map_or(false, |d| now >= d)
    }

    /// Acquire the in-flight guard. Returns false if a save is
    /// already running.
    pub fn begin_save(&mut self) -> bool {
        if self.saving {
            return false;
        }
        self.saving = true;
        true
    }

    /// Release the guard; on failure the deadline is re-armed so the
    /// write is retried instead of silently lost.
    pub fn finish_save(&mut self, now: Instant, success: bool) {
        self.saving = false;
        if success {
            self.deadline = None;
        } else {
            self.deadline = Some(now + self.quiet);
        }
    }

    /// Run one save attempt under the guard. A trip over the guard
    /// re-arms and reports `Locked`; a failed write re-arms and
    /// reports `Failed`.
    pub fn try_save<F>(&mut self, now: Instant, save: F) -> SaveOutcome
    where
        F: FnOnce() -> Result<()>,
    {
        if !self.begin_save() {
            self.deadline = Some(now + self.quiet);
            return SaveOutcome::Locked;
        }
        let result = save();
        match result {
            Ok(()) => {
                self.finish_save(now, true);
                SaveOutcome::Saved
            }
            Err(e) => {
                warn!("save failed: {e:#}");
                self.finish_save(now, false);
                SaveOutcome::Failed
            }
        }
    }

    /// Final synchronous save at shutdown. Retries while the guard
    /// blocks the attempt (a guard still held at shutdown is stale
    /// and gets reclaimed), so the last in-memory edits are written
    /// before the process exits. A write error is logged and not
    /// retried further, matching the best-effort snapshot contract.
    pub fn flush<F>(&mut self, mut save: F) -> SaveOutcome
    where
        F: FnMut() -> Result<()>,
    {
        let mut outcome = self.try_save(Instant::now(), &mut save);
        while outcome == SaveOutcome::Locked {
            self.saving = false;
            outcome = self.try_save(Instant::now(), &mut save);
        }
        outcome
    }
}

impl Default for SaveScheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_QUIET_MS))
    }
}
