//! Read-before-write enforcement for one transaction attempt.

use crate::error::{Error, Result, READ_AFTER_WRITE_MESSAGE, READ_ONLY_WRITE_MESSAGE};

/// Phase of an attempt with respect to reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPhase {
    /// Nothing read or written yet.
    #[default]
    Initial,
    /// At least one read was issued, no write yet.
    Reading,
    /// At least one write was recorded; reads are no longer allowed.
    Writing,
}

/// Tracks whether an attempt may still read.
///
/// The phase only moves forward within an attempt. A new attempt starts from
/// a fresh tracker.
#[derive(Debug, Clone, Default)]
pub struct ReadTracker {
    phase: ReadPhase,
    read_only: bool,
}

impl ReadTracker {
    /// Creates a tracker; a read-only tracker rejects every write.
    pub fn new(read_only: bool) -> Self {
        Self {
            phase: ReadPhase::Initial,
            read_only,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ReadPhase {
        self.phase
    }

    /// True for read-only attempts.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Fails if a write was already recorded.
    pub fn check_read(&self) -> Result<()> {
        if self.phase == ReadPhase::Writing {
            return Err(Error::invalid_operation(READ_AFTER_WRITE_MESSAGE));
        }
        Ok(())
    }

    /// Fails for read-only attempts.
    pub fn check_write(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::invalid_operation(READ_ONLY_WRITE_MESSAGE));
        }
        Ok(())
    }

    /// Records a read.
    pub fn record_read(&mut self) -> Result<()> {
        self.check_read()?;
        self.phase = ReadPhase::Reading;
        Ok(())
    }

    /// Records a write that was accepted.
    pub fn record_write(&mut self) -> Result<()> {
        self.check_write()?;
        self.phase = ReadPhase::Writing;
        Ok(())
    }

    /// Back to [`ReadPhase::Initial`].
    pub fn reset(&mut self) {
        self.phase = ReadPhase::Initial;
    }
}
