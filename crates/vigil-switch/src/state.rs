//! Status state machine
//!
//! Transitions:
//!
//! ```text
//! (seal) → Armed ──checkIn──→ Armed
//!   Armed ──pause──→ Paused ──resume──→ Armed
//!   Armed ──deadline passed──→ Triggered ──k releases──→ Released
//!   Armed/Paused ──cancel──→ Cancelled
//! ```
//!
//! Cancelled and Released are terminal. The evaluator is idempotent and
//! re-entrant safe: re-evaluating a triggered switch never reverts it,
//! and repeating a transition that already took effect is a no-op.

use thiserror::Error;

use crate::switch::{Switch, SwitchStatus};

#[derive(Error, Debug)]
pub enum SwitchError {
    /// An illegal transition was requested. Bug-class; surfaced unchanged.
    #[error("illegal transition from {from:?} to {to:?}")]
    StateViolation {
        from: SwitchStatus,
        to: SwitchStatus,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Switch {
    /// Record an owner check-in, resetting the deadline.
    pub fn check_in(&mut self, now: u64) -> Result<(), SwitchError> {
        match self.status {
            SwitchStatus::Armed => {
                if now > self.last_checkin {
                    self.last_checkin = now;
                }
                Ok(())
            }
            from => Err(SwitchError::StateViolation {
                from,
                to: SwitchStatus::Armed,
            }),
        }
    }

    /// Freeze the deadline. Only an armed switch can pause.
    pub fn pause(&mut self) -> Result<(), SwitchError> {
        match self.status {
            SwitchStatus::Armed => {
                self.status = SwitchStatus::Paused;
                Ok(())
            }
            SwitchStatus::Paused => Ok(()),
            from => Err(SwitchError::StateViolation {
                from,
                to: SwitchStatus::Paused,
            }),
        }
    }

    /// Re-arm a paused switch; the deadline restarts at `now + interval`.
    pub fn resume(&mut self, now: u64) -> Result<(), SwitchError> {
        match self.status {
            SwitchStatus::Paused => {
                self.status = SwitchStatus::Armed;
                self.last_checkin = now;
                Ok(())
            }
            SwitchStatus::Armed => Ok(()),
            from => Err(SwitchError::StateViolation {
                from,
                to: SwitchStatus::Armed,
            }),
        }
    }

    /// Owner-initiated cancellation. Terminal.
    pub fn cancel(&mut self) -> Result<(), SwitchError> {
        match self.status {
            SwitchStatus::Armed | SwitchStatus::Paused => {
                self.status = SwitchStatus::Cancelled;
                Ok(())
            }
            SwitchStatus::Cancelled => Ok(()),
            from => Err(SwitchError::StateViolation {
                from,
                to: SwitchStatus::Cancelled,
            }),
        }
    }

    /// Run the expiry check.
    ///
    /// `observed_checkin` is the maximum `created_at` among the owner's
    /// check-in events seen on the relays; the deadline is computed from
    /// the freshest of local and observed so a reset local clock cannot
    /// un-expire a switch. Returns the (possibly unchanged) status.
    pub fn evaluate(&mut self, observed_checkin: Option<u64>, now: u64) -> SwitchStatus {
        if let Some(observed) = observed_checkin {
            if observed > self.last_checkin {
                self.last_checkin = observed;
            }
        }

        if self.status == SwitchStatus::Armed && now >= self.deadline() {
            self.status = SwitchStatus::Triggered;
        }

        self.status
    }

    /// Record that `released` guardians have published release events.
    ///
    /// Moves Triggered → Released once the threshold is met; short counts
    /// leave the status untouched.
    pub fn note_releases(&mut self, released: usize) -> Result<SwitchStatus, SwitchError> {
        match self.status {
            SwitchStatus::Triggered => {
                if released >= self.threshold as usize {
                    self.status = SwitchStatus::Released;
                }
                Ok(self.status)
            }
            SwitchStatus::Released => Ok(self.status),
            from => Err(SwitchError::StateViolation {
                from,
                to: SwitchStatus::Released,
            }),
        }
    }
}
