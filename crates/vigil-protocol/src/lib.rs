//! Vigil Protocol Module
//!
//! The three engines that move a switch through its life:
//!
//! - [`seal`] — owner side: encrypt, split, wrap, publish (plus check-in
//!   and cancel event publication)
//! - [`guardian`] — escrow side: poll for liveness, release shares to
//!   recipients once the switch is overdue past grace
//! - [`recover`] — recipient side: collect released shares, reconstruct
//!   the key, decrypt the message with no server in the loop
//!
//! All network access goes through [`vigil_relay::RelayTransport`], all
//! timing through [`vigil_switch::Clock`], so every path here is
//! exercised end to end in `tests/e2e_lifecycle.rs` without touching a
//! real relay or the wall clock.

pub mod guardian;
pub mod recover;
pub mod seal;

pub use guardian::{CycleOutcome, GuardianNode, NoHook, ReleaseHook, GRACE_SECS};
pub use recover::{recover, recover_with_password, RecoverError, RecoveredMessage};
pub use seal::{seal, SealError, SealReceipt};
