//! Event bridge: the single-threaded poll loop and the plumbing around it.
//!
//! One call to [`EventBridge::poll`] runs a full cycle:
//!
//! 1. Run timer callbacks that are already due
//! 2. Build the wait set from the transfer engine (when `active`) plus the
//!    envelope channel's notification descriptor
//! 3. Pick a timeout with [`compute_timeout`]
//! 4. Wait (the only point where the thread yields to the OS)
//! 5. Dispatch at most one envelope from the toolkit thread
//! 6. Run due timer callbacks again
//! 7. Flush pending reformats
//!
//! The loop reaches its collaborators only through the traits in this module,
//! bundled in a [`PollContext`] owned by the host application.
//!
//! # Components
//!
//! - [`envelope_channel`]: typed, bounded toolkit-to-loop channel with a
//!   pollable notification descriptor
//! - [`WaitSet`], [`Poller`], [`SysPoller`]: wait-set construction and poll(2)
//! - [`HandlerRegistry`]: a [`MessageRouter`] keyed by [`MessageKind`](crate::models::MessageKind)
//! - [`DescriptorRegistry`]: a [`TransferEngine`] over explicitly registered descriptors

pub mod channel;
pub mod poll;
pub mod router;
pub mod transfers;
pub mod wait;

pub use channel::{EnvelopeReceiver, EnvelopeSender, MAX_CHANNEL_CAPACITY, envelope_channel};
pub use poll::{CycleReport, EventBridge, PollContext};
pub use router::HandlerRegistry;
pub use transfers::{DescriptorRegistry, Interest};
pub use wait::{DescriptorSets, Poller, SysPoller, WaitSet, WaitTimeout, compute_timeout};

use crate::models::Envelope;
use std::time::Instant;
use thiserror::Error;

/// Errors raised while setting up or feeding the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Envelope channel capacity must be at least 1")]
    ZeroCapacity,

    #[error("Envelope channel capacity {capacity} exceeds the limit of {max}")]
    CapacityTooLarge { capacity: usize, max: usize },

    #[error("Failed to create notification pipe: {0}")]
    Pipe(std::io::Error),

    #[error("Failed to signal envelope notification: {0}")]
    Notify(std::io::Error),

    #[error("Envelope channel is full")]
    ChannelFull,

    #[error("Event loop has shut down")]
    Disconnected,
}

/// A transfer engine could not describe its descriptors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Transfer engine failed to report descriptors: {0}")]
pub struct TransferError(pub String);

/// In-flight network transfers, seen as descriptor sets.
#[cfg_attr(test, mockall::automock)]
pub trait TransferEngine {
    /// Current read/write/exceptional sets. Must succeed whenever the loop
    /// has been told transfers are active.
    fn descriptor_sets(&mut self) -> Result<DescriptorSets, TransferError>;
}

/// Timer/callback registry.
#[cfg_attr(test, mockall::automock)]
pub trait CallbackRegistry {
    /// Run every callback whose deadline has passed; returns how many ran.
    fn run_due(&mut self) -> usize;

    /// Earliest pending deadline, `None` when nothing is scheduled.
    fn next_deadline(&self) -> Option<Instant>;
}

/// Layout invalidation tracking.
#[cfg_attr(test, mockall::automock)]
pub trait LayoutSubsystem {
    fn is_reformat_pending(&self) -> bool;

    /// Process pending reformats. A no-op when nothing is pending.
    fn flush_reformats(&mut self);
}

/// Application message router; takes ownership of each envelope.
#[cfg_attr(test, mockall::automock)]
pub trait MessageRouter {
    fn dispatch(&mut self, envelope: Envelope);
}
