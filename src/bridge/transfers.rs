use super::{DescriptorSets, TransferEngine, TransferError};
use indexmap::IndexMap;
use std::os::fd::RawFd;

/// Readiness a transfer is waiting for on its descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interest {
    pub read: bool,
    pub write: bool,
    pub exceptional: bool,
}

impl Interest {
    pub const READ: Interest = Interest {
        read: true,
        write: false,
        exceptional: false,
    };

    pub const WRITE: Interest = Interest {
        read: false,
        write: true,
        exceptional: false,
    };

    pub const READ_WRITE: Interest = Interest {
        read: true,
        write: true,
        exceptional: false,
    };

    pub fn is_empty(&self) -> bool {
        !(self.read || self.write || self.exceptional)
    }
}

/// Transfer engine over descriptors registered by the fetch layer.
///
/// Reports whatever is registered at the time of the call. Registration with
/// an empty interest or a negative descriptor is rejected, so every reported
/// set is well formed.
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    entries: IndexMap<RawFd, Interest>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update `fd`.
    pub fn register(&mut self, fd: RawFd, interest: Interest) -> Result<(), TransferError> {
        if fd < 0 {
            return Err(TransferError(format!("invalid descriptor {}", fd)));
        }
        if interest.is_empty() {
            return Err(TransferError(format!("empty interest for descriptor {}", fd)));
        }
        self.entries.insert(fd, interest);
        Ok(())
    }

    pub fn deregister(&mut self, fd: RawFd) -> bool {
        self.entries.shift_remove(&fd).is_some()
    }

    /// Whether any transfer is in flight.
    pub fn is_active(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TransferEngine for DescriptorRegistry {
    fn descriptor_sets(&mut self) -> Result<DescriptorSets, TransferError> {
        let mut sets = DescriptorSets::default();
        for (&fd, interest) in &self.entries {
            if interest.read {
                sets.read.push(fd);
            }
            if interest.write {
                sets.write.push(fd);
            }
            if interest.exceptional {
                sets.exceptional.push(fd);
            }
        }
        Ok(sets)
    }
}
