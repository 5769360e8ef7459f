// Wait set construction, blocking policy, and the OS-level wait.

use std::fmt;
use std::io;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

/// Descriptor sets reported by a transfer engine for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorSets {
    pub read: Vec<RawFd>,
    pub write: Vec<RawFd>,
    pub exceptional: Vec<RawFd>,
}

impl DescriptorSets {
    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty() && self.exceptional.is_empty()
    }

    /// Highest descriptor in any set, if there is one.
    pub fn max_fd(&self) -> Option<RawFd> {
        self.read
            .iter()
            .chain(&self.write)
            .chain(&self.exceptional)
            .copied()
            .max()
    }
}

/// How long the wait step may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTimeout {
    /// Return immediately
    Zero,
    /// Block at most this long
    Bounded(Duration),
    /// Block until a descriptor becomes ready
    Indefinite,
}

impl WaitTimeout {
    pub fn as_duration(self) -> Option<Duration> {
        match self {
            WaitTimeout::Zero => Some(Duration::ZERO),
            WaitTimeout::Bounded(d) => Some(d),
            WaitTimeout::Indefinite => None,
        }
    }

    /// Milliseconds for poll(2): rounds up so a wait never ends before the
    /// deadline, and `-1` for indefinite.
    pub fn as_poll_millis(self) -> libc::c_int {
        match self.as_duration() {
            None => -1,
            Some(d) => {
                let mut millis = d.as_millis();
                if d.subsec_nanos() % 1_000_000 != 0 {
                    millis += 1;
                }
                millis.min(libc::c_int::MAX as u128) as libc::c_int
            }
        }
    }
}

/// Blocking policy for one cycle.
///
/// Pending reformats forbid blocking. Otherwise the next deadline bounds the
/// wait, clamped to zero once it has passed; with no deadline the wait is
/// indefinite.
pub fn compute_timeout(
    reformat_pending: bool,
    next_deadline: Option<Instant>,
    now: Instant,
) -> WaitTimeout {
    if reformat_pending {
        return WaitTimeout::Zero;
    }

    match next_deadline {
        None => WaitTimeout::Indefinite,
        Some(deadline) => match deadline.checked_duration_since(now) {
            Some(remaining) if !remaining.is_zero() => WaitTimeout::Bounded(remaining),
            _ => WaitTimeout::Zero,
        },
    }
}

/// The descriptors one cycle waits on, in poll(2) layout.
///
/// A descriptor appearing in several sets gets a single entry with the
/// union of its interests.
#[derive(Default)]
pub struct WaitSet {
    entries: Vec<libc::pollfd>,
}

impl fmt::Debug for WaitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.fd, e.events, e.revents)))
            .finish()
    }
}

impl WaitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a transfer engine's read/write/exceptional sets.
    pub fn merge(&mut self, sets: &DescriptorSets) {
        for &fd in &sets.read {
            self.add(fd, libc::POLLIN);
        }
        for &fd in &sets.write {
            self.add(fd, libc::POLLOUT);
        }
        for &fd in &sets.exceptional {
            self.add(fd, libc::POLLPRI);
        }
    }

    pub fn add_readable(&mut self, fd: RawFd) {
        self.add(fd, libc::POLLIN);
    }

    fn add(&mut self, fd: RawFd, events: libc::c_short) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.fd == fd) {
            entry.events |= events;
        } else {
            self.entries.push(libc::pollfd {
                fd,
                events,
                revents: 0,
            });
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, fd: RawFd) -> bool {
        self.entries.iter().any(|e| e.fd == fd)
    }

    /// Whether the last wait reported `fd` as readable.
    pub fn is_readable(&self, fd: RawFd) -> bool {
        self.entries
            .iter()
            .any(|e| e.fd == fd && e.revents & libc::POLLIN != 0)
    }

    /// Mark `fd` readable without a system call; used by in-process pollers.
    pub fn set_readable(&mut self, fd: RawFd) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.fd == fd) {
            entry.revents |= libc::POLLIN;
        }
    }

    fn clear_revents(&mut self) {
        for entry in &mut self.entries {
            entry.revents = 0;
        }
    }

    fn as_mut_slice(&mut self) -> &mut [libc::pollfd] {
        &mut self.entries
    }
}

/// The single suspension point of a poll cycle.
pub trait Poller {
    /// Wait until a descriptor in `set` is ready or `timeout` elapses.
    /// Returns the number of ready descriptors.
    fn wait(&mut self, set: &mut WaitSet, timeout: WaitTimeout) -> io::Result<usize>;
}

/// poll(2)-backed waiter.
#[derive(Debug, Default)]
pub struct SysPoller;

impl Poller for SysPoller {
    fn wait(&mut self, set: &mut WaitSet, timeout: WaitTimeout) -> io::Result<usize> {
        set.clear_revents();
        let entries = set.as_mut_slice();

        // SAFETY: `entries` is a valid, exclusively borrowed slice of pollfd
        // for the whole call and its length fits nfds_t.
        let ready = unsafe {
            libc::poll(
                entries.as_mut_ptr(),
                entries.len() as libc::nfds_t,
                timeout.as_poll_millis(),
            )
        };

        if ready < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(ready as usize)
    }
}
