// Cross-thread envelope channel
//
// A bounded tokio mpsc queue carries the envelopes; a self-pipe carries one
// byte per envelope so the main loop can wait on a plain descriptor alongside
// the transfer descriptors. The queue, not the pipe, defines delivery order.
//
// Producers reserve a queue slot, write the notification byte, and only then
// hand the envelope to the slot. A failed write releases the slot, so an
// envelope is never queued without its byte.

use super::BridgeError;
use crate::models::Envelope;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Largest accepted channel capacity. Every reserved or queued envelope owns
/// one pending byte in the notification pipe, and this stays within the
/// smallest pipe buffer a Unix kernel hands out (one page).
pub const MAX_CHANNEL_CAPACITY: usize = 4096;

/// Create a connected sender/receiver pair holding at most `capacity`
/// undelivered envelopes.
pub fn envelope_channel(capacity: usize) -> Result<(EnvelopeSender, EnvelopeReceiver), BridgeError> {
    if capacity == 0 {
        return Err(BridgeError::ZeroCapacity);
    }
    if capacity > MAX_CHANNEL_CAPACITY {
        return Err(BridgeError::CapacityTooLarge {
            capacity,
            max: MAX_CHANNEL_CAPACITY,
        });
    }

    let (read_end, write_end) = notify_pipe()?;
    let write_end = Arc::new(File::from(write_end));
    let (tx, rx) = mpsc::channel(capacity);

    tracing::debug!(
        "Envelope channel created: capacity={}, notify_fd={}",
        capacity,
        read_end.as_raw_fd()
    );

    Ok((
        EnvelopeSender {
            tx,
            notify: write_end.clone(),
        },
        EnvelopeReceiver {
            rx,
            notify: File::from(read_end),
            _keepalive: write_end,
        },
    ))
}

/// Producer half, used from toolkit threads.
#[derive(Clone)]
pub struct EnvelopeSender {
    tx: mpsc::Sender<Envelope>,
    notify: Arc<File>,
}

impl EnvelopeSender {
    /// Enqueue an envelope, blocking while the channel is full.
    ///
    /// Must not be called from the thread that runs the poll loop.
    pub fn send(&self, envelope: Envelope) -> Result<(), BridgeError> {
        let permit = futures::executor::block_on(self.tx.reserve())
            .map_err(|_| BridgeError::Disconnected)?;
        self.notify_one()?;
        permit.send(envelope);
        Ok(())
    }

    /// Enqueue an envelope without blocking.
    pub fn try_send(&self, envelope: Envelope) -> Result<(), BridgeError> {
        let permit = match self.tx.try_reserve() {
            Ok(permit) => permit,
            Err(mpsc::error::TrySendError::Full(())) => return Err(BridgeError::ChannelFull),
            Err(mpsc::error::TrySendError::Closed(())) => return Err(BridgeError::Disconnected),
        };
        self.notify_one()?;
        permit.send(envelope);
        Ok(())
    }

    fn notify_one(&self) -> Result<(), BridgeError> {
        loop {
            match (&*self.notify).write(&[1u8]) {
                Ok(1) => return Ok(()),
                Ok(_) => {
                    return Err(BridgeError::Notify(std::io::Error::from(ErrorKind::WriteZero)));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Err(BridgeError::ChannelFull),
                Err(e) => return Err(BridgeError::Notify(e)),
            }
        }
    }
}

/// Consumer half, owned by the main loop.
pub struct EnvelopeReceiver {
    rx: mpsc::Receiver<Envelope>,
    notify: File,
    // Holding a write end keeps the read end from reporting end-of-file
    // once every producer is gone.
    _keepalive: Arc<File>,
}

impl EnvelopeReceiver {
    /// Descriptor that becomes readable while envelopes are pending.
    pub fn notify_fd(&self) -> RawFd {
        self.notify.as_raw_fd()
    }

    /// Take exactly one pending envelope, if its notification unit is
    /// available. An empty or interrupted read yields `None`.
    pub fn recv_one(&mut self) -> Option<Envelope> {
        let mut unit = [0u8; 1];
        match (&self.notify).read(&mut unit) {
            Ok(1) => {}
            Ok(_) => return None,
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to read envelope notification: {}", e);
                return None;
            }
        }

        match self.rx.try_recv() {
            Ok(envelope) => Some(envelope),
            Err(mpsc::error::TryRecvError::Empty) => {
                // The producer that wrote this byte holds a reserved slot and
                // fills it right after the write.
                futures::executor::block_on(self.rx.recv())
            }
            Err(e) => {
                tracing::warn!("Notification without a queued envelope: {:?}", e);
                None
            }
        }
    }
}

/// Pipe with both ends non-blocking.
fn notify_pipe() -> Result<(OwnedFd, OwnedFd), BridgeError> {
    let mut fds: [libc::c_int; 2] = [-1; 2];

    // SAFETY: `fds` is a valid two-element array for pipe(2) to fill.
    if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
        return Err(BridgeError::Pipe(std::io::Error::last_os_error()));
    }

    // SAFETY: pipe(2) succeeded, both descriptors are open and owned by us.
    let (read_end, write_end) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

    for fd in [read_end.as_raw_fd(), write_end.as_raw_fd()] {
        // SAFETY: fd is open for the duration of these calls; F_SETFD,
        // F_GETFL and F_SETFL only touch its flags.
        if unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) } < 0 {
            return Err(BridgeError::Pipe(std::io::Error::last_os_error()));
        }
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 || unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
            return Err(BridgeError::Pipe(std::io::Error::last_os_error()));
        }
    }

    Ok((read_end, write_end))
}
