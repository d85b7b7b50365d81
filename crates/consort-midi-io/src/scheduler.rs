//! Deferred note-off delivery for timed notes.
//!
//! One process-wide thread owns a deadline-ordered heap of pending releases.
//! Each release is independent: no cancellation, no coalescing.

use crate::endpoint::PortSlot;
use crate::error::{Error, Result};
use crate::message::MidiOutputMessage;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

static RELEASE_QUEUE: OnceLock<Option<Sender<PendingRelease>>> = OnceLock::new();
static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

struct PendingRelease {
    due: Instant,
    seq: u64,
    slot: PortSlot,
    message: MidiOutputMessage,
}

impl PendingRelease {
    fn fire(self) {
        let current = self.slot.load_full();
        match &*current {
            Some(port) => {
                if let Err(e) = port.send(self.message.as_bytes()) {
                    warn!("Deferred note-off to '{}' failed: {}", port.name(), e);
                }
            }
            None => debug!("Skipping deferred note-off: endpoint unbound"),
        }
    }
}

impl PartialEq for PendingRelease {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for PendingRelease {}

impl PartialOrd for PendingRelease {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingRelease {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Queue `message` for delivery through `slot` once `delay` has elapsed.
/// A delay the clock cannot represent never comes due and is not queued.
pub(crate) fn schedule_release(
    slot: PortSlot,
    message: MidiOutputMessage,
    delay: Duration,
) -> Result<()> {
    let Some(due) = Instant::now().checked_add(delay) else {
        debug!("Skipping deferred note-off: {:?} is past the clock range", delay);
        return Ok(());
    };

    let queue = release_queue().ok_or_else(|| {
        Error::MidiDevice("MIDI release thread not running".to_string())
    })?;

    let release = PendingRelease {
        due,
        seq: NEXT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
        slot,
        message,
    };
    queue
        .send(release)
        .map_err(|_| Error::MidiDevice("MIDI release thread not running".to_string()))
}

fn release_queue() -> Option<&'static Sender<PendingRelease>> {
    RELEASE_QUEUE
        .get_or_init(|| {
            let (sender, receiver) = unbounded();
            match thread::Builder::new()
                .name("midi-release-thread".to_string())
                .spawn(move || release_thread(receiver))
            {
                Ok(_) => Some(sender),
                Err(e) => {
                    warn!("Failed to spawn MIDI release thread: {}", e);
                    None
                }
            }
        })
        .as_ref()
}

fn release_thread(receiver: Receiver<PendingRelease>) {
    let mut pending: BinaryHeap<Reverse<PendingRelease>> = BinaryHeap::new();

    loop {
        let now = Instant::now();
        while pending
            .peek()
            .is_some_and(|Reverse(release)| release.due <= now)
        {
            if let Some(Reverse(release)) = pending.pop() {
                release.fire();
            }
        }

        let received = match pending.peek() {
            Some(Reverse(next)) => {
                receiver.recv_timeout(next.due.saturating_duration_since(Instant::now()))
            }
            None => receiver
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(release) => pending.push(Reverse(release)),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
