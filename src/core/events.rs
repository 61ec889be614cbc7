//! Media load event queue.
//!
//! Load completions arrive from background fetch threads and are not
//! guaranteed to land on a frame boundary. They are queued here and drained
//! exactly once per tick by the controller, which is the only writer of
//! playback state — completions themselves never mutate anything beyond
//! marking a resource handle.

use crossbeam_channel::{unbounded, Receiver, Sender};

/// A load completion for one resource. `token` is the request token the
/// load was issued under; stale tokens are discarded at drain time.
#[derive(Debug, Clone)]
pub enum MediaEvent {
    Loaded { id: String, token: u64 },
    Failed {
        id: String,
        token: u64,
        reason: String,
    },
}

/// Unbounded MPSC queue between fetch threads and the tick loop.
#[derive(Debug)]
pub struct MediaEventQueue {
    tx: Sender<MediaEvent>,
    rx: Receiver<MediaEvent>,
}

impl Default for MediaEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaEventQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Sender handle for loader threads.
    pub fn sender(&self) -> Sender<MediaEvent> {
        self.tx.clone()
    }

    /// Take everything queued since the last drain. Non-blocking.
    pub fn drain(&self) -> Vec<MediaEvent> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
