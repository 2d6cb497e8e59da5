use crate::error::StationError;
use parking_lot::Mutex;
use signal_types::SignalPack;
use tokio::sync::mpsc;

/// Bounded per-participant outbound queue (capacity 100, §4.2): enqueue
/// blocks when full rather than dropping, the "blocking-send" choice
/// recorded in §9's bounded-queue backpressure note.
pub const QUEUE_CAPACITY: usize = 100;

pub(crate) struct ParticipantQueue {
    tx: Mutex<Option<mpsc::Sender<SignalPack>>>,
}

impl ParticipantQueue {
    pub fn new() -> (Self, mpsc::Receiver<SignalPack>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Enqueues `pack`, blocking if the queue is full. Returns
    /// [`StationError::QueueClosed`] once [`Self::close`] has run.
    pub async fn push(&self, pack: SignalPack) -> Result<(), StationError> {
        let tx = self.tx.lock().clone();
        match tx {
            Some(tx) => tx.send(pack).await.map_err(|_| StationError::QueueClosed),
            None => Err(StationError::QueueClosed),
        }
    }

    /// Idempotent. Dropping the last sender causes the paired receiver's
    /// `recv().await` to return `None`, which is how `StartListen` learns
    /// to return.
    pub fn close(&self) {
        self.tx.lock().take();
    }
}
