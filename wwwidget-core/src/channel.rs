// wwwidget-core/src/channel.rs
use crate::{OutputBatch, WorkerId};
use crossbeam::channel::{Receiver, Sender, TryRecvError, unbounded};

/// One refresh travelling from a worker to the controller
#[derive(Debug, Clone)]
pub struct OutputMessage {
    pub worker: WorkerId,
    /// Label current when the batch was produced
    pub label: String,
    pub batch: OutputBatch,
}

#[derive(Debug, thiserror::Error)]
#[error("output channel closed")]
pub struct ChannelClosed;

/// Producer half, cloned once per worker
#[derive(Clone)]
pub struct OutputSender {
    tx: Sender<OutputMessage>,
}

/// Consumer half, owned by the controller
pub struct OutputReceiver {
    rx: Receiver<OutputMessage>,
}

/// Create the output channel.
///
/// The channel is unbounded so a worker never blocks on send; a slow
/// controller shows up as a growing [`OutputReceiver::backlog`] instead.
/// Messages of one sender arrive in the order they were sent.
pub fn output_channel() -> (OutputSender, OutputReceiver) {
    let (tx, rx) = unbounded();
    (OutputSender { tx }, OutputReceiver { rx })
}

impl OutputSender {
    pub fn send(
        &self,
        worker: WorkerId,
        label: String,
        batch: OutputBatch,
    ) -> Result<(), ChannelClosed> {
        self.tx
            .send(OutputMessage {
                worker,
                label,
                batch,
            })
            .map_err(|_| ChannelClosed)
    }
}

impl OutputReceiver {
    /// Take the oldest pending message without blocking
    pub fn try_take(&self) -> Option<OutputMessage> {
        match self.rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Number of messages waiting to be taken
    pub fn backlog(&self) -> usize {
        self.rx.len()
    }
}
