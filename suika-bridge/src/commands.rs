//! Control commands from the serving side to the ingestion task.
//!
//! Handlers never touch the snapshot store directly. They enqueue a command
//! and the ingestion task, as the only writer, applies it between frames.

use tokio::sync::mpsc;

/// Commands queued before this many are pending get rejected.
pub const COMMAND_QUEUE_DEPTH: usize = 8;

/// A request for the ingestion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeCommand {
    /// Zero the snapshot and clear counters, last error and raw record.
    Reset,
}

/// Create the bounded command queue.
pub fn command_channel() -> (mpsc::Sender<BridgeCommand>, mpsc::Receiver<BridgeCommand>) {
    mpsc::channel(COMMAND_QUEUE_DEPTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_is_bounded() {
        let (tx, mut rx) = command_channel();
        for _ in 0..COMMAND_QUEUE_DEPTH {
            tx.try_send(BridgeCommand::Reset).unwrap();
        }
        assert!(matches!(
            tx.try_send(BridgeCommand::Reset),
            Err(mpsc::error::TrySendError::Full(BridgeCommand::Reset))
        ));

        assert_eq!(rx.try_recv(), Ok(BridgeCommand::Reset));
        tx.try_send(BridgeCommand::Reset).unwrap();
    }
}
