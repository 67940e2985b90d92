use tokio::sync::mpsc;

/// Starts status tracking for freshly persisted swaps. Fire and forget.
pub trait SwapStatusNotifier: Send + Sync {
    fn subscribe(&self, swap_ids: &[String]);
}

/// Hands swap ids to whatever task owns the provider's status stream.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Vec<String>>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SwapStatusNotifier for ChannelNotifier {
    fn subscribe(&self, swap_ids: &[String]) {
        if self.tx.send(swap_ids.to_vec()).is_err() {
            tracing::warn!(?swap_ids, "swap status subscriber is gone");
        }
    }
}
