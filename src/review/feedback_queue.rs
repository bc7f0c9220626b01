//! Holds reviewer feedback until the orchestrator injects it into the
//! assistant's next turn.

use tokio::sync::Mutex;
use waypoints_common::FeedbackItem;

pub struct FeedbackQueue {
    items: Mutex<Vec<FeedbackItem>>,
}

impl FeedbackQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    pub async fn enqueue(&self, item: FeedbackItem) {
        self.items.lock().await.push(item);
    }

    /// Atomically drains and returns every queued item.
    pub async fn dequeue_all(&self) -> Vec<FeedbackItem> {
        std::mem::take(&mut *self.items.lock().await)
    }

    pub async fn peek(&self) -> Option<FeedbackItem> {
        self.items.lock().await.first().cloned()
    }

    pub fn format_for_injection(items: &[FeedbackItem]) -> String {
        items
            .iter()
            .map(|item| item.message.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Default for FeedbackQueue {
    fn default() -> Self {
        Self::new()
    }
}
