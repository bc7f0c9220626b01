//! Batches file-change notifications into review triggers.

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    FileThreshold,
}

#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub reason: TriggerReason,
    pub file_count: u32,
}

pub struct ReviewTrigger {
    threshold: u32,
    count: Mutex<u32>,
}

impl ReviewTrigger {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            count: Mutex::new(0),
        }
    }

    /// Increments the counter and, once it reaches the threshold, invokes
    /// `on_trigger` synchronously and returns `true`.
    pub async fn on_file_changed(&self, on_trigger: impl FnOnce(TriggerEvent)) -> bool {
        let mut count = self.count.lock().await;
        *count += 1;
        if *count >= self.threshold {
            on_trigger(TriggerEvent {
                reason: TriggerReason::FileThreshold,
                file_count: *count,
            });
            true
        } else {
            false
        }
    }

    pub async fn reset(&self) {
        *self.count.lock().await = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_threshold_of_one_fires_on_first_change() {
        let trigger = ReviewTrigger::new(1);
        let mut fired = false;
        let result = trigger.on_file_changed(|_| fired = true).await;
        assert!(result);
        assert!(fired);
    }

    #[tokio::test]
    async fn higher_threshold_batches_changes() {
        let trigger = ReviewTrigger::new(3);
        assert!(!trigger.on_file_changed(|_| panic!("should not fire")).await);
        assert!(!trigger.on_file_changed(|_| panic!("should not fire")).await);
        let mut fired_count = 0;
        let result = trigger.on_file_changed(|event| fired_count = event.file_count).await;
        assert!(result);
        assert_eq!(fired_count, 3);
    }

    #[tokio::test]
    async fn reset_zeroes_counter() {
        let trigger = ReviewTrigger::new(2);
        trigger.on_file_changed(|_| {}).await;
        trigger.reset().await;
        assert!(!trigger.on_file_changed(|_| panic!("should not fire")).await);
    }
}
