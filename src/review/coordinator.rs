//! Review Coordinator: owns the tracker/queue/trigger/reviewer for the
//! lifetime of phase 4 and schedules debounced review passes as files change.

use crate::review::feedback_queue::FeedbackQueue;
use crate::review::file_tracker::FileTracker;
use crate::review::reviewer::{ReviewerAgent, ReviewerContext};
use crate::review::trigger::ReviewTrigger;
use crate::spawn::AssistantConfig;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use waypoints_common::{FeedbackItem, ReviewResult};

pub struct ReviewCoordinatorConfig {
    pub file_threshold: u32,
    pub enabled: bool,
}

struct Shared {
    tracker: FileTracker,
    queue: FeedbackQueue,
    trigger: ReviewTrigger,
    reviewer: Mutex<ReviewerAgent>,
    requirements_summary: String,
    interfaces_summary: String,
    pending: Notify,
    pending_flag: AtomicBool,
    is_reviewing: AtomicBool,
    degraded: AtomicBool,
}

/// Phase 4's code-review subsystem. `start()` either wires up all four
/// components or, when disabled, marks itself degraded+active with no
/// construction at all — a deliberately inert no-op mode, not an error path.
/// Cheap to clone: the shared state is reference-counted, so the orchestrator
/// can hand a clone to a `tokio::spawn`ed task per file-change event.
#[derive(Clone)]
pub struct ReviewCoordinator {
    shared: Option<Arc<Shared>>,
    active: bool,
}

impl ReviewCoordinator {
    pub fn new() -> Self {
        Self {
            shared: None,
            active: false,
        }
    }

    pub async fn start(
        &mut self,
        config: ReviewCoordinatorConfig,
        working_dir: impl Into<PathBuf>,
        assistant_config: AssistantConfig,
        requirements_summary: String,
        interfaces_summary: String,
    ) {
        if !config.enabled {
            self.active = true;
            self.shared = None;
            return;
        }

        let mut reviewer = ReviewerAgent::new(assistant_config);
        let degraded = reviewer.start().is_err();

        let shared = Arc::new(Shared {
            tracker: FileTracker::new(working_dir),
            queue: FeedbackQueue::new(),
            trigger: ReviewTrigger::new(config.file_threshold),
            reviewer: Mutex::new(reviewer),
            requirements_summary,
            interfaces_summary,
            pending: Notify::new(),
            pending_flag: AtomicBool::new(false),
            is_reviewing: AtomicBool::new(false),
            degraded: AtomicBool::new(degraded),
        });

        self.shared = Some(shared);
        self.active = true;
    }

    fn degraded(&self) -> bool {
        self.shared
            .as_ref()
            .map(|s| s.degraded.load(Ordering::SeqCst))
            .unwrap_or(true)
    }

    /// No-op unless active and not degraded. Runs on every file-write hook
    /// during phase 4 and must never propagate an error.
    pub async fn on_file_changed(&self, path: &Path, tool_name: &str) {
        if !self.active || self.degraded() {
            return;
        }
        let Some(shared) = self.shared.clone() else { return };

        shared
            .tracker
            .record_change(path.to_path_buf(), tool_name.to_string())
            .await;

        let shared_for_trigger = shared.clone();
        shared
            .trigger
            .on_file_changed(move |_event| {
                shared_for_trigger.pending_flag.store(true, Ordering::SeqCst);
                if shared_for_trigger
                    .is_reviewing
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    let shared = shared_for_trigger.clone();
                    tokio::spawn(run_review_loop(shared));
                } else {
                    shared_for_trigger.pending.notify_one();
                }
            })
            .await;
    }

    /// Returns whatever feedback has accumulated since the last call.
    pub async fn get_pending_feedback(&self) -> Vec<FeedbackItem> {
        match &self.shared {
            Some(shared) => shared.queue.dequeue_all().await,
            None => Vec::new(),
        }
    }

    /// Polls every 500ms until no review is pending or in flight, up to
    /// `timeout` — used at phase 4 completion so feedback from an in-flight
    /// review is not silently discarded.
    pub async fn wait_for_pending_reviews(&self, timeout: Duration) {
        let Some(shared) = &self.shared else { return };
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let busy = shared.is_reviewing.load(Ordering::SeqCst)
                || shared.pending_flag.load(Ordering::SeqCst);
            if !busy {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!("timed out waiting for pending code review to finish");
                return;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

impl Default for ReviewCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_review_loop(shared: Arc<Shared>) {
    loop {
        shared.pending_flag.store(false, Ordering::SeqCst);

        let changed = shared.tracker.pending_changes(|_path| {}).await;
        if !changed.is_empty() {
            let context = ReviewerContext {
                requirements_summary: shared.requirements_summary.clone(),
                changed_files: changed.clone(),
                interfaces_summary: shared.interfaces_summary.clone(),
            };
            let result: ReviewResult = shared.reviewer.lock().await.review(context).await;
            if result.has_issues() {
                let files: Vec<PathBuf> = changed.keys().cloned().collect();
                let message = ReviewerAgent::format_feedback(&result, &files);
                shared
                    .queue
                    .enqueue(FeedbackItem {
                        message,
                        review_result: result,
                        timestamp: chrono::Utc::now(),
                    })
                    .await;
            }
            shared.trigger.reset().await;
            shared.tracker.clear_pending().await;
        }

        if !shared.pending_flag.load(Ordering::SeqCst) {
            break;
        }
    }
    shared.is_reviewing.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_coordinator_is_active_but_inert() {
        let mut coordinator = ReviewCoordinator::new();
        coordinator
            .start(
                ReviewCoordinatorConfig {
                    file_threshold: 1,
                    enabled: false,
                },
                ".",
                AssistantConfig::new(".".into()),
                "reqs".to_string(),
                String::new(),
            )
            .await;
        assert!(coordinator.active);
        assert!(coordinator.degraded());
        coordinator.on_file_changed(Path::new("a.rs"), "Write").await;
        assert!(coordinator.get_pending_feedback().await.is_empty());
    }

    #[tokio::test]
    async fn wait_for_pending_reviews_returns_immediately_when_idle() {
        let mut coordinator = ReviewCoordinator::new();
        coordinator
            .start(
                ReviewCoordinatorConfig {
                    file_threshold: 1,
                    enabled: true,
                },
                ".",
                AssistantConfig::new(".".into()),
                "reqs".to_string(),
                String::new(),
            )
            .await;
        coordinator.wait_for_pending_reviews(Duration::from_millis(50)).await;
    }
}
