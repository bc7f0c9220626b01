//! Reviewer Agent: a second, lighter assistant session that watches phase 4
//! file changes and raises feedback when it finds issues.

use crate::errors::ReviewError;
use crate::spawn::AssistantConfig;
use md5::{Digest, Md5};
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use waypoints_common::ReviewResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewerState {
    Initializing,
    Ready,
    Reviewing,
    Degraded,
}

pub struct ReviewerContext {
    pub requirements_summary: String,
    pub changed_files: HashMap<PathBuf, String>,
    pub interfaces_summary: String,
}

fn numbered_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\s").unwrap())
}

/// Queries a lighter model and turns phase-4 file diffs into a
/// [`ReviewResult`], tracking how often the same issue keeps recurring.
pub struct ReviewerAgent {
    config: AssistantConfig,
    state: ReviewerState,
    issue_counts: HashMap<String, u32>,
}

impl ReviewerAgent {
    pub fn new(config: AssistantConfig) -> Self {
        Self {
            config,
            state: ReviewerState::Initializing,
            issue_counts: HashMap::new(),
        }
    }

    pub fn state(&self) -> ReviewerState {
        self.state
    }

    /// A construction failure degrades the reviewer rather than propagating
    /// — the orchestrator must be able to run phase 4 without code review.
    pub fn start(&mut self) -> Result<(), ReviewError> {
        if self.config.claude_cmd.trim().is_empty() {
            self.state = ReviewerState::Degraded;
            return Err(ReviewError::InitFailure("empty assistant command".to_string()));
        }
        self.state = ReviewerState::Ready;
        Ok(())
    }

    fn build_prompt(&self, context: &ReviewerContext) -> String {
        let mut prompt = String::new();
        prompt.push_str("Review the following changes against the stated requirements. \
If you find no problems, respond with exactly: No issues found. Otherwise list each issue \
as its own bullet point.\n\n");
        prompt.push_str("## Requirements\n\n");
        prompt.push_str(&context.requirements_summary);
        prompt.push('\n');
        if !context.interfaces_summary.trim().is_empty() {
            prompt.push_str("\n## Interfaces\n\n");
            prompt.push_str(&context.interfaces_summary);
            prompt.push('\n');
        }
        prompt.push_str("\n## Changed Files\n");
        let mut paths: Vec<_> = context.changed_files.keys().collect();
        paths.sort();
        for path in paths {
            let content = &context.changed_files[path];
            prompt.push_str(&format!("\n### {}\n\n```\n{content}\n```\n", path.display()));
        }
        prompt
    }

    fn parse_issues(response: &str) -> Vec<String> {
        if response.to_lowercase().contains("no issues found") {
            return Vec::new();
        }

        let mut issues: Vec<String> = Vec::new();
        for line in response.lines() {
            let trimmed = line.trim();
            if let Some(rest) = trimmed
                .strip_prefix('-')
                .or_else(|| trimmed.strip_prefix('*'))
                .or_else(|| trimmed.strip_prefix('\u{2022}'))
            {
                let issue = rest.trim();
                if !issue.is_empty() {
                    issues.push(issue.to_string());
                }
                continue;
            }
            if numbered_line_re().is_match(trimmed) {
                if let Some((_, rest)) = trimmed.split_once(' ') {
                    let issue = rest.trim();
                    if !issue.is_empty() {
                        issues.push(issue.to_string());
                    }
                }
            }
        }

        if issues.is_empty() && response.trim().len() > 30 {
            issues.push(response.trim().to_string());
        }
        issues
    }

    fn digest(issue: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(issue.as_bytes());
        format!("{:x}", hasher.finalize())[..16].to_string()
    }

    /// Empty result if degraded or there is nothing to review. Otherwise
    /// queries the reviewer model with a 120s timeout and parses its reply.
    pub async fn review(&mut self, context: ReviewerContext) -> ReviewResult {
        if self.state == ReviewerState::Degraded || context.changed_files.is_empty() {
            return ReviewResult::default();
        }

        self.state = ReviewerState::Reviewing;
        let prompt = self.build_prompt(&context);
        let config = self.config.clone();
        let text = crate::session::extract_text(
            move || crate::spawn::spawn_turn(&config, &prompt),
            Duration::from_secs(120),
        )
        .await;
        self.state = ReviewerState::Ready;

        let issues = Self::parse_issues(&text);
        let mut cycle_count = 0u32;
        let mut is_repeat_issue = false;
        for issue in &issues {
            let digest = Self::digest(issue);
            let count = self.issue_counts.entry(digest).or_insert(0);
            *count += 1;
            cycle_count = cycle_count.max(*count);
            if *count > 1 {
                is_repeat_issue = true;
            }
        }

        ReviewResult {
            issues,
            is_repeat_issue,
            cycle_count,
        }
    }

    pub fn should_escalate(result: &ReviewResult) -> bool {
        result.is_repeat_issue && result.cycle_count >= 2
    }

    pub fn format_feedback(result: &ReviewResult, files: &[PathBuf]) -> String {
        let mut names: Vec<_> = files.iter().map(|p| p.display().to_string()).collect();
        names.sort();
        let mut out = String::new();
        out.push_str("Code review feedback on: ");
        out.push_str(&names.join(", "));
        out.push_str(&format!("\n(review cycle count: {})\n\n", result.cycle_count));
        for issue in &result.issues {
            out.push_str(&format!("- {issue}\n"));
        }
        out.push_str("\nAddress these before continuing with new work.\n");
        out
    }

    pub fn stop(&mut self) {
        self.state = ReviewerState::Degraded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(files: HashMap<PathBuf, String>) -> ReviewerContext {
        ReviewerContext {
            requirements_summary: "build a widget".to_string(),
            changed_files: files,
            interfaces_summary: String::new(),
        }
    }

    #[test]
    fn parse_issues_recognizes_no_issues_phrase() {
        assert!(ReviewerAgent::parse_issues("Looks great, no issues found here.").is_empty());
    }

    #[test]
    fn parse_issues_extracts_bullets_and_numbers() {
        let text = "- missing null check\n* duplicate logic\n1. unhandled error path\n";
        let issues = ReviewerAgent::parse_issues(text);
        assert_eq!(issues.len(), 3);
        assert_eq!(issues[0], "missing null check");
        assert_eq!(issues[2], "unhandled error path");
    }

    #[test]
    fn parse_issues_falls_back_to_whole_response_when_long() {
        let text = "This implementation has a subtle race condition in the worker pool.";
        let issues = ReviewerAgent::parse_issues(text);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0], text);
    }

    #[test]
    fn parse_issues_short_unmatched_response_yields_nothing() {
        assert!(ReviewerAgent::parse_issues("ok").is_empty());
    }

    #[tokio::test]
    async fn review_returns_empty_when_degraded() {
        let mut agent = ReviewerAgent::new(AssistantConfig::new(".".into()));
        agent.stop();
        let mut files = HashMap::new();
        files.insert(PathBuf::from("a.rs"), "fn main() {}".to_string());
        let result = agent.review(ctx(files)).await;
        assert!(!result.has_issues());
    }

    #[tokio::test]
    async fn review_returns_empty_when_no_changed_files() {
        let mut agent = ReviewerAgent::new(AssistantConfig::new(".".into()));
        agent.start().unwrap();
        let result = agent.review(ctx(HashMap::new())).await;
        assert!(!result.has_issues());
    }

    #[test]
    fn repeat_issue_tracking_escalates_on_second_occurrence() {
        let mut counts: HashMap<String, u32> = HashMap::new();
        let issue = "missing null check".to_string();
        let digest = ReviewerAgent::digest(&issue);

        let mut result_one = ReviewResult::default();
        let count = counts.entry(digest.clone()).or_insert(0);
        *count += 1;
        result_one.cycle_count = *count;
        result_one.is_repeat_issue = *count > 1;
        assert!(!ReviewerAgent::should_escalate(&result_one));

        let mut result_two = ReviewResult::default();
        let count = counts.entry(digest).or_insert(0);
        *count += 1;
        result_two.cycle_count = *count;
        result_two.is_repeat_issue = *count > 1;
        assert!(ReviewerAgent::should_escalate(&result_two));
    }

    #[test]
    fn format_feedback_lists_files_and_issues() {
        let result = ReviewResult {
            issues: vec!["missing error handling".to_string()],
            is_repeat_issue: false,
            cycle_count: 1,
        };
        let feedback = ReviewerAgent::format_feedback(&result, &[PathBuf::from("a.rs")]);
        assert!(feedback.contains("a.rs"));
        assert!(feedback.contains("missing error handling"));
    }
}
