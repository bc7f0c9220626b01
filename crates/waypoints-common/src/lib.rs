//! Shared domain types for the Waypoints supervisor.
//!
//! These types are serialized to disk (state, knowledge, review results) and
//! passed between the supervisor's subsystems. They carry no behavior beyond
//! small constructors and accessors; the subsystems that own a given file
//! format live in the main `waypoints` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// One of the four sequential workflow phases.
pub type Phase = u8;

pub const PHASE_REQUIREMENTS: Phase = 1;
pub const PHASE_INTERFACES: Phase = 2;
pub const PHASE_TESTS: Phase = 3;
pub const PHASE_IMPLEMENTATION: Phase = 4;

/// Clamp an out-of-range phase to the valid `1..=4` band. Used only when
/// *reading* a phase value back (e.g. from a hand-edited state.json); the
/// stored value itself is never silently rewritten.
pub fn clamp_phase(phase: Phase) -> Phase {
    phase.clamp(PHASE_REQUIREMENTS, PHASE_IMPLEMENTATION)
}

pub fn phase_name(phase: Phase) -> &'static str {
    match phase {
        1 => "Requirements",
        2 => "Interfaces",
        3 => "Tests",
        4 => "Implementation",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletedPhases {
    #[serde(default)]
    pub requirements: bool,
    #[serde(default)]
    pub interfaces: bool,
    #[serde(default)]
    pub tests: bool,
    #[serde(default)]
    pub implementation: bool,
}

impl CompletedPhases {
    pub fn get(&self, phase: Phase) -> bool {
        match phase {
            1 => self.requirements,
            2 => self.interfaces,
            3 => self.tests,
            4 => self.implementation,
            _ => false,
        }
    }

    pub fn set(&mut self, phase: Phase, value: bool) {
        match phase {
            1 => self.requirements = value,
            2 => self.interfaces = value,
            3 => self.tests = value,
            4 => self.implementation = value,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub started_at: DateTime<Utc>,
    pub workflow_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PhaseUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub turns: u32,
}

impl PhaseUsage {
    pub fn add(&mut self, other: &PhaseUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cost_usd += other.cost_usd;
        self.duration_ms += other.duration_ms;
        self.turns += other.turns;
    }
}

/// Per-phase usage, keyed by phase number but serialized with string keys
/// (`"1"`..`"4"`) to match the on-disk JSON object shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage(pub HashMap<String, PhaseUsage>);

impl Usage {
    pub fn get(&self, phase: Phase) -> PhaseUsage {
        self.0.get(&phase.to_string()).copied().unwrap_or_default()
    }

    pub fn add(&mut self, phase: Phase, usage: PhaseUsage) {
        let entry = self.0.entry(phase.to_string()).or_default();
        entry.add(&usage);
    }

    pub fn total(&self) -> PhaseUsage {
        let mut total = PhaseUsage::default();
        for usage in self.0.values() {
            total.add(usage);
        }
        total
    }

    pub fn per_phase(&self) -> Vec<(Phase, PhaseUsage)> {
        let mut out: Vec<(Phase, PhaseUsage)> = (1..=4)
            .map(|phase| (phase, self.get(phase)))
            .collect();
        out.sort_by_key(|(phase, _)| *phase);
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub supervisor_active: bool,
    #[serde(default = "default_phase")]
    pub phase: Phase,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub completed_phases: CompletedPhases,
    #[serde(default)]
    pub usage: Usage,
    pub metadata: Metadata,
}

fn default_version() -> u32 {
    1
}

fn default_phase() -> Phase {
    1
}

fn default_mode() -> String {
    "supervisor".to_string()
}

impl WorkflowState {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            version: 1,
            active: true,
            supervisor_active: true,
            phase: 1,
            mode: "supervisor".to_string(),
            completed_phases: CompletedPhases::default(),
            usage: Usage::default(),
            metadata: Metadata {
                started_at: Utc::now(),
                workflow_id: workflow_id.into(),
                session_id: None,
            },
        }
    }
}

/// A single extracted knowledge entry (architecture note, decision, or
/// tagged lesson learned).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedKnowledgeEntry {
    pub title: String,
    pub content: String,
    /// Only meaningful for `LessonsLearned` entries. Absent at parse time
    /// means untagged; rendering defaults an absent tag to "General".
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagedKnowledge {
    pub architecture: Vec<StagedKnowledgeEntry>,
    pub decisions: Vec<StagedKnowledgeEntry>,
    pub lessons_learned: Vec<StagedKnowledgeEntry>,
}

impl StagedKnowledge {
    pub fn is_empty(&self) -> bool {
        self.architecture.is_empty() && self.decisions.is_empty() && self.lessons_learned.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnowledgeCategory {
    Architecture,
    Decisions,
    LessonsLearned,
}

impl KnowledgeCategory {
    pub fn filename(&self) -> &'static str {
        match self {
            KnowledgeCategory::Architecture => "architecture.md",
            KnowledgeCategory::Decisions => "decisions.md",
            KnowledgeCategory::LessonsLearned => "lessons-learned.md",
        }
    }

    pub fn header(&self) -> &'static str {
        match self {
            KnowledgeCategory::Architecture => "# Architecture\n\n",
            KnowledgeCategory::Decisions => "# Decisions\n\n",
            KnowledgeCategory::LessonsLearned => "# Lessons Learned\n\n",
        }
    }

    /// Whether this category's file lives at the knowledge root, shared
    /// across every project, rather than under a per-project directory.
    pub fn is_global(&self) -> bool {
        matches!(self, KnowledgeCategory::LessonsLearned)
    }
}

#[derive(Debug, Clone)]
pub struct FileChange {
    pub file_path: PathBuf,
    pub tool_name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewResult {
    pub issues: Vec<String>,
    pub is_repeat_issue: bool,
    pub cycle_count: u32,
}

impl ReviewResult {
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackItem {
    pub message: String,
    pub review_result: ReviewResult,
    pub timestamp: DateTime<Utc>,
}

/// A resolved technology profile: the command/pattern set the Phase Guard
/// and Build Verifier use for one project. Auto-detection of *which*
/// profile applies is out of scope; this struct is the consumed result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnologyProfile {
    pub id: String,
    #[serde(default)]
    pub main_source_patterns: Vec<String>,
    #[serde(default)]
    pub test_source_patterns: Vec<String>,
    #[serde(default)]
    pub config_file_patterns: Vec<String>,
    #[serde(default)]
    pub compile: Option<String>,
    #[serde(default)]
    pub test_compile: Option<String>,
    #[serde(default)]
    pub test: Option<String>,
    #[serde(default)]
    pub todo_placeholder: Option<String>,
}

impl Default for TechnologyProfile {
    fn default() -> Self {
        Self {
            id: "generic".to_string(),
            main_source_patterns: vec!["src/**/*".to_string()],
            test_source_patterns: vec!["tests/**/*".to_string(), "test/**/*".to_string()],
            config_file_patterns: vec![],
            compile: None,
            test_compile: None,
            test: None,
            todo_placeholder: Some("{file}".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_phases_roundtrip() {
        let mut completed = CompletedPhases::default();
        assert!(!completed.get(1));
        completed.set(1, true);
        assert!(completed.get(1));
        assert!(!completed.get(2));
    }

    #[test]
    fn usage_accumulates_per_phase_and_total() {
        let mut usage = Usage::default();
        usage.add(
            1,
            PhaseUsage {
                input_tokens: 10,
                output_tokens: 20,
                cost_usd: 0.1,
                duration_ms: 100,
                turns: 1,
            },
        );
        usage.add(
            1,
            PhaseUsage {
                input_tokens: 5,
                output_tokens: 5,
                cost_usd: 0.05,
                duration_ms: 50,
                turns: 1,
            },
        );
        let phase1 = usage.get(1);
        assert_eq!(phase1.input_tokens, 15);
        assert_eq!(phase1.turns, 2);

        usage.add(
            2,
            PhaseUsage {
                input_tokens: 1,
                output_tokens: 1,
                cost_usd: 0.0,
                duration_ms: 1,
                turns: 1,
            },
        );
        let total = usage.total();
        assert_eq!(total.input_tokens, 16);
    }

    #[test]
    fn lessons_learned_is_global_others_are_not() {
        assert!(KnowledgeCategory::LessonsLearned.is_global());
        assert!(!KnowledgeCategory::Architecture.is_global());
        assert!(!KnowledgeCategory::Decisions.is_global());
    }
}
