//! State Store — the workflow's persistent `state.json`, written atomically
//! (temp file + rename, never a partial write) plus the phase
//! document/context files that live alongside it.

use crate::errors::StateError;
use chrono::Local;
use std::path::{Path, PathBuf};
use waypoints_common::{CompletedPhases, Phase, PhaseUsage, WorkflowState};

const STATE_FILENAME: &str = "state.json";

fn phase_document_name(phase: Phase) -> Option<&'static str> {
    match phase {
        1 => Some("phase1-requirements.md"),
        2 => Some("phase2-interfaces.md"),
        3 => Some("phase3-tests.md"),
        // Phase 4 produces no summary document.
        _ => None,
    }
}

fn phase_context_name(phase: Phase) -> Option<&'static str> {
    match phase {
        1 => Some("phase1-input.md"),
        2 => Some("phase2-input.md"),
        3 => Some("phase3-input.md"),
        4 => Some("phase4-input.md"),
        _ => None,
    }
}

fn base_dir() -> PathBuf {
    if let Ok(config_dir) = std::env::var("CLAUDE_CONFIG_DIR") {
        return PathBuf::from(config_dir).join("tmp");
    }
    dirs::home_dir()
        .map(|home| home.join(".claude").join("tmp"))
        .unwrap_or_else(|| PathBuf::from(".claude/tmp"))
}

fn generate_workflow_id() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

pub struct StateStore {
    dir: PathBuf,
    workflow_id: String,
    state: WorkflowState,
}

impl StateStore {
    /// Resolve the state directory and load (or initialize) its state.json.
    ///
    /// If `WP_SUPERVISOR_MARKERS_DIR` is set, it is used directly and the
    /// workflow id is taken from `WP_SUPERVISOR_WORKFLOW_ID` or parsed from
    /// the directory's basename. Otherwise a fresh directory is created
    /// under the base tmp directory, named `wp-supervisor-<workflow_id>`.
    pub fn open(workflow_id: Option<String>) -> Result<Self, StateError> {
        let dir = if let Ok(dir) = std::env::var("WP_SUPERVISOR_MARKERS_DIR") {
            PathBuf::from(dir)
        } else {
            let id = workflow_id.clone().unwrap_or_else(generate_workflow_id);
            base_dir().join(format!("wp-supervisor-{id}"))
        };

        let workflow_id = workflow_id
            .or_else(|| std::env::var("WP_SUPERVISOR_WORKFLOW_ID").ok())
            .unwrap_or_else(|| {
                dir.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.strip_prefix("wp-supervisor-").unwrap_or(n).to_string())
                    .unwrap_or_else(generate_workflow_id)
            });

        std::fs::create_dir_all(&dir).map_err(|source| StateError::Write {
            path: dir.clone(),
            source,
        })?;
        std::fs::create_dir_all(dir.join("context")).map_err(|source| StateError::Write {
            path: dir.join("context"),
            source,
        })?;

        let state_path = dir.join(STATE_FILENAME);
        let state = match std::fs::read_to_string(&state_path) {
            Ok(content) => match serde_json::from_str::<WorkflowState>(&content) {
                Ok(state) => state,
                Err(_) => WorkflowState::new(workflow_id.clone()),
            },
            Err(_) => WorkflowState::new(workflow_id.clone()),
        };

        let store = Self {
            dir,
            workflow_id,
            state,
        };
        store.persist()?;
        Ok(store)
    }

    fn persist(&self) -> Result<(), StateError> {
        let path = self.dir.join(STATE_FILENAME);
        let tmp_path = self.dir.join(format!("{STATE_FILENAME}.tmp"));
        let content =
            serde_json::to_string_pretty(&self.state).expect("WorkflowState always serializes");
        std::fs::write(&tmp_path, content).map_err(|source| StateError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &path).map_err(|source| StateError::Write { path, source })?;
        Ok(())
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn markers_dir(&self) -> &Path {
        &self.dir
    }

    pub fn phase(&self) -> Phase {
        waypoints_common::clamp_phase(self.state.phase)
    }

    pub fn set_phase(&mut self, phase: Phase) -> Result<(), StateError> {
        self.state.phase = phase;
        self.persist()
    }

    pub fn completed_phases(&self) -> CompletedPhases {
        self.state.completed_phases
    }

    pub fn is_phase_complete(&self, phase: Phase) -> bool {
        self.state.completed_phases.get(phase)
    }

    pub fn mark_phase_complete(&mut self, phase: Phase) -> Result<(), StateError> {
        self.state.completed_phases.set(phase, true);
        self.persist()
    }

    pub fn mark_implementation_complete(&mut self) -> Result<(), StateError> {
        self.mark_phase_complete(4)
    }

    pub fn is_implementation_complete(&self) -> bool {
        self.state.completed_phases.implementation
    }

    pub fn document_path(&self, phase: Phase) -> Option<PathBuf> {
        phase_document_name(phase).map(|name| self.dir.join(name))
    }

    pub fn save_document(&self, phase: Phase, content: &str) -> Result<PathBuf, StateError> {
        let path = self
            .document_path(phase)
            .ok_or_else(|| StateError::Corrupt {
                path: self.dir.join(format!("phase{phase}")),
            })?;
        std::fs::write(&path, content).map_err(|source| StateError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    pub fn get_document(&self, phase: Phase) -> Option<String> {
        let path = self.document_path(phase)?;
        std::fs::read_to_string(path).ok()
    }

    pub fn list_documents(&self) -> Vec<(Phase, PathBuf)> {
        (1..=4)
            .filter_map(|phase| self.document_path(phase).map(|path| (phase, path)))
            .filter(|(_, path)| path.exists())
            .collect()
    }

    pub fn save_context(&self, phase: Phase, content: &str) -> Result<PathBuf, StateError> {
        let name = phase_context_name(phase).ok_or_else(|| StateError::Corrupt {
            path: self.dir.join(format!("phase{phase}-input")),
        })?;
        let path = self.dir.join("context").join(name);
        std::fs::write(&path, content).map_err(|source| StateError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    pub fn get_context(&self, phase: Phase) -> Option<String> {
        let name = phase_context_name(phase)?;
        std::fs::read_to_string(self.dir.join("context").join(name)).ok()
    }

    pub fn add_phase_usage(&mut self, phase: Phase, usage: PhaseUsage) -> Result<(), StateError> {
        self.state.usage.add(phase, usage);
        self.persist()
    }

    pub fn phase_usage(&self, phase: Phase) -> PhaseUsage {
        self.state.usage.get(phase)
    }

    pub fn total_usage(&self) -> PhaseUsage {
        self.state.usage.total()
    }

    pub fn total_usage_per_phase(&self) -> Vec<(Phase, PhaseUsage)> {
        self.state.usage.per_phase()
    }

    pub fn usage_summary_text(&self) -> String {
        let total = self.total_usage();
        format!(
            "Total: {} tokens | ${:.4} | {:.1}s",
            total.input_tokens + total.output_tokens,
            total.cost_usd,
            total.duration_ms as f64 / 1000.0
        )
    }

    pub fn env_vars(&self) -> Vec<(String, String)> {
        vec![
            (
                "WP_SUPERVISOR_WORKFLOW_ID".to_string(),
                self.workflow_id.clone(),
            ),
            (
                "WP_SUPERVISOR_MARKERS_DIR".to_string(),
                self.dir.display().to_string(),
            ),
            ("WP_SUPERVISOR_ACTIVE".to_string(), "1".to_string()),
        ]
    }

    /// `keep_documents = true` only unlinks `state.json`, leaving the phase
    /// documents and context files (and therefore `completed_phases` on
    /// disk as far as any out-of-band reader of the directory can tell) in
    /// place. `false` removes the whole state directory.
    pub fn cleanup(&self, keep_documents: bool) -> Result<(), StateError> {
        if keep_documents {
            let path = self.dir.join(STATE_FILENAME);
            if path.exists() {
                std::fs::remove_file(&path).map_err(|source| StateError::Write { path, source })?;
            }
        } else {
            std::fs::remove_dir_all(&self.dir).map_err(|source| StateError::Write {
                path: self.dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
