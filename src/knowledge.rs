//! Knowledge Pipeline: extracting architecture/decision/lesson notes from a
//! phase's conversation, staging them in memory for the run, and applying
//! them to the per-project (or, for lessons learned, global) knowledge base
//! at workflow end.

use crate::errors::KnowledgeError;
use chrono::Local;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use waypoints_common::{KnowledgeCategory, StagedKnowledge, StagedKnowledgeEntry};

pub const NO_KNOWLEDGE_EXTRACTED: &str = "NO_KNOWLEDGE_EXTRACTED";

/// Result of parsing one extraction response.
#[derive(Debug, Default)]
pub struct ExtractionResult {
    pub architecture: Vec<StagedKnowledgeEntry>,
    pub decisions: Vec<StagedKnowledgeEntry>,
    pub lessons_learned: Vec<StagedKnowledgeEntry>,
    pub had_content: bool,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.architecture.is_empty() && self.decisions.is_empty() && self.lessons_learned.is_empty()
    }
}

fn section_regex(section: &str) -> Regex {
    Regex::new(&format!(r"(?m)^{section}:\s*\n((?:.|\n)*?)(?=\n[A-Z_]+:|\z)")).unwrap()
}

fn parse_entries(block: &str) -> Vec<(String, String)> {
    block
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let rest = line.strip_prefix("- ")?;
            let (title, content) = rest.split_once(": ")?;
            Some((title.trim().to_string(), content.trim().to_string()))
        })
        .collect()
}

fn parse_lesson_entries(block: &str) -> Vec<StagedKnowledgeEntry> {
    let tag_re = Regex::new(r"^\[([^\]]+)\]\s*(.*)$").unwrap();
    parse_entries(block)
        .into_iter()
        .map(|(title, content)| {
            if let Some(caps) = tag_re.captures(&title) {
                StagedKnowledgeEntry {
                    title: caps[2].to_string(),
                    content,
                    tag: Some(caps[1].to_string()),
                }
            } else {
                StagedKnowledgeEntry {
                    title,
                    content,
                    tag: None,
                }
            }
        })
        .collect()
}

/// Parse an extraction-session response into staged entries. An exact
/// (trimmed) match of `NO_KNOWLEDGE_EXTRACTED` yields an empty result with
/// `had_content = false`.
pub fn extract_from_text(text: &str) -> ExtractionResult {
    if text.trim() == NO_KNOWLEDGE_EXTRACTED {
        return ExtractionResult::default();
    }

    let architecture = section_regex("ARCHITECTURE")
        .captures(text)
        .map(|c| {
            parse_entries(&c[1])
                .into_iter()
                .map(|(title, content)| StagedKnowledgeEntry {
                    title,
                    content,
                    tag: None,
                })
                .collect()
        })
        .unwrap_or_default();

    let decisions = section_regex("DECISIONS")
        .captures(text)
        .map(|c| {
            parse_entries(&c[1])
                .into_iter()
                .map(|(title, content)| StagedKnowledgeEntry {
                    title,
                    content,
                    tag: None,
                })
                .collect()
        })
        .unwrap_or_default();

    let lessons_learned = section_regex("LESSONS_LEARNED")
        .captures(text)
        .map(|c| parse_lesson_entries(&c[1]))
        .unwrap_or_default();

    let had_content = !architecture.is_empty() || !decisions.is_empty() || !lessons_learned.is_empty();

    ExtractionResult {
        architecture,
        decisions,
        lessons_learned,
        had_content,
    }
}

/// Resolve the project id used to namespace architecture/decisions notes:
/// `.waypoints-project` file, then the git `origin` remote, then the
/// directory's basename.
pub fn resolve_project_id(working_dir: &Path) -> String {
    let marker = working_dir.join(".waypoints-project");
    if let Ok(content) = std::fs::read_to_string(&marker) {
        let trimmed = content.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    if let Some(id) = resolve_from_git_remote(working_dir) {
        return id;
    }

    working_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown-project")
        .to_string()
}

fn resolve_from_git_remote(working_dir: &Path) -> Option<String> {
    let repo = git2::Repository::discover(working_dir).ok()?;
    let remote = repo.find_remote("origin").ok()?;
    let url = remote.url()?;
    Some(strip_remote_url(url))
}

fn strip_remote_url(url: &str) -> String {
    let without_git = url.strip_suffix(".git").unwrap_or(url);
    // SSH form: git@host:owner/repo -> owner/repo
    if let Some(idx) = without_git.find(':') {
        if !without_git[..idx].contains('/') {
            return without_git[idx + 1..].to_string();
        }
    }
    // HTTPS form: https://host/owner/repo -> owner/repo
    let parts: Vec<&str> = without_git.split('/').collect();
    if parts.len() >= 2 {
        return parts[parts.len() - 2..].join("/");
    }
    without_git.to_string()
}

pub struct KnowledgeManager {
    install_dir: PathBuf,
    project_id: String,
    workflow_id: String,
    staged: StagedKnowledge,
}

impl KnowledgeManager {
    pub fn new(install_dir: impl Into<PathBuf>, project_id: impl Into<String>, workflow_id: impl Into<String>) -> Self {
        Self {
            install_dir: install_dir.into(),
            project_id: project_id.into(),
            workflow_id: workflow_id.into(),
            staged: StagedKnowledge::default(),
        }
    }

    fn knowledge_root(&self) -> PathBuf {
        self.install_dir.join("knowledge")
    }

    fn category_path(&self, category: KnowledgeCategory) -> PathBuf {
        if category.is_global() {
            self.knowledge_root().join(category.filename())
        } else {
            self.knowledge_root().join(&self.project_id).join(category.filename())
        }
    }

    /// Raw existing contents for (architecture, decisions, lessons_learned),
    /// used to build the "what's already known" digest for extraction
    /// prompts.
    pub fn load_existing(&self) -> (Option<String>, Option<String>, Option<String>) {
        let read = |category| std::fs::read_to_string(self.category_path(category)).ok();
        (
            read(KnowledgeCategory::Architecture),
            read(KnowledgeCategory::Decisions),
            read(KnowledgeCategory::LessonsLearned),
        )
    }

    pub fn stage(&mut self, result: ExtractionResult) {
        self.staged.architecture.extend(result.architecture);
        self.staged.decisions.extend(result.decisions);
        self.staged.lessons_learned.extend(result.lessons_learned);
    }

    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }

    pub fn staged_digest(&self) -> String {
        let mut out = String::new();
        for entry in self.staged.architecture.iter().chain(self.staged.decisions.iter()).chain(self.staged.lessons_learned.iter()) {
            out.push_str(&format!("- {}\n", entry.title));
        }
        out
    }

    /// Write every staged entry to disk, grouping lessons-learned by tag
    /// (defaulting absent tags to "General" only at this rendering step,
    /// never at parse time). Per-category write failures are logged by the
    /// caller and do not stop other categories; the staged buffer is always
    /// cleared by the caller afterward regardless of outcome.
    pub fn apply_staged(&self) -> Vec<(KnowledgeCategory, Result<PathBuf, KnowledgeError>)> {
        let mut results = Vec::new();

        if !self.staged.architecture.is_empty() {
            results.push((
                KnowledgeCategory::Architecture,
                self.apply_notes(KnowledgeCategory::Architecture, &self.staged.architecture),
            ));
        }
        if !self.staged.decisions.is_empty() {
            results.push((
                KnowledgeCategory::Decisions,
                self.apply_notes(KnowledgeCategory::Decisions, &self.staged.decisions),
            ));
        }
        if !self.staged.lessons_learned.is_empty() {
            results.push((
                KnowledgeCategory::LessonsLearned,
                self.apply_lessons(&self.staged.lessons_learned),
            ));
        }

        results
    }

    pub fn clear_staged(&mut self) {
        self.staged = StagedKnowledge::default();
    }

    fn apply_notes(
        &self,
        category: KnowledgeCategory,
        entries: &[StagedKnowledgeEntry],
    ) -> Result<PathBuf, KnowledgeError> {
        let path = self.category_path(category);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| KnowledgeError::Write {
                path: path.clone(),
                source,
            })?;
        }

        let today = Local::now().format("%Y-%m-%d");
        let mut body = String::new();
        body.push_str(&format!("## {today} (Session: {})\n\n", self.workflow_id));
        for entry in entries {
            body.push_str(&format!("### {}\n{}\n\n", entry.title, entry.content));
        }

        append_or_create(&path, category.header(), &body)
    }

    fn apply_lessons(&self, entries: &[StagedKnowledgeEntry]) -> Result<PathBuf, KnowledgeError> {
        let path = self.category_path(KnowledgeCategory::LessonsLearned);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| KnowledgeError::Write {
                path: path.clone(),
                source,
            })?;
        }

        let mut by_tag: HashMap<String, Vec<&StagedKnowledgeEntry>> = HashMap::new();
        for entry in entries {
            let tag = entry.tag.clone().unwrap_or_else(|| "General".to_string());
            by_tag.entry(tag).or_default().push(entry);
        }

        let today = Local::now().format("%Y-%m-%d");
        let mut tags: Vec<&String> = by_tag.keys().collect();
        tags.sort();

        let mut body = String::new();
        for tag in tags {
            body.push_str(&format!("## [{tag}]\n\n"));
            for entry in &by_tag[tag] {
                body.push_str(&format!("### {} ({today})\n{}\n\n", entry.title, entry.content));
            }
        }

        append_or_create(&path, KnowledgeCategory::LessonsLearned.header(), &body)
    }
}

fn append_or_create(path: &Path, header: &str, body: &str) -> Result<PathBuf, KnowledgeError> {
    use std::io::Write;

    let is_new = !path.exists();
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| KnowledgeError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    if is_new {
        file.write_all(header.as_bytes())
            .map_err(|source| KnowledgeError::Write {
                path: path.to_path_buf(),
                source,
            })?;
    }
    file.write_all(body.as_bytes())
        .map_err(|source| KnowledgeError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn extract_from_text_parses_all_three_sections() {
        let text = "ARCHITECTURE:\n- Module layout: split by phase\n\nDECISIONS:\n- Use JSON: simpler than YAML here\n\nLESSONS_LEARNED:\n- [Testing] Flaky timing: add explicit waits\n";
        let result = extract_from_text(text);
        assert!(result.had_content);
        assert_eq!(result.architecture[0].title, "Module layout");
        assert_eq!(result.decisions[0].content, "simpler than YAML here");
        assert_eq!(result.lessons_learned[0].tag.as_deref(), Some("Testing"));
    }

    #[test]
    fn no_knowledge_extracted_is_empty() {
        let result = extract_from_text("NO_KNOWLEDGE_EXTRACTED");
        assert!(!result.had_content);
        assert!(result.is_empty());
    }

    #[test]
    fn untagged_lesson_has_no_tag_until_rendered() {
        let text = "LESSONS_LEARNED:\n- Plain lesson: no tag here\n";
        let result = extract_from_text(text);
        assert_eq!(result.lessons_learned[0].tag, None);
    }

    #[test]
    fn strip_remote_url_handles_ssh_and_https() {
        assert_eq!(strip_remote_url("git@github.com:acme/widget.git"), "acme/widget");
        assert_eq!(strip_remote_url("https://github.com/acme/widget.git"), "acme/widget");
    }

    #[test]
    fn apply_staged_writes_lessons_to_global_root_not_project_dir() {
        let install = tempdir().unwrap();
        let mut manager = KnowledgeManager::new(install.path(), "acme-widget", "wf-1");
        manager.stage(ExtractionResult {
            lessons_learned: vec![StagedKnowledgeEntry {
                title: "Lesson".to_string(),
                content: "body".to_string(),
                tag: None,
            }],
            ..Default::default()
        });
        let results = manager.apply_staged();
        let (_, path_result) = &results[0];
        let path = path_result.as_ref().unwrap();
        assert_eq!(path, &install.path().join("knowledge/lessons-learned.md"));
        assert!(!path.starts_with(install.path().join("knowledge/acme-widget")));
    }
}
