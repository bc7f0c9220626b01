//! Orchestrator: the top-level state machine. Drives each phase in order —
//! build context, run the phase session, save and confirm a summary
//! (phases 1-3), extract knowledge — and hands phase 4 to the review
//! coordinator before applying staged knowledge and cleaning up.

use crate::context;
use crate::display::SupervisorDisplay;
use crate::errors::OrchestratorError;
use crate::knowledge::{self, KnowledgeManager};
use crate::logger::SupervisorLogger;
use crate::profile;
use crate::review::{FeedbackQueue, ReviewCoordinator, ReviewCoordinatorConfig};
use crate::session::{self, Signal, StreamOutcome};
use crate::spawn::{self, AssistantConfig};
use crate::state::StateStore;
use std::io::{BufRead, Write as _};
use std::path::PathBuf;
use std::time::Duration;
use waypoints_common::Phase;

const REVIEW_FILE_THRESHOLD: u32 = 3;
const PENDING_REVIEW_TIMEOUT: Duration = Duration::from_secs(60);
const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(60);

pub struct OrchestratorConfig {
    pub working_dir: PathBuf,
    pub initial_task: Option<String>,
    pub model: Option<String>,
    pub reviewer_model: Option<String>,
    pub review_enabled: bool,
}

impl OrchestratorConfig {
    pub fn new(working_dir: PathBuf, initial_task: Option<String>) -> Self {
        Self {
            working_dir,
            initial_task,
            model: std::env::var("WP_MODEL").ok(),
            reviewer_model: std::env::var("WP_REVIEWER_MODEL").ok(),
            review_enabled: std::env::var("WP_DISABLE_REVIEW").as_deref() != Ok("1"),
        }
    }
}

/// Matches [`crate::logger::SupervisorLogger`]'s own resolution so the
/// knowledge tree and the log tree live under the same install root.
fn install_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("WP_INSTALL_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".claude").join("waypoints"))
        .unwrap_or_else(|| PathBuf::from(".claude/waypoints"))
}

/// Blocking line read from stdin; used only by the interactive phase loop
/// and the y/e/r confirmation prompt.
fn read_stdin_line() -> Option<String> {
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_string()),
        Err(_) => None,
    }
}

fn prompt_line(label: &str) -> String {
    print!("{label}");
    let _ = std::io::stdout().flush();
    read_stdin_line().unwrap_or_default()
}

/// Builds a `spawn_turn` closure that keeps continuity within a phase by
/// re-sending the growing transcript as the prompt on every turn, since the
/// assistant CLI itself is invoked fresh each time (see spawn.rs).
fn turn_spawner(
    assistant_config: AssistantConfig,
    initial_prompt: String,
) -> impl FnMut(Option<&str>) -> std::io::Result<tokio::process::Child> {
    let mut transcript = initial_prompt;
    move |next| {
        if let Some(text) = next {
            transcript.push_str("\n\n---\n\n");
            transcript.push_str(text);
        }
        spawn::spawn_turn(&assistant_config, &transcript)
    }
}

/// Runs the full four-phase workflow to completion (or to an operator
/// abort / fatal error). On any non-success path, staged knowledge is
/// discarded and the state directory is cleaned up before returning.
pub async fn run(config: OrchestratorConfig) -> Result<(), OrchestratorError> {
    let display = SupervisorDisplay::new();
    let mut store = StateStore::open(None)?;
    let logger = SupervisorLogger::new(store.markers_dir(), store.workflow_id());

    display.workflow_header(&config.working_dir, store.workflow_id(), store.markers_dir());
    logger.log_wp(&format!(
        "workflow started for {}",
        config.working_dir.display()
    ));

    let project_id = knowledge::resolve_project_id(&config.working_dir);
    let install = install_dir();
    let mut knowledge_mgr = KnowledgeManager::new(&install, project_id, store.workflow_id().to_string());

    let profile_id = profile::detect_profile_id(&config.working_dir);
    let tech_profile = profile::load_profile(&config.working_dir, &profile_id);

    let settings_file = crate::hooks::settings::write(store.markers_dir()).ok();
    if settings_file.is_none() {
        logger.log_wp("failed to write hook settings file; phase guard and build verifier will not run");
    }

    let base_assistant_config = AssistantConfig::new(config.working_dir.clone())
        .with_model(config.model.clone())
        .with_settings_file(settings_file)
        .with_env(store.env_vars());

    let result = run_phases(
        &config,
        &display,
        &logger,
        &mut store,
        &mut knowledge_mgr,
        &tech_profile,
        &base_assistant_config,
    )
    .await;

    match &result {
        Ok(()) => {
            let written = apply_knowledge(&knowledge_mgr, &logger);
            display.knowledge_summary(&written);
            let _ = store.cleanup(true);
            display.workflow_complete();
            display.usage_summary(store.total_usage(), &store.total_usage_per_phase());
            logger.log_wp("workflow completed successfully");
        }
        Err(OrchestratorError::UserAbort) => {
            logger.log_wp("workflow aborted by operator");
            knowledge_mgr.clear_staged();
            let _ = store.cleanup(false);
            display.warning("Workflow aborted by operator.");
        }
        Err(err) => {
            logger.log_error("workflow failed", Some(err));
            knowledge_mgr.clear_staged();
            let _ = store.cleanup(false);
            display.error(&format!("Workflow failed: {err}"));
        }
    }

    result
}

async fn run_phases(
    config: &OrchestratorConfig,
    display: &SupervisorDisplay,
    logger: &SupervisorLogger,
    store: &mut StateStore,
    knowledge_mgr: &mut KnowledgeManager,
    tech_profile: &waypoints_common::TechnologyProfile,
    base_assistant_config: &AssistantConfig,
) -> Result<(), OrchestratorError> {
    let mut requirements_summary = String::new();
    let mut interfaces_list: Vec<String> = Vec::new();
    let mut tests_list: Vec<String> = Vec::new();

    for phase in 1..=3u8 {
        if store.is_phase_complete(phase) {
            if let Some(doc) = store.get_document(phase) {
                match phase {
                    1 => requirements_summary = doc,
                    2 => interfaces_list = split_into_list(&doc),
                    3 => tests_list = split_into_list(&doc),
                    _ => {}
                }
            }
            continue;
        }
        store.set_phase(phase)?;
        display.phase_header(phase);

        let (existing_arch, existing_dec, existing_lessons) = knowledge_mgr.load_existing();
        let staged_digest = knowledge_mgr.staged_digest();
        let knowledge_block = context::knowledge_context_block(
            existing_arch.as_deref(),
            existing_dec.as_deref(),
            existing_lessons.as_deref(),
        );

        let initial_context = match phase {
            1 => context::build_phase1_context(config.initial_task.as_deref(), &knowledge_block),
            2 => context::build_phase2_context(&requirements_summary, &knowledge_block),
            3 => context::build_phase3_context(&requirements_summary, &interfaces_list, &knowledge_block),
            _ => unreachable!(),
        };
        store.save_context(phase, &initial_context)?;

        let assistant_config = base_assistant_config.clone();
        let outcome = run_documented_phase(
            display,
            logger,
            phase,
            initial_context,
            assistant_config,
        )
        .await?;

        store.add_phase_usage(phase, outcome.usage)?;

        let document = confirm_document_loop(display, logger, store, phase, &outcome.summary, base_assistant_config).await?;

        match phase {
            1 => requirements_summary = document.clone(),
            2 => interfaces_list = split_into_list(&document),
            3 => tests_list = split_into_list(&document),
            _ => {}
        }

        store.save_document(phase, &document)?;
        store.mark_phase_complete(phase)?;
        display.phase_complete_banner(phase);

        extract_and_stage_knowledge(
            logger,
            knowledge_mgr,
            &staged_digest,
            base_assistant_config,
            &outcome.raw_text,
        )
        .await;
    }

    if !store.is_implementation_complete() {
        run_phase4(
            config,
            display,
            logger,
            store,
            knowledge_mgr,
            base_assistant_config,
            &requirements_summary,
            &interfaces_list,
            &tests_list,
        )
        .await?;
    }

    Ok(())
}

/// Like [`session::run_phase_session_with_hook`], but before each blocking
/// read from the operator it drains the review coordinator's feedback
/// queue. Any feedback that has accumulated since the previous turn is
/// injected as the next turn's text instead of waiting on stdin — this is
/// the implementer's only connection back to the review coordinator.
async fn run_phase4_session(
    mut spawn_turn: impl FnMut(Option<&str>) -> std::io::Result<tokio::process::Child>,
    mut read_line: impl FnMut() -> Option<String>,
    coordinator: &ReviewCoordinator,
    display: &SupervisorDisplay,
    logger: &SupervisorLogger,
    mut on_tool_use: impl FnMut(&str, &serde_json::Value),
) -> Result<StreamOutcome, OrchestratorError> {
    let child = spawn_turn(None).map_err(crate::errors::SessionError::Spawn)?;
    let mut outcome = session::process_stream_with_hook(
        child,
        session::phase_complete_checker,
        false,
        &mut on_tool_use,
    )
    .await?;

    while outcome.signal.is_none() {
        let feedback = coordinator.get_pending_feedback().await;
        let next_text = if !feedback.is_empty() {
            let message = FeedbackQueue::format_for_injection(&feedback);
            display.feedback_injection(&message);
            logger.log_wp("injecting pending review feedback into the implementer's next turn");
            message
        } else {
            let Some(line) = read_line() else { break };
            match session::read_user_input(&line) {
                session::UserInput::ForceComplete => {
                    outcome.signal = Some(Signal::PhaseComplete);
                    break;
                }
                session::UserInput::Abort => return Err(OrchestratorError::UserAbort),
                session::UserInput::Text(text) => text,
            }
        };

        let child = spawn_turn(Some(&next_text)).map_err(crate::errors::SessionError::Spawn)?;
        let next = session::process_stream_with_hook(
            child,
            session::phase_complete_checker,
            false,
            &mut on_tool_use,
        )
        .await?;
        outcome.text.push_str(&next.text);
        outcome.usage.input_tokens += next.usage.input_tokens;
        outcome.usage.output_tokens += next.usage.output_tokens;
        outcome.usage.cost_usd += next.usage.cost_usd;
        outcome.usage.duration_ms += next.usage.duration_ms;
        outcome.usage.turns += next.usage.turns;
        outcome.session_id = outcome.session_id.or(next.session_id);
        outcome.signal = next.signal;
    }

    Ok(outcome)
}

struct DocumentedPhaseOutcome {
    summary: String,
    raw_text: String,
    usage: waypoints_common::PhaseUsage,
}

/// Runs one of phases 1-3: the interactive session, then a silent summary
/// query, then a silent self-verification query over that summary.
async fn run_documented_phase(
    display: &SupervisorDisplay,
    logger: &SupervisorLogger,
    phase: Phase,
    initial_context: String,
    assistant_config: AssistantConfig,
) -> Result<DocumentedPhaseOutcome, OrchestratorError> {
    display.stream_text_start();
    let mut spawn_turn = turn_spawner(assistant_config.clone(), initial_context.clone());
    let outcome: StreamOutcome =
        session::run_phase_session(&mut spawn_turn, read_stdin_line).await?;
    display.stream_text_end();

    let transcript_with_work = format!(
        "{initial_context}\n\n[Assistant's work this phase]\n{}",
        outcome.text
    );

    let summary_prompt = format!("{transcript_with_work}\n\n{}", context::summary_prompt(phase));
    let summary_config = assistant_config.clone();
    let raw_summary = session::extract_text(
        move || spawn::spawn_turn(&summary_config, &summary_prompt),
        Duration::from_secs(90),
    )
    .await;

    let review_prompt_text = format!(
        "{transcript_with_work}\n\n## Draft Summary\n\n{raw_summary}\n\n{}",
        context::review_prompt(phase)
    );
    let review_config = assistant_config.clone();
    let review_response = session::extract_text(
        move || spawn::spawn_turn(&review_config, &review_prompt_text),
        Duration::from_secs(90),
    )
    .await;

    let (_, summary) = if review_response.trim().is_empty() {
        (None, raw_summary.clone())
    } else {
        session::strip_verification_marker(&review_response)
    };

    logger.log_wp(&format!("phase {phase} summary generated and self-verified"));

    Ok(DocumentedPhaseOutcome {
        summary,
        raw_text: outcome.text,
        usage: outcome.usage,
    })
}

/// The y/e/r confirmation loop: accept, edit on disk, or regenerate with
/// operator feedback via a fresh (non-resumed) conversation.
async fn confirm_document_loop(
    display: &SupervisorDisplay,
    logger: &SupervisorLogger,
    store: &StateStore,
    phase: Phase,
    summary: &str,
    base_assistant_config: &AssistantConfig,
) -> Result<String, OrchestratorError> {
    let mut current = summary.to_string();
    loop {
        let path = store.save_document(phase, &current)?;
        display.document_preview(phase, &current);
        display.confirm_prompt(phase);
        let answer = prompt_line("> ").to_lowercase();

        match answer.trim() {
            "" | "y" | "yes" => return Ok(current),
            "e" | "edit" => {
                display.tip(&format!(
                    "Edit {} directly, then press Enter to continue.",
                    path.display()
                ));
                let _ = prompt_line("");
                current = std::fs::read_to_string(&path).unwrap_or(current);
            }
            "r" | "regenerate" => {
                let feedback = prompt_line("Feedback for regeneration: ");
                if feedback.trim().is_empty() {
                    continue;
                }
                current = regenerate_document(display, logger, base_assistant_config, &current, &feedback).await?;
            }
            "q" | "quit" | "abort" => return Err(OrchestratorError::UserAbort),
            _ => {
                display.warning("Please answer y, e, r, or q.");
            }
        }
    }
}

async fn regenerate_document(
    display: &SupervisorDisplay,
    logger: &SupervisorLogger,
    assistant_config: &AssistantConfig,
    current_summary: &str,
    feedback: &str,
) -> Result<String, OrchestratorError> {
    let seed = context::regeneration_context(current_summary, feedback);
    display.stream_text_start();
    let mut spawn_turn = turn_spawner(assistant_config.clone(), seed);
    let outcome = session::run_regeneration_session(&mut spawn_turn, read_stdin_line).await?;

    if outcome.signal == Some(Signal::RegenerationCanceled) {
        display.stream_text_end();
        logger.log_wp("regeneration canceled by operator feedback, keeping prior document");
        return Ok(current_summary.to_string());
    }

    let final_child = spawn_turn(Some(context::FINAL_REGENERATION_PROMPT))
        .map_err(crate::errors::SessionError::Spawn)?;
    let final_outcome = session::process_stream(final_child, |_| None, false).await?;
    display.stream_text_end();

    logger.log_wp("document regenerated from operator feedback");
    Ok(final_outcome.text.trim().to_string())
}

async fn extract_and_stage_knowledge(
    logger: &SupervisorLogger,
    knowledge_mgr: &mut KnowledgeManager,
    staged_digest: &str,
    assistant_config: &AssistantConfig,
    phase_text: &str,
) {
    let (arch, dec, lessons) = knowledge_mgr.load_existing();
    let existing = context::knowledge_context_block(arch.as_deref(), dec.as_deref(), lessons.as_deref());
    let prompt = format!(
        "{phase_text}\n\n{}",
        context::knowledge_extraction_prompt(&existing, staged_digest)
    );
    let config = assistant_config.clone();
    let response = session::extract_text(
        move || spawn::spawn_turn(&config, &prompt),
        EXTRACTION_TIMEOUT,
    )
    .await;

    let extracted = knowledge::extract_from_text(&response);
    if extracted.had_content {
        logger.log_wp("knowledge extracted and staged for this run");
        knowledge_mgr.stage(extracted);
    }
}

fn apply_knowledge(knowledge_mgr: &KnowledgeManager, logger: &SupervisorLogger) -> Vec<(String, PathBuf)> {
    if !knowledge_mgr.has_staged() {
        return Vec::new();
    }
    let mut written = Vec::new();
    for (category, result) in knowledge_mgr.apply_staged() {
        match result {
            Ok(path) => written.push((category_label(category), path)),
            Err(err) => logger.log_error("failed to apply staged knowledge", Some(&err)),
        }
    }
    written
}

fn category_label(category: waypoints_common::KnowledgeCategory) -> String {
    match category {
        waypoints_common::KnowledgeCategory::Architecture => "architecture".to_string(),
        waypoints_common::KnowledgeCategory::Decisions => "decisions".to_string(),
        waypoints_common::KnowledgeCategory::LessonsLearned => "lessons learned".to_string(),
    }
}

/// Phase 2/3 documents are rendered as markdown bullet lists; later phases
/// only need the bullet text itself, one entry per top-level `- ` line.
fn split_into_list(document: &str) -> Vec<String> {
    document
        .lines()
        .filter_map(|line| line.trim().strip_prefix("- ").map(str::trim).map(str::to_string))
        .filter(|line| !line.is_empty())
        .collect()
}

#[allow(clippy::too_many_arguments)]
async fn run_phase4(
    config: &OrchestratorConfig,
    display: &SupervisorDisplay,
    logger: &SupervisorLogger,
    store: &mut StateStore,
    knowledge_mgr: &mut KnowledgeManager,
    base_assistant_config: &AssistantConfig,
    requirements_summary: &str,
    interfaces_list: &[String],
    tests_list: &[String],
) -> Result<(), OrchestratorError> {
    store.set_phase(4)?;
    display.phase_header(4);

    let (arch, dec, lessons) = knowledge_mgr.load_existing();
    let knowledge_block = context::knowledge_context_block(arch.as_deref(), dec.as_deref(), lessons.as_deref());
    let phase4_context = context::build_phase4_context(
        requirements_summary,
        interfaces_list,
        tests_list,
        &knowledge_block,
    );
    store.save_context(4, &phase4_context)?;

    let mut coordinator = ReviewCoordinator::new();
    if config.review_enabled {
        let reviewer_config = AssistantConfig::new(config.working_dir.clone())
            .with_model(config.reviewer_model.clone())
            .with_env(store.env_vars());
        coordinator
            .start(
                ReviewCoordinatorConfig {
                    file_threshold: REVIEW_FILE_THRESHOLD,
                    enabled: true,
                },
                config.working_dir.clone(),
                reviewer_config,
                requirements_summary.to_string(),
                interfaces_list.join("\n"),
            )
            .await;
    }

    display.stream_text_start();
    let mut spawn_turn = turn_spawner(base_assistant_config.clone(), phase4_context);
    let on_tool_use = |name: &str, input: &serde_json::Value| {
        if !matches!(name, "Write" | "Edit") {
            return;
        }
        let Some(path) = input.get("file_path").and_then(serde_json::Value::as_str) else {
            return;
        };
        let path = std::path::PathBuf::from(path);
        let tool_name = name.to_string();
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.on_file_changed(&path, &tool_name).await });
    };
    let outcome = run_phase4_session(
        &mut spawn_turn,
        read_stdin_line,
        &coordinator,
        display,
        logger,
        on_tool_use,
    )
    .await?;
    display.stream_text_end();

    store.add_phase_usage(4, outcome.usage)?;

    let spinner = display.spinner("waiting for any in-flight code review to finish");
    coordinator.wait_for_pending_reviews(PENDING_REVIEW_TIMEOUT).await;
    drop(spinner);

    // The implementer's last turn already ended (PHASE_COMPLETE), so any
    // feedback from a review that finished during that final wait has no
    // further turn to ride along on; log it rather than silently drop it.
    for feedback in coordinator.get_pending_feedback().await {
        logger.log_wp(&format!(
            "review feedback arrived after the implementer's last turn, left unaddressed: {}",
            feedback.message
        ));
    }

    let staged_digest = knowledge_mgr.staged_digest();
    extract_and_stage_knowledge(logger, knowledge_mgr, &staged_digest, base_assistant_config, &outcome.text).await;

    store.mark_implementation_complete()?;
    display.phase_complete_banner(4);
    Ok(())
}
