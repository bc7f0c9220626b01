//! `PreToolUse`/`Stop` hook callbacks invoked by the assistant CLI during a
//! phase session: the Phase Guard (file-class denial by phase) and the
//! Build Verifier (compile/test gate before a turn can end).

pub mod build_verifier;
pub mod phase_guard;
pub mod protocol;
pub mod settings;

use crate::logger::SupervisorLogger;
use crate::state::StateStore;
use protocol::{HookOutput, PreToolUseInput, StopInput};

/// Entry point for the hidden `--wp-hook <event>` invocation: reads one JSON
/// request from stdin, resolves the workflow's current phase and technology
/// profile off the environment this process inherited from the spawning
/// supervisor (see `state::StateStore::open` and `spawn::AssistantConfig`),
/// and prints the hook's JSON decision to stdout. Never panics and never
/// denies on its own account — a malformed request or unresolvable state
/// degrades to an allow, since a broken hook must not wedge the assistant.
pub async fn dispatch(event: &str) {
    let output = match event {
        "log-tool-use" => dispatch_log_tool_use(),
        "phase-guard" => dispatch_phase_guard().await,
        "build-verifier" => dispatch_build_verifier().await,
        _ => HookOutput::allow(),
    };
    output.print();
}

fn open_state_and_logger() -> Option<(StateStore, SupervisorLogger)> {
    let store = StateStore::open(None).ok()?;
    let logger = SupervisorLogger::new(store.markers_dir(), store.workflow_id());
    Some((store, logger))
}

fn dispatch_log_tool_use() -> HookOutput {
    let Ok(input) = protocol::read_stdin::<PreToolUseInput>() else {
        return HookOutput::allow();
    };
    let Some((_, logger)) = open_state_and_logger() else {
        return HookOutput::allow();
    };
    let file_path = input.tool_input.get("file_path").and_then(|v| v.as_str());
    let command = input.tool_input.get("command").and_then(|v| v.as_str());
    phase_guard::log_tool_use(&logger, &input.tool_name, file_path, command);
    HookOutput::allow()
}

async fn dispatch_phase_guard() -> HookOutput {
    let Ok(input) = protocol::read_stdin::<PreToolUseInput>() else {
        return HookOutput::allow();
    };
    let Some(path) = input
        .tool_input
        .get("file_path")
        .and_then(|v| v.as_str())
        .map(str::to_string)
    else {
        return HookOutput::allow();
    };
    let Some((store, logger)) = open_state_and_logger() else {
        return HookOutput::allow();
    };

    let profile_id = crate::profile::detect_profile_id(&input.cwd);
    let profile = crate::profile::load_profile(&input.cwd, &profile_id);
    phase_guard::check_write(profile, store.phase(), path, &logger).await
}

async fn dispatch_build_verifier() -> HookOutput {
    let Ok(input) = protocol::read_stdin::<StopInput>() else {
        return HookOutput::allow();
    };
    let Some((store, logger)) = open_state_and_logger() else {
        return HookOutput::allow();
    };

    let phase = store.phase();
    let profile_id = crate::profile::detect_profile_id(&input.cwd);
    let profile = crate::profile::load_profile(&input.cwd, &profile_id);
    let phase_text = format!(
        "{}\n{}",
        store.get_context(phase).unwrap_or_default(),
        store.get_document(phase).unwrap_or_default()
    );

    build_verifier::verify(&profile, phase, &phase_text, input.stop_hook_active, &logger).await
}
