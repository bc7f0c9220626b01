//! Ephemeral hook registration. Out of scope per SPEC_FULL.md §1 is the
//! *permanent* settings-file installer that edits a user's global
//! `~/.claude/settings.json`; this instead renders a throwaway settings file,
//! scoped to one workflow's state directory, that points every hook event
//! back at this same binary's hidden dispatch mode (`--wp-hook <event>`) and
//! passes it to the assistant CLI via `--settings` (see `spawn.rs`).
//!
//! The shape mirrors the one the original installer wrote, minus the
//! `PostToolUse` auto-compile/auto-test scripts — the Rust port folds both
//! into a single `Stop`-hook build verification pass (see
//! `hooks::build_verifier`).

use serde_json::json;
use std::io;
use std::path::{Path, PathBuf};

const PHASE_GUARD_TIMEOUT_MS: u64 = 5_000;
const BUILD_VERIFIER_TIMEOUT_MS: u64 = 420_000;

/// Writes `settings.json` under `markers_dir` and returns its path.
pub fn write(markers_dir: &Path) -> io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let exe = exe.display();

    let settings = json!({
        "hooks": {
            "PreToolUse": [
                {
                    "hooks": [{
                        "type": "command",
                        "command": format!("{exe} --wp-hook log-tool-use"),
                        "timeout": PHASE_GUARD_TIMEOUT_MS,
                    }]
                },
                {
                    "matcher": "Write|Edit",
                    "hooks": [{
                        "type": "command",
                        "command": format!("{exe} --wp-hook phase-guard"),
                        "timeout": PHASE_GUARD_TIMEOUT_MS,
                    }]
                }
            ],
            "Stop": [
                {
                    "hooks": [{
                        "type": "command",
                        "command": format!("{exe} --wp-hook build-verifier"),
                        "timeout": BUILD_VERIFIER_TIMEOUT_MS,
                    }]
                }
            ]
        }
    });

    let path = markers_dir.join("settings.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&settings)?)?;
    Ok(path)
}
