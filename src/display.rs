//! Display: all of the supervisor's terminal output funnels through here.
//!
//! Rich mode (a color terminal, `NO_COLOR` unset) uses `console` styling and
//! emoji; plain mode prints the same information as unstyled, wrapped text
//! so it stays legible piped to a log file or a narrow terminal. Every
//! method degrades gracefully rather than erroring — display is never load
//! bearing for the workflow itself.

use console::{style, Emoji, Term};
use std::path::Path;
use waypoints_common::{phase_name, Phase, PhaseUsage};

static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR] ");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN] ");
static BULB: Emoji<'_, '_> = Emoji("💡 ", "[TIP] ");
static ARROW: Emoji<'_, '_> = Emoji("➡️  ", "-> ");
static BOOK: Emoji<'_, '_> = Emoji("📚 ", "[KNOWLEDGE] ");

fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(100)
        .clamp(40, 120)
}

fn wrapped(text: &str) -> String {
    textwrap::fill(text, terminal_width())
}

pub struct SupervisorDisplay {
    rich: bool,
}

impl SupervisorDisplay {
    pub fn new() -> Self {
        let rich = Term::stdout().is_term() && std::env::var("NO_COLOR").is_err();
        Self { rich }
    }

    pub fn workflow_header(&self, working_dir: &Path, workflow_id: &str, markers_dir: &Path) {
        if self.rich {
            println!("{}", style("Waypoints Supervisor").bold().cyan());
            println!("  {} {}", style("directory:").dim(), working_dir.display());
            println!("  {} {}", style("workflow:").dim(), workflow_id);
            println!("  {} {}", style("state dir:").dim(), markers_dir.display());
        } else {
            println!("Waypoints Supervisor");
            println!("  directory: {}", working_dir.display());
            println!("  workflow:  {workflow_id}");
            println!("  state dir: {}", markers_dir.display());
        }
        println!();
    }

    pub fn phase_header(&self, phase: Phase) {
        let name = phase_name(phase);
        if self.rich {
            println!();
            println!(
                "{} {}",
                style(format!("Phase {phase}/4:")).bold().yellow(),
                style(name).bold()
            );
        } else {
            println!();
            println!("Phase {phase}/4: {name}");
        }
    }

    pub fn phase_complete_banner(&self, phase: Phase) {
        let name = phase_name(phase);
        if self.rich {
            println!("{}{}", CHECK, style(format!("Phase {phase} ({name}) complete")).green());
        } else {
            println!("{CHECK}Phase {phase} ({name}) complete");
        }
    }

    pub fn workflow_complete(&self) {
        if self.rich {
            println!();
            println!("{}{}", CHECK, style("Workflow complete.").bold().green());
        } else {
            println!();
            println!("{CHECK}Workflow complete.");
        }
    }

    pub fn usage_summary(&self, total: PhaseUsage, per_phase: &[(Phase, PhaseUsage)]) {
        if self.rich {
            println!("{}", style("Usage summary").bold());
        } else {
            println!("Usage summary");
        }
        for (phase, usage) in per_phase {
            if usage.turns == 0 {
                continue;
            }
            println!(
                "  Phase {phase} ({}): {} tokens, ${:.4}, {:.1}s, {} turn(s)",
                phase_name(*phase),
                usage.input_tokens + usage.output_tokens,
                usage.cost_usd,
                usage.duration_ms as f64 / 1000.0,
                usage.turns
            );
        }
        println!(
            "  Total: {} tokens, ${:.4}, {:.1}s",
            total.input_tokens + total.output_tokens,
            total.cost_usd,
            total.duration_ms as f64 / 1000.0
        );
    }

    /// Prints a line introducing an operator confirmation prompt; the
    /// prompt itself is read separately by the orchestrator.
    pub fn confirm_prompt(&self, phase: Phase) {
        let label = if self.rich {
            style("[y]es / [e]dit / [r]egenerate").bold().to_string()
        } else {
            "[y]es / [e]dit / [r]egenerate".to_string()
        };
        println!();
        println!("Review the Phase {phase} document above. {label}: ");
    }

    pub fn supervisor_message(&self, text: &str) {
        if self.rich {
            println!("{} {}", style("supervisor:").dim(), wrapped(text));
        } else {
            println!("supervisor: {}", wrapped(text));
        }
    }

    pub fn success(&self, text: &str) {
        if self.rich {
            println!("{}{}", CHECK, style(text).green());
        } else {
            println!("{CHECK}{text}");
        }
    }

    pub fn error(&self, text: &str) {
        if self.rich {
            eprintln!("{}{}", CROSS, style(wrapped(text)).red());
        } else {
            eprintln!("{CROSS}{}", wrapped(text));
        }
    }

    pub fn warning(&self, text: &str) {
        if self.rich {
            println!("{}{}", WARN, style(wrapped(text)).yellow());
        } else {
            println!("{WARN}{}", wrapped(text));
        }
    }

    pub fn tip(&self, text: &str) {
        if self.rich {
            println!("{}{}", BULB, style(wrapped(text)).dim());
        } else {
            println!("{BULB}{}", wrapped(text));
        }
    }

    /// Shown when the review coordinator injects feedback between turns.
    pub fn feedback_injection(&self, text: &str) {
        if self.rich {
            println!(
                "{}{}",
                ARROW,
                style(format!("code review feedback: {}", wrapped(text))).magenta()
            );
        } else {
            println!("{ARROW}code review feedback: {}", wrapped(text));
        }
    }

    pub fn document_preview(&self, phase: Phase, content: &str) {
        let name = phase_name(phase);
        if self.rich {
            println!("{}", style(format!("--- Phase {phase} ({name}) document ---")).dim());
        } else {
            println!("--- Phase {phase} ({name}) document ---");
        }
        println!("{content}");
        println!();
    }

    pub fn knowledge_summary(&self, files: &[(String, std::path::PathBuf)]) {
        if files.is_empty() {
            return;
        }
        if self.rich {
            println!("{}{}", BOOK, style("Knowledge captured:").bold());
        } else {
            println!("{BOOK}Knowledge captured:");
        }
        for (category, path) in files {
            println!("  - {category}: {}", path.display());
        }
    }

    /// Assistant text is printed as it streams by the session runner itself
    /// (see `session::process_stream`); this just marks the start/end of a
    /// turn's output so interleaved supervisor messages stay legible.
    pub fn stream_text_start(&self) {
        if self.rich {
            println!("{}", style("assistant:").dim());
        } else {
            println!("assistant:");
        }
    }

    pub fn stream_text_end(&self) {
        println!();
    }

    /// RAII spinner for a blocking step with no incremental progress to
    /// show (e.g. "waiting for pending reviews to finish"). Dropped at the
    /// end of the step; prints nothing in plain mode beyond the label.
    pub fn spinner(&self, message: &str) -> SpinnerGuard {
        if self.rich {
            print!("{} {}...", style("›").cyan(), message);
        } else {
            print!("{message}...");
        }
        let _ = std::io::Write::flush(&mut std::io::stdout());
        SpinnerGuard {
            rich: self.rich,
        }
    }
}

impl Default for SupervisorDisplay {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SpinnerGuard {
    rich: bool,
}

impl Drop for SpinnerGuard {
    fn drop(&mut self) {
        if self.rich {
            println!(" {}", style("done").green());
        } else {
            println!(" done");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_width_is_clamped() {
        assert!(terminal_width() >= 40);
        assert!(terminal_width() <= 120);
    }

    #[test]
    fn wrapped_does_not_panic_on_empty_text() {
        assert_eq!(wrapped(""), "");
    }

    #[test]
    fn display_construction_does_not_panic() {
        let _ = SupervisorDisplay::new();
    }
}
