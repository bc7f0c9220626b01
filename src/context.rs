//! Context Builder: pure string composition of the prompts sent to the
//! assistant for each phase, plus the summary/self-review/extraction
//! prompts shared across phases. No network or filesystem access — every
//! function here is a deterministic function of its arguments.

/// Rendered list of interface/test names, or a placeholder when empty —
/// phases 3 and 4 reference the prior phases' deliverables by name.
fn render_list(items: &[String], empty_note: &str) -> String {
    if items.is_empty() {
        empty_note.to_string()
    } else {
        items.iter().map(|item| format!("- {item}")).collect::<Vec<_>>().join("\n")
    }
}

pub fn build_phase1_context(user_task: Option<&str>, knowledge_context: &str) -> String {
    let task_section = match user_task {
        Some(task) if !task.trim().is_empty() => format!(
            "The operator has described the initial task as follows:\n\n> {}\n",
            task.trim()
        ),
        _ => "No initial task was provided — ask the operator directly what they want built \
before writing anything down."
            .to_string(),
    };

    format!(
        "# Phase 1: Requirements\n\n\
{knowledge_context}\n\n\
## Your Task\n\n\
Gather and clarify the requirements for this project. Ask clarifying questions \
until the scope, constraints, and success criteria are unambiguous. Do not write \
or edit any source or test files during this phase — this phase produces \
understanding, not code.\n\n\
{task_section}\n\n\
When you are confident the requirements are complete, emit the following line \
by itself:\n\n\
---PHASE_COMPLETE---\n"
    )
}

pub fn build_phase2_context(requirements_summary: &str, knowledge_context: &str) -> String {
    format!(
        "# Phase 2: Interfaces\n\n\
{knowledge_context}\n\n\
## Requirements (from Phase 1)\n\n\
{requirements_summary}\n\n\
## Your Task\n\n\
Design the public interfaces — types, function signatures, module boundaries — \
that satisfy the requirements above. You may create or edit main source files \
to lay down these interfaces (stubs, signatures, type definitions), but do not \
write any tests yet — that happens in Phase 3.\n\n\
When the interface design is complete, emit the following line by itself:\n\n\
---PHASE_COMPLETE---\n"
    )
}

pub fn build_phase3_context(
    requirements_summary: &str,
    interfaces: &[String],
    knowledge_context: &str,
) -> String {
    format!(
        "# Phase 3: Tests\n\n\
{knowledge_context}\n\n\
## Requirements (from Phase 1)\n\n\
{requirements_summary}\n\n\
## Interfaces (from Phase 2)\n\n\
{}\n\n\
## Your Task\n\n\
Write tests against the interfaces above that encode the requirements as \
executable checks. Do not implement the interfaces yet — they should still \
fail or be stubbed; implementation happens in Phase 4. You may edit test files \
and configuration freely.\n\n\
When the test suite is complete, emit the following line by itself:\n\n\
---PHASE_COMPLETE---\n",
        render_list(interfaces, "(no interfaces were recorded from Phase 2)")
    )
}

pub fn build_phase4_context(
    requirements_summary: &str,
    interfaces: &[String],
    tests: &[String],
    knowledge_context: &str,
) -> String {
    format!(
        "# Phase 4: Implementation\n\n\
{knowledge_context}\n\n\
## Requirements (from Phase 1)\n\n\
{requirements_summary}\n\n\
## Interfaces (from Phase 2)\n\n\
{}\n\n\
## Tests (from Phase 3)\n\n\
{}\n\n\
## Your Task\n\n\
Implement the interfaces so that the test suite passes. You may edit any file. \
A second session is reviewing your changes as you make them and may inject \
feedback between turns — treat it as you would a colleague's code review \
comment. Work until the implementation is complete and the tests pass; there \
is no completion marker for this phase, the workflow ends when you stop \
making changes and the build verifier confirms a clean compile and test run.\n",
        render_list(interfaces, "(no interfaces were recorded from Phase 2)"),
        render_list(tests, "(no tests were recorded from Phase 3)")
    )
}

pub fn summary_prompt(phase: u8) -> &'static str {
    match phase {
        1 => "Produce a structured markdown summary of the requirements you gathered this \
phase. Use headings and bullet points; this document will be saved as the phase's \
permanent record and shown to later phases.",
        2 => "Produce a structured markdown summary of the interfaces you designed this \
phase (types, signatures, module boundaries). Use headings and bullet points; this \
document will be saved as the phase's permanent record and shown to later phases.",
        3 => "Produce a structured markdown summary of the tests you wrote this phase \
(what each test covers). Use headings and bullet points; this document will be saved \
as the phase's permanent record and shown to later phases.",
        _ => "",
    }
}

pub fn review_prompt(phase: u8) -> &'static str {
    match phase {
        1 | 2 | 3 => "Self-check the summary you just produced against everything that \
happened this phase. If it fully and accurately reflects the phase's output, respond \
with a line starting with SUMMARY_VERIFIED followed by the summary unchanged. If you \
find gaps, respond with a line starting with GAPS_FOUND followed by the corrected, \
complete summary.",
        _ => "",
    }
}

/// The knowledge-extraction prompt issued silently after every phase.
/// `existing` is the raw architecture/decisions/lessons-learned file
/// contents (or placeholders); `staged_digest` is a one-line-per-entry list
/// of what has already been staged this run, so the assistant can avoid
/// repeating itself.
pub fn knowledge_extraction_prompt(existing: &str, staged_digest: &str) -> String {
    let staged_section = if staged_digest.trim().is_empty() {
        "(nothing staged yet this run)".to_string()
    } else {
        staged_digest.to_string()
    };

    format!(
        "Review this phase's conversation for anything worth remembering beyond this \
workflow: architectural decisions, notable tradeoffs, or lessons learned that would \
help a future session working on this project.\n\n\
## Existing Project Knowledge\n\n{existing}\n\n\
## Already Staged This Run\n\n{staged_section}\n\n\
Do not repeat anything already captured above. Respond using exactly this grammar, \
omitting any section that has nothing to add:\n\n\
ARCHITECTURE:\n- Title: content\nDECISIONS:\n- Title: content\nLESSONS_LEARNED:\n- [Tag] Title: content\n\n\
If there is nothing worth recording, respond with exactly: NO_KNOWLEDGE_EXTRACTED"
    )
}

/// Composes the `# Project Knowledge` block injected into every phase
/// prompt, from the three raw existing-knowledge strings (each `None` when
/// the corresponding file doesn't exist yet).
pub fn knowledge_context_block(
    architecture: Option<&str>,
    decisions: Option<&str>,
    lessons_learned: Option<&str>,
) -> String {
    let section = |name: &str, content: Option<&str>| {
        format!(
            "## {name}\n\n{}",
            content
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("(none recorded yet)")
        )
    };

    format!(
        "# Project Knowledge\n\n{}\n\n{}\n\n{}",
        section("Architecture", architecture),
        section("Decisions", decisions),
        section("Lessons Learned", lessons_learned),
    )
}

/// Seed prompt for a fresh (non-resumed) regeneration conversation: the
/// current document plus the operator's feedback on it.
pub fn regeneration_context(current_summary: &str, user_feedback: &str) -> String {
    format!(
        "Here is the current phase summary:\n\n{current_summary}\n\n\
The operator has given the following feedback and wants it incorporated:\n\n\
> {user_feedback}\n\n\
Revise the summary accordingly. When you are done, emit the following line by \
itself:\n\n\
---REGENERATION_COMPLETE---\n\n\
If the operator's feedback indicates they want to keep the original summary \
unchanged, instead emit:\n\n\
---REGENERATION_CANCELED---\n"
    )
}

pub const FINAL_REGENERATION_PROMPT: &str = "Provide the final, complete regenerated \
summary as markdown, with no additional commentary and no completion marker — just the \
document text.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase1_context_includes_task_when_given() {
        let ctx = build_phase1_context(Some("build a CLI"), "# Project Knowledge\n");
        assert!(ctx.contains("build a CLI"));
        assert!(ctx.contains("---PHASE_COMPLETE---"));
    }

    #[test]
    fn phase1_context_asks_operator_when_task_absent() {
        let ctx = build_phase1_context(None, "");
        assert!(ctx.contains("ask the operator directly"));
    }

    #[test]
    fn phase4_context_has_no_completion_marker() {
        let ctx = build_phase4_context("reqs", &[], &[], "");
        assert!(!ctx.contains("PHASE_COMPLETE"));
    }

    #[test]
    fn summary_prompt_empty_for_phase_four() {
        assert!(summary_prompt(4).is_empty());
        assert!(!summary_prompt(1).is_empty());
    }

    #[test]
    fn render_list_falls_back_to_empty_note() {
        let rendered = render_list(&[], "nothing yet");
        assert_eq!(rendered, "nothing yet");
    }

    #[test]
    fn knowledge_context_block_has_three_sections() {
        let block = knowledge_context_block(Some("A"), None, Some("C"));
        assert!(block.contains("## Architecture\n\nA"));
        assert!(block.contains("(none recorded yet)"));
        assert!(block.contains("## Lessons Learned\n\nC"));
    }
}
