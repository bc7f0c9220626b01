//! Glob pattern matching for file classification.
//!
//! `**` matches zero-or-more path segments, `*` matches within a single
//! segment, `?` matches one non-separator character. Patterns are anchored
//! to the end of the path with an optional leading directory prefix, so
//! `src/**/*.rs` matches both `src/main.rs` and `src/a/b/c.rs`.

use regex::Regex;

/// Translate a glob pattern into the equivalent anchored regex source.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^(?:.*/)?");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                if i + 1 < chars.len() && chars[i + 1] == '*' {
                    // `**` — followed by `/` means "zero or more directories",
                    // otherwise behave like an unrestricted `.*`.
                    if i + 2 < chars.len() && chars[i + 2] == '/' {
                        out.push_str("(?:.*/)?");
                        i += 3;
                        continue;
                    } else {
                        out.push_str(".*");
                        i += 2;
                        continue;
                    }
                }
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            c => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }
    out.push('$');
    out
}

/// Compile a glob pattern into a matcher. Returns `None` if the pattern is
/// not a valid regex after translation (should not happen for well-formed
/// globs, but callers should not panic on operator-supplied config).
pub fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(&glob_to_regex(pattern)).ok()
}

/// Check a single path against a single glob pattern.
pub fn matches(pattern: &str, path: &str) -> bool {
    compile(pattern).map(|re| re.is_match(path)).unwrap_or(false)
}

/// Check a path against any of several glob patterns.
pub fn matches_any(patterns: &[String], path: &str) -> bool {
    patterns.iter().any(|p| matches(p, path))
}
