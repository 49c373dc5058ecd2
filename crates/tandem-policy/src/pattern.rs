//! Generalization of `action:target` pairs into cache keys.
//!
//! A pattern abstracts the variable parts of a target so one decision covers
//! a whole class of requests. The transformation is applied per `/`-separated
//! segment, in this order:
//!
//! 1. Backslashes become `/`.
//! 2. A known build-output or cache directory swallows everything after it:
//!    `web/node_modules/react/index.js` → `web/node_modules/*`.
//! 3. Purely numeric segments become `*`: `/users/42` → `/users/*`.
//! 4. Embedded ports become `*`: `localhost:3000` → `localhost:*`.
//! 5. A final segment with a file extension becomes `*.<ext>`:
//!    `src/app.ts` → `src/*.ts`. Dotfiles (`.env.local`), segments with
//!    whitespace (`python main.py`) and the host of a URL (`https://pypi.org`)
//!    are left alone.
//!
//! Every step is a fixed point of itself, so `generalize` is idempotent.

use std::sync::LazyLock;

use regex::Regex;

use tandem_contracts::approval::ApprovalRequest;

/// Directories whose contents are regenerated and never worth keying on.
pub const EPHEMERAL_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    ".next",
    ".nuxt",
    ".turbo",
    ".cache",
    "__pycache__",
    "coverage",
    "tmp",
];

static PORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":\d+\b").expect("port regex is valid"));

/// Replace Windows separators with `/`.
pub fn normalize_separators(target: &str) -> String {
    target.replace('\\', "/")
}

/// The literal key matchers run against: `action:target` with normalized
/// separators but no generalization.
pub fn literal_key(request: &ApprovalRequest) -> String {
    format!("{}:{}", request.action, normalize_separators(&request.target))
}

/// The generalized cache key for `request`.
pub fn pattern_for(request: &ApprovalRequest) -> String {
    format!("{}:{}", request.action, generalize_target(&request.target))
}

/// Generalize a full `action:target` key. Keys without an action prefix are
/// treated as bare targets.
pub fn generalize(key: &str) -> String {
    match key.split_once(':') {
        Some((action, target)) if is_action_token(action) => {
            format!("{}:{}", action, generalize_target(target))
        }
        _ => generalize_target(key),
    }
}

fn is_action_token(s: &str) -> bool {
    matches!(s, "read" | "write" | "execute" | "browse" | "delete")
}

/// Generalize a bare target (path, command, or URL).
pub fn generalize_target(target: &str) -> String {
    let normalized = normalize_separators(target);
    let raw: Vec<&str> = normalized.split('/').collect();

    let mut segments: Vec<String> = Vec::with_capacity(raw.len());
    for segment in raw {
        if EPHEMERAL_DIRS.contains(&segment) {
            segments.push(segment.to_string());
            segments.push("*".to_string());
            break;
        }
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            segments.push("*".to_string());
            continue;
        }
        segments.push(PORT_RE.replace_all(segment, ":*").into_owned());
    }

    let last_index = segments.len().saturating_sub(1);
    if last_index != authority_index(&segments).unwrap_or(usize::MAX) {
        if let Some(collapsed) = segments.last().and_then(|last| collapse_extension(last)) {
            segments[last_index] = collapsed;
        }
    }

    segments.join("/")
}

/// Index of the host segment in a `scheme://host[:port]/...` target.
fn authority_index(segments: &[String]) -> Option<usize> {
    match segments {
        [scheme, empty, _, ..] if scheme.ends_with(':') && empty.is_empty() => Some(2),
        _ => None,
    }
}

fn collapse_extension(segment: &str) -> Option<String> {
    if segment.chars().any(char::is_whitespace) {
        return None;
    }
    let (stem, ext) = segment.rsplit_once('.')?;
    let plausible_ext = !ext.is_empty()
        && ext.len() <= 10
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    if stem.is_empty() || stem.starts_with('.') || !plausible_ext {
        return None;
    }
    Some(format!("*.{ext}"))
}
