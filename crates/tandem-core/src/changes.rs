//! Extraction of declared file changes from implementation text.
//!
//! The implementer declares each file as a header line followed by a fenced
//! code block:
//!
//! ````text
//! ### File: src/lib.rs
//! ```rust
//! pub fn answer() -> u32 { 42 }
//! ```
//! ````
//!
//! The header may carry up to six leading `#` and the path may be wrapped in
//! backticks. Anything else in the text is ignored.

use std::sync::LazyLock;

use regex::Regex;

use tandem_contracts::advisory::FileChange;

static FILE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^(?:#{1,6}[ \t]*)?File:[ \t]*`?([^\s`]+)`?[ \t]*\r?\n```[^\n]*\n(.*?)\r?\n```[ \t]*$")
        .expect("file block regex is valid")
});

/// Return every declared file change, in the order they appear.
pub fn extract_file_changes(implementation: &str) -> Vec<FileChange> {
    FILE_BLOCK_RE
        .captures_iter(implementation)
        .filter_map(|caps| {
            let path = caps.get(1)?.as_str().to_string();
            let content = caps.get(2)?.as_str().to_string();
            Some(FileChange { path, content })
        })
        .collect()
}
