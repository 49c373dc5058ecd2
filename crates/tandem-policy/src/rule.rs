//! Deny and allow matchers.
//!
//! Matchers are regular expressions run against the literal
//! `action:target` key (separators normalized, no generalization). The deny
//! list is always consulted before the allow list and, within a list, the
//! first match wins.
//!
//! Callers extend the built-in lists through a `PolicyConfig`:
//!
//! ```toml
//! deny = ['^execute:.*\bterraform\s+destroy\b']
//! allow = ['^execute:make\s+test$']
//! ```

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use tandem_contracts::error::{TandemError, TandemResult};

/// Requests that are never allowed without asking a human.
pub const DEFAULT_DENY: &[&str] = &[
    // Recursive removal of root, home, or everything.
    r"(?i)^execute:.*\brm\s+-[a-z]*(?:r[a-z]*f|f[a-z]*r)[a-z]*\s+(?:/\*?|~/?|\*)\s*$",
    r"(?i)^execute:.*--no-preserve-root\b",
    r"(?i)^execute:.*\bsudo\s",
    r"(?i)^execute:.*\b(?:mkfs(?:\.\w+)?|fdisk|shutdown|reboot|halt|poweroff)\b",
    r"(?i)^execute:.*\bdd\s+.*\bof=/dev/",
    r"(?i)^execute:.*>\s*/dev/(?:sd|nvme|disk|hd)",
    r"^execute:.*:\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
    r"(?i)^execute:.*\b(?:curl|wget)\b[^|]*\|\s*(?:sudo\s+)?(?:ba|z|da)?sh\b",
    r"(?i)^execute:.*\bchmod\s+(?:-r\s+)?777\s+/",
    r"(?i)^execute:.*\bgit\s+push\b.*(?:--force\b|\s-f\b)",
    // Credentials and key material.
    r"^[a-z]+:(?:.*[/\s])?\.(?:ssh|gnupg|aws|kube)/",
    r"^(?:read|write|delete):(?:.*/)?[^/]*\.(?:pem|key|p12|pfx)$",
    r"^(?:read|write|delete):(?:.*/)?\.env(?:\.[\w.-]+)?$",
    r"^read:/etc/(?:shadow|gshadow|sudoers)",
    // System locations.
    r"^(?:write|delete):/(?:etc|usr|bin|sbin|boot|sys|proc|dev|lib|lib64)(?:/|$)",
    r"(?i)^(?:write|delete):[a-z]:/windows(?:/|$)",
    r"^delete:(?:.*/)?\.git(?:/.*)?$",
    // Cloud metadata and non-http schemes.
    r"^browse:(?:https?://)?(?:169\.254\.169\.254|metadata\.google\.internal)",
    r"(?i)^browse:(?:file|javascript|data):",
];

/// Requests that are safe to allow without adjudication.
///
/// Command patterns reject shell metacharacters so that `ls; rm x` never
/// rides on the `ls` entry.
pub const DEFAULT_ALLOW: &[&str] = &[
    r"^read:",
    r"(?i)^write:(?:.*/)?[^/.][^/]*\.(?:rs|ts|tsx|js|jsx|mjs|cjs|py|go|java|kt|swift|rb|php|c|h|cc|cpp|hpp|cs|css|scss|less|html|vue|svelte|md|mdx|txt|json|ya?ml|toml|sql|graphql|proto)$",
    r"(?i)^execute:(?:npm|pnpm|yarn|bun)\s+(?:test|install|ci|run\s+(?:test|lint|build|typecheck|format))\b[^;&|<>`$]*$",
    r"(?i)^execute:cargo\s+(?:build|check|test|clippy|fmt|doc)\b[^;&|<>`$]*$",
    r"(?i)^execute:go\s+(?:build|test|vet|fmt)\b[^;&|<>`$]*$",
    r"(?i)^execute:(?:pytest|tsc|eslint|prettier)\b[^;&|<>`$]*$",
    r"(?i)^execute:git\s+(?:status|diff|log|show|branch)\b[^;&|<>`$]*$",
    r"(?i)^execute:(?:ls|pwd|echo|which|wc)\b[^;&|<>`$]*$",
    r"^browse:https://(?:docs\.rs|crates\.io|doc\.rust-lang\.org|developer\.mozilla\.org|github\.com|www\.npmjs\.com|pypi\.org|docs\.python\.org)(?:/|$)",
    r"^delete:(?:.*/)?(?:node_modules|target|dist|build|__pycache__|coverage)(?:/.*)?$",
];

/// Caller-supplied patterns appended after the built-in lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub deny: Vec<String>,
    #[serde(default)]
    pub allow: Vec<String>,
}

impl PolicyConfig {
    /// Parse `s` as TOML. Missing lists default to empty.
    ///
    /// Patterns are not compiled here; `RuleSet::new` validates them.
    pub fn from_toml_str(s: &str) -> TandemResult<Self> {
        toml::from_str(s).map_err(|e| TandemError::ConfigError {
            reason: format!("failed to parse policy TOML: {}", e),
        })
    }

    /// Read the file at `path` and parse it as a `PolicyConfig`.
    pub fn from_file(path: &Path) -> TandemResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TandemError::ConfigError {
            reason: format!("failed to read policy file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}

/// One compiled matcher, remembering the pattern it came from.
#[derive(Debug, Clone)]
pub struct Matcher {
    source: String,
    regex: Regex,
}

impl Matcher {
    fn compile(list: &str, pattern: &str) -> TandemResult<Self> {
        if pattern.trim().is_empty() {
            return Err(TandemError::InvalidPattern {
                list: list.to_string(),
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }
        let regex = Regex::new(pattern).map_err(|e| TandemError::InvalidPattern {
            list: list.to_string(),
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The pattern string this matcher was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// True when the pattern matches anywhere in `literal`.
    pub fn is_match(&self, literal: &str) -> bool {
        self.regex.is_match(literal)
    }
}

/// Ordered deny and allow matchers.
#[derive(Debug, Clone)]
pub struct RuleSet {
    deny: Vec<Matcher>,
    allow: Vec<Matcher>,
}

impl RuleSet {
    /// Compile `base_deny` and `base_allow`, then append the patterns in
    /// `custom`. Any pattern that fails to compile aborts construction.
    pub fn new(
        base_deny: &[&str],
        base_allow: &[&str],
        custom: &PolicyConfig,
    ) -> TandemResult<Self> {
        let deny = base_deny
            .iter()
            .copied()
            .chain(custom.deny.iter().map(String::as_str))
            .map(|p| Matcher::compile("deny", p))
            .collect::<TandemResult<Vec<_>>>()?;
        let allow = base_allow
            .iter()
            .copied()
            .chain(custom.allow.iter().map(String::as_str))
            .map(|p| Matcher::compile("allow", p))
            .collect::<TandemResult<Vec<_>>>()?;
        Ok(Self { deny, allow })
    }

    /// The built-in lists extended with `custom`.
    pub fn with_defaults(custom: &PolicyConfig) -> TandemResult<Self> {
        Self::new(DEFAULT_DENY, DEFAULT_ALLOW, custom)
    }

    /// The first deny matcher that hits `literal`, in declaration order.
    pub fn first_deny(&self, literal: &str) -> Option<&Matcher> {
        self.deny.iter().find(|m| m.is_match(literal))
    }

    /// The first allow matcher that hits `literal`, in declaration order.
    ///
    /// Callers must consult `first_deny` first; this does not.
    pub fn first_allow(&self, literal: &str) -> Option<&Matcher> {
        self.allow.iter().find(|m| m.is_match(literal))
    }

    /// Built-in plus custom deny matchers.
    pub fn deny_len(&self) -> usize {
        self.deny.len()
    }

    /// Built-in plus custom allow matchers.
    pub fn allow_len(&self) -> usize {
        self.allow.len()
    }
}
