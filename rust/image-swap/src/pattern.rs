//! Glob-style URL patterns and the activation rules built on them.
//!
//! A pattern is turned into an anchored regular expression by escaping
//! every `.` and widening every `*` to `.*`. No other character is escaped,
//! so a pattern containing `?`, `+`, `(` and friends is interpreted with
//! their regex meaning. This is a known limitation of the glob syntax, not
//! something to be corrected here: users rely on it behaving exactly as
//! it always has. A pattern that does not compile matches nothing.

use regex::Regex;

use crate::{ImageSwapError, PatternEntry, ReplacementMode};

/// Compile a glob pattern into a regular expression that must match an
/// entire URL.
pub fn compile(pattern: &str) -> Result<Regex, ImageSwapError> {
    let expression = pattern.replace('.', "\\.").replace('*', ".*");
    Regex::new(&format!("^{expression}$")).map_err(|error| ImageSwapError::InvalidPattern {
        pattern: pattern.to_owned(),
        reason: format!("{error}"),
    })
}

/// Test whether `url` matches the glob `pattern` in full.
pub fn matches(url: &str, pattern: &str) -> bool {
    compile(pattern)
        .map(|regex| regex.is_match(url))
        .unwrap_or(false)
}

#[derive(Debug)]
struct CompiledPattern {
    entry: PatternEntry,
    regex: Option<Regex>,
}

impl CompiledPattern {
    fn is_match(&self, url: &str) -> bool {
        self.regex
            .as_ref()
            .map(|regex| regex.is_match(url))
            .unwrap_or(false)
    }
}

/// The configured URL patterns, compiled once per settings snapshot.
#[derive(Debug)]
pub struct SiteScope {
    patterns: Vec<CompiledPattern>,
}

impl SiteScope {
    /// Compile every entry. Entries that fail to compile are kept (they still
    /// count as configured) but never match.
    pub fn new(entries: &[PatternEntry]) -> Self {
        let patterns = entries
            .iter()
            .map(|entry| {
                let regex = match compile(&entry.pattern) {
                    Ok(regex) => Some(regex),
                    Err(error) => {
                        tracing::warn!(%error, "URL pattern will never match");
                        None
                    }
                };
                CompiledPattern {
                    entry: entry.clone(),
                    regex,
                }
            })
            .collect();

        Self { patterns }
    }

    /// Whether the content script should act on `url`.
    ///
    /// With no patterns configured every URL is allowed. If patterns exist
    /// but all are disabled, nothing is allowed.
    pub fn is_url_allowed(&self, url: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }

        self.patterns
            .iter()
            .filter(|pattern| pattern.entry.enabled)
            .any(|pattern| pattern.is_match(url))
    }

    /// The replacement mode in force for `url`.
    ///
    /// The first enabled pattern, in stored order, that matches and carries
    /// a non-default mode wins. Otherwise `global` applies.
    pub fn effective_mode(&self, url: &str, global: ReplacementMode) -> ReplacementMode {
        self.patterns
            .iter()
            .filter(|pattern| pattern.entry.enabled)
            .filter_map(|pattern| {
                pattern
                    .entry
                    .mode
                    .replacement_mode()
                    .filter(|_| pattern.is_match(url))
            })
            .next()
            .unwrap_or(global)
    }

    /// The entry a settings UI should present as "the" pattern for `url`.
    ///
    /// Among all matching entries, enabled ones come first, then longer
    /// (more specific) patterns; remaining ties keep stored order. Returns
    /// the entry's index in the stored list. This ordering is for display
    /// and editing only and has no bearing on [`SiteScope::effective_mode`].
    pub fn best_match(&self, url: &str) -> Option<(usize, &PatternEntry)> {
        let mut matching: Vec<(usize, &PatternEntry)> = self
            .patterns
            .iter()
            .enumerate()
            .filter(|(_, pattern)| pattern.is_match(url))
            .map(|(index, pattern)| (index, &pattern.entry))
            .collect();

        matching.sort_by(|(_, a), (_, b)| {
            b.enabled
                .cmp(&a.enabled)
                .then_with(|| b.pattern.len().cmp(&a.pattern.len()))
        });

        matching.into_iter().next()
    }
}
