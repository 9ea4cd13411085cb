// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Domain matching for provider instances.
//!
//! A [`DomainMatcher`] decides whether a hostname belongs to a provider
//! instance. Patterns are either globs (the default) or full-match regular
//! expressions; a hostname matches when at least one include pattern matches
//! and no exclude pattern does. Matching is case-insensitive throughout.
//!
//! Glob syntax: `*` matches any run of characters *including dots*, `?`
//! matches exactly one character, and `[...]` is a character class. This
//! mirrors how split-horizon setups are usually written: `*.example.com`
//! covers `a.b.example.com` too.

use crate::dns_errors::DnsError;
use regex::Regex;

/// How patterns in a matcher are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Shell-style globs (`*`, `?`, `[...]`), with `*` crossing label dots
    #[default]
    Glob,
    /// Full-match regular expressions
    Regex,
}

/// Predicate deciding provider membership for a hostname.
#[derive(Debug, Clone)]
pub struct DomainMatcher {
    includes: Vec<Regex>,
    excludes: Vec<Regex>,
    mode: MatchMode,
}

impl DomainMatcher {
    /// Build a matcher from include and exclude pattern lists.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::ConfigInvalid`] when the include list is empty or
    /// any pattern fails to compile.
    pub fn new(includes: &[String], excludes: &[String], mode: MatchMode) -> Result<Self, DnsError> {
        if includes.is_empty() {
            return Err(DnsError::ConfigInvalid {
                reason: "domain matcher requires at least one include pattern".to_string(),
            });
        }

        let compile = |pattern: &String| -> Result<Regex, DnsError> {
            let full = match mode {
                MatchMode::Glob => glob_to_regex(pattern),
                MatchMode::Regex => format!("(?i)^(?:{pattern})$"),
            };
            Regex::new(&full).map_err(|e| DnsError::ConfigInvalid {
                reason: format!("invalid domain pattern '{pattern}': {e}"),
            })
        };

        Ok(Self {
            includes: includes.iter().map(compile).collect::<Result<_, _>>()?,
            excludes: excludes.iter().map(compile).collect::<Result<_, _>>()?,
            mode,
        })
    }

    /// Whether `hostname` is admitted by this matcher.
    #[must_use]
    pub fn matches(&self, hostname: &str) -> bool {
        let name = hostname.trim_end_matches('.');
        self.includes.iter().any(|re| re.is_match(name))
            && !self.excludes.iter().any(|re| re.is_match(name))
    }

    /// The pattern interpretation this matcher was built with.
    #[must_use]
    pub fn mode(&self) -> MatchMode {
        self.mode
    }
}

/// Translate a glob pattern into an anchored, case-insensitive regex.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?i)^");

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                // Copy the character class through verbatim; '!' negation is
                // translated to regex '^'.
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                    if matches!(inner, '\\' | '^') {
                        out.push('\\');
                    }
                    out.push(inner);
                }
                out.push(']');
            }
            _ => {
                if regex_syntax_char(c) {
                    out.push('\\');
                }
                out.push(c);
            }
        }
    }

    out.push('$');
    out
}

fn regex_syntax_char(c: char) -> bool {
    matches!(
        c,
        '.' | '+' | '(' | ')' | '|' | '^' | '$' | '{' | '}' | '\\' | '['
    )
}

#[cfg(test)]
#[path = "matcher_tests.rs"]
mod matcher_tests;
