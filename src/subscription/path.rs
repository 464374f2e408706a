// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Path predicates for update subscriptions.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;

use crate::error::ExpressionError;

/// A regular expression matched against update paths.
///
/// The pattern is searched anywhere in the path; anchor it with `^` and `$`
/// to match whole paths.
///
/// # Examples
///
/// ```
/// use smartbox_lib::subscription::PathPattern;
///
/// let pattern = PathPattern::new(r"^/(?P<node_type>[^/]+)/(?P<addr>\d+)/status$").unwrap();
/// let matched = pattern.captures("/htr/2/status").unwrap();
///
/// assert_eq!(matched.name("node_type"), Some("htr"));
/// assert_eq!(matched.name("addr"), Some("2"));
/// assert!(pattern.captures("/mgr/away_status").is_none());
/// ```
#[derive(Clone)]
pub struct PathPattern {
    regex: Regex,
}

impl PathPattern {
    /// Compiles a path pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::InvalidPattern`] if the regular expression is invalid.
    pub fn new(pattern: &str) -> Result<Self, ExpressionError> {
        Regex::new(pattern)
            .map(|regex| Self { regex })
            .map_err(|e| ExpressionError::InvalidPattern(e.to_string()))
    }

    /// Returns the pattern source.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Returns `true` if the pattern matches `path`.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Matches `path` and returns its capture groups.
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<PathMatch> {
        let captures = self.regex.captures(path)?;

        let groups = captures
            .iter()
            .skip(1)
            .map(|group| group.map(|m| m.as_str().to_string()))
            .collect();

        let named = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();

        Some(PathMatch {
            path: path.to_string(),
            groups,
            named,
        })
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathPattern").field(&self.as_str()).finish()
    }
}

/// The result of matching a [`PathPattern`] against an update path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    path: String,
    groups: Vec<Option<String>>,
    named: HashMap<String, String>,
}

impl PathMatch {
    /// Returns the matched path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns a positional capture group (1-based, like regex groups).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.groups.get(i))
            .and_then(Option::as_deref)
    }

    /// Returns a named capture group.
    #[must_use]
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }
}
