//! Database-bound path segments.
//!
//! # Syntax
//! ```text
//! product/[products:slug]                 plain lookup
//! product/[products:slug,json]            decode cell, project current locale
//! product/[products:slug,separator:tr]    decode cell, project key "tr"
//! ```
//!
//! A marker must occupy a whole `/` token. At request time the request
//! segment at the same index is looked up and the marker is replaced by the
//! lookup result. A missing row is a plain non-match, never an error.
//!
//! When a directive is present and the request value is stored under a key
//! other than the projected one, that key becomes the active locale. This is
//! how locale-aware slugs switch the language of a request.

use regex::Regex;
use std::sync::OnceLock;

use super::decode::Directive;
use super::types::{RouteError, RouteResult};
use crate::context::LocaleStore;
use crate::observability::metrics;
use crate::store::{Condition, Lookup, RouteStore, StoreError};

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(
            r"(?i)\[(?P<table>\w+):(?P<column>\w+)(?:\s*,\s*(?P<directive>json|serial|separator)(?::(?P<key>[^\[\]]*))?)?\]",
        )
        .expect("segment marker regex is valid")
    })
}

/// A `[table:column,directive:key]` marker found in a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMarker {
    /// Index of the `/` token the marker occupies.
    pub token_index: usize,
    /// Marker text as written.
    pub source: String,
    pub table: String,
    pub column: String,
    pub directive: Option<Directive>,
    /// Projected key; the current locale when absent.
    pub key: Option<String>,
}

/// True if `pattern` contains at least one segment marker.
pub fn has_markers(pattern: &str) -> bool {
    marker_regex().is_match(pattern)
}

/// Find every segment marker in a slash-trimmed pattern.
pub fn scan(pattern: &str) -> RouteResult<Vec<SegmentMarker>> {
    let tokens: Vec<&str> = pattern.split('/').collect();

    marker_regex()
        .captures_iter(pattern)
        .map(|caps| {
            let source = caps[0].to_string();
            let token_index = tokens.iter().position(|t| t.trim() == source).ok_or_else(|| {
                RouteError::pattern(pattern, format!("segment marker '{source}' must occupy a whole path segment"))
            })?;

            let directive = match caps.name("directive") {
                Some(d) => Some(d.as_str().parse::<Directive>().map_err(|e| RouteError::pattern(pattern, e))?),
                None => None,
            };

            Ok(SegmentMarker {
                token_index,
                source,
                table: caps["table"].to_string(),
                column: caps["column"].to_string(),
                directive,
                key: caps
                    .name("key")
                    .map(|k| k.as_str().trim().to_string())
                    .filter(|k| !k.is_empty()),
            })
        })
        .collect()
}

/// Strictly validate bracket usage and replace each marker with a plain
/// placeholder, so the remaining text can be checked as special syntax.
pub(crate) fn mask_markers(pattern: &str) -> RouteResult<String> {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find(']')
            .ok_or_else(|| RouteError::pattern(pattern, "unterminated '['"))?;
        if after[..close].contains('[') {
            return Err(RouteError::pattern(pattern, "nested '['"));
        }

        let candidate = &rest[open..open + close + 2];
        let well_formed = marker_regex()
            .find(candidate)
            .is_some_and(|m| m.as_str() == candidate);
        if !well_formed {
            return Err(RouteError::pattern(pattern, format!("malformed segment marker '{candidate}'")));
        }

        out.push('x');
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Replace markers with a placeholder without validating anything else.
pub(crate) fn placeholder_markers(pattern: &str) -> String {
    marker_regex().replace_all(pattern, "x").into_owned()
}

/// Outcome of resolving every marker of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPattern {
    /// Pattern with every marker replaced by its lookup result.
    pub pattern: String,
    /// Locale switched to while decoding, if any.
    pub locale: Option<String>,
}

struct Substitution {
    value: String,
    locale: Option<String>,
}

/// Resolves segment markers against a store for one request.
pub struct DynamicSegmentResolver<'a> {
    store: &'a dyn RouteStore,
    locale: &'a dyn LocaleStore,
}

impl<'a> DynamicSegmentResolver<'a> {
    pub fn new(store: &'a dyn RouteStore, locale: &'a dyn LocaleStore) -> Self {
        Self { store, locale }
    }

    /// Resolve every marker of `pattern` against the request `segments`.
    ///
    /// Returns `Ok(None)` when any lookup misses or the pattern is malformed.
    pub fn resolve(&self, pattern: &str, segments: &[&str]) -> Result<Option<ResolvedPattern>, StoreError> {
        let pattern = pattern.trim().trim_matches('/');
        match scan(pattern) {
            Ok(markers) => self.resolve_markers(pattern, &markers, segments),
            Err(e) => {
                tracing::warn!(error = %e, "Unresolvable segment pattern");
                Ok(None)
            }
        }
    }

    /// Resolve pre-scanned `markers` of `pattern`.
    pub fn resolve_markers(
        &self,
        pattern: &str,
        markers: &[SegmentMarker],
        segments: &[&str],
    ) -> Result<Option<ResolvedPattern>, StoreError> {
        let mut tokens: Vec<String> = pattern.split('/').map(str::to_string).collect();
        let mut switched = None;

        for marker in markers {
            let Some(value) = segments.get(marker.token_index).filter(|v| !v.is_empty()) else {
                metrics::record_lookup("miss");
                return Ok(None);
            };

            match self.lookup(marker, value)? {
                Some(sub) => {
                    tokens[marker.token_index] = sub.value;
                    if sub.locale.is_some() {
                        switched = sub.locale;
                    }
                }
                None => {
                    tracing::debug!(
                        table = %marker.table,
                        column = %marker.column,
                        value = %value,
                        "Segment lookup missed"
                    );
                    return Ok(None);
                }
            }
        }

        Ok(Some(ResolvedPattern {
            pattern: tokens.join("/"),
            locale: switched,
        }))
    }

    fn lookup(&self, marker: &SegmentMarker, value: &str) -> Result<Option<Substitution>, StoreError> {
        let condition = if marker.directive.is_some() {
            Condition::Contains
        } else {
            Condition::Equals
        };

        let raw = self
            .store
            .value(&Lookup {
                table: &marker.table,
                column: &marker.column,
                value,
                condition,
            })
            .inspect_err(|_| metrics::record_lookup("error"))?;

        let Some(raw) = raw else {
            metrics::record_lookup("miss");
            return Ok(None);
        };

        let Some(directive) = marker.directive else {
            metrics::record_lookup("hit");
            return Ok(Some(Substitution { value: raw, locale: None }));
        };

        let Some(entries) = directive.decode(&raw) else {
            tracing::debug!(table = %marker.table, directive = %directive, "Cell value could not be decoded");
            metrics::record_lookup("miss");
            return Ok(None);
        };

        let key = marker.key.clone().unwrap_or_else(|| self.locale.current_locale());
        let projected = entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone());

        if projected.as_deref() != Some(value) {
            if let Some((other_key, other_value)) = entries.iter().find(|(_, v)| v == value) {
                tracing::info!(from = %key, to = %other_key, "Locale switched by segment lookup");
                self.locale.set_locale(other_key);
                metrics::record_lookup("hit");
                return Ok(Some(Substitution {
                    value: other_value.clone(),
                    locale: Some(other_key.clone()),
                }));
            }
        }

        match projected {
            Some(value) => {
                metrics::record_lookup("hit");
                Ok(Some(Substitution { value, locale: None }))
            }
            None => {
                metrics::record_lookup("miss");
                Ok(None)
            }
        }
    }
}
