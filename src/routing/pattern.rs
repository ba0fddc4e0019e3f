//! Pattern compilation.
//!
//! # Responsibilities
//! - Turn a declared route string into a matcher (literal or regex)
//! - Build the positional substitution template (`$1`, `$2`, ...) for the target
//! - Reject malformed marker syntax at declaration time
//! - Drop root-equivalent patterns so the application root is never overridden
//!
//! # Syntax
//! ```text
//! special:  user/:numeric/:action      typed or named markers, literals escaped
//!           {start}404{end}            anchor tokens (matching is always anchored)
//! classic:  user/([0-9]+)/(edit|show)  raw regular expression, user-numbered groups
//! ```
//!
//! Exactly one syntax is active per process; it is chosen once from
//! configuration and injected into [`PatternCompiler`].

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

use super::dynamic;
use super::types::{RouteError, RouteResult, Target};

/// Pattern syntax selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternMode {
    #[default]
    Special,
    Classic,
}

/// Strategy that owns one pattern syntax.
pub trait PatternSyntax: Send + Sync + fmt::Debug {
    /// Validate a declared pattern before any dynamic segment is resolved.
    fn check(&self, pattern: &str) -> RouteResult<()>;

    /// Build the matcher for a resolved, slash-trimmed pattern.
    fn matcher(&self, pattern: &str) -> RouteResult<Matcher>;

    /// Build the substitution template that maps captures onto `target`.
    fn template(&self, pattern: &str, target: &Target, matcher: &Matcher) -> String;
}

/// Compiled form of a route pattern.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Exact, case-insensitive comparison. Stored lowercase.
    Literal(String),
    /// Anchored, case-insensitive regular expression.
    Regex(Regex),
}

impl Matcher {
    fn literal(text: &str) -> Self {
        Matcher::Literal(text.to_lowercase())
    }

    /// Returns the captured groups in order when `path` fully matches.
    pub fn captures(&self, path: &str) -> Option<Vec<String>> {
        match self {
            Matcher::Literal(literal) => (path.to_lowercase() == *literal).then(Vec::new),
            Matcher::Regex(re) => re.captures(path).map(|caps| {
                caps.iter()
                    .skip(1)
                    .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect()
            }),
        }
    }

    /// Number of capture groups the matcher produces.
    pub fn group_count(&self) -> usize {
        match self {
            Matcher::Literal(_) => 0,
            Matcher::Regex(re) => re.captures_len().saturating_sub(1),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Matcher::Literal(literal) => literal,
            Matcher::Regex(re) => re.as_str(),
        }
    }
}

/// A route ready for matching.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    /// Table key: the slash-trimmed pattern the route was compiled from.
    pub key: String,
    pub matcher: Matcher,
    pub template: String,
    pub target: Target,
}

impl CompiledRoute {
    /// Fill `$n` placeholders of the template with `captures[n - 1]`.
    pub fn substitute(&self, captures: &[String]) -> String {
        substitute(&self.template, captures)
    }
}

pub(crate) fn substitute(template: &str, captures: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' || !chars.peek().is_some_and(|n| n.is_ascii_digit()) {
            out.push(c);
            continue;
        }

        let mut ordinal = 0usize;
        while let Some(digit) = chars.peek().and_then(|n| n.to_digit(10)) {
            ordinal = ordinal * 10 + digit as usize;
            chars.next();
        }
        if let Some(value) = ordinal.checked_sub(1).and_then(|i| captures.get(i)) {
            out.push_str(value);
        }
    }

    out
}

/// Compiles declared patterns with the process-wide syntax.
#[derive(Debug, Clone)]
pub struct PatternCompiler {
    syntax: Arc<dyn PatternSyntax>,
}

impl PatternCompiler {
    pub fn new(mode: PatternMode) -> Self {
        let syntax: Arc<dyn PatternSyntax> = match mode {
            PatternMode::Special => Arc::new(SpecialSyntax),
            PatternMode::Classic => Arc::new(ClassicSyntax),
        };
        Self { syntax }
    }

    /// Use a custom syntax strategy.
    pub fn with_syntax(syntax: Arc<dyn PatternSyntax>) -> Self {
        Self { syntax }
    }

    /// Validate a declared pattern, dynamic markers included.
    pub fn check(&self, pattern: &str) -> RouteResult<()> {
        self.syntax.check(pattern.trim().trim_matches('/'))
    }

    /// Compile `pattern` for `target`.
    ///
    /// Returns `Ok(None)` when the pattern is root-equivalent; such routes are
    /// never added to the table.
    pub fn compile(&self, pattern: &str, target: &Target) -> RouteResult<Option<CompiledRoute>> {
        let cleaned = pattern.trim().trim_matches('/');
        if is_root_equivalent(cleaned) {
            tracing::debug!(pattern = %pattern, target = %target, "Root-equivalent pattern dropped");
            return Ok(None);
        }

        let matcher = self.syntax.matcher(cleaned)?;
        let template = self.syntax.template(cleaned, target, &matcher);

        Ok(Some(CompiledRoute {
            key: cleaned.to_string(),
            matcher,
            template,
            target: target.clone(),
        }))
    }
}

impl Default for PatternCompiler {
    fn default() -> Self {
        Self::new(PatternMode::Special)
    }
}

fn is_root_equivalent(pattern: &str) -> bool {
    strip_anchor_tokens(pattern).trim_matches('/').trim().is_empty()
}

fn anchor_regex() -> &'static Regex {
    static ANCHOR: OnceLock<Regex> = OnceLock::new();
    ANCHOR.get_or_init(|| Regex::new(r"(?i)\{(?:start|end)\}").expect("anchor token regex is valid"))
}

fn strip_anchor_tokens(pattern: &str) -> String {
    anchor_regex().replace_all(pattern, "").into_owned()
}

/// Joins the rendered pattern to the target: the first segment is replaced
/// by the target path unless it carries a marker.
fn compose_template(rendered: &str, keep_first: bool, target: &Target) -> String {
    let rendered = rendered.trim_matches('/');
    let rest = if keep_first {
        rendered
    } else {
        rendered.split_once('/').map(|(_, rest)| rest).unwrap_or("")
    };

    if rest.is_empty() {
        target.path()
    } else {
        format!("{}/{}", target.path(), rest)
    }
}

// ============================================================================
// Special syntax
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum SpecialToken {
    Text(String),
    Marker(String),
    Anchor,
}

/// Named-marker syntax: `:name` captures, `{start}`/`{end}` anchors.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecialSyntax;

impl SpecialSyntax {
    fn tokenize(pattern: &str) -> RouteResult<Vec<SpecialToken>> {
        let mut tokens = Vec::new();
        let mut text = String::new();
        let mut chars = pattern.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                ':' => {
                    let mut name = String::new();
                    while let Some(&(_, n)) = chars.peek() {
                        if n.is_alphanumeric() || n == '_' {
                            name.push(n);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if name.is_empty() {
                        let reason = if chars.peek().is_some_and(|&(_, n)| n == ':') {
                            "nested marker"
                        } else {
                            "empty marker name"
                        };
                        return Err(RouteError::pattern(pattern, reason));
                    }
                    if chars.peek().is_some_and(|&(_, n)| n == ':') {
                        return Err(RouteError::pattern(pattern, format!("nested marker after ':{name}'")));
                    }
                    if !text.is_empty() {
                        tokens.push(SpecialToken::Text(std::mem::take(&mut text)));
                    }
                    tokens.push(SpecialToken::Marker(name));
                }
                '{' => {
                    let rest = &pattern[pos + 1..];
                    let Some(end) = rest.find('}') else {
                        return Err(RouteError::pattern(pattern, "unterminated '{'"));
                    };
                    let inner = &rest[..end];
                    if inner.contains('{') {
                        return Err(RouteError::pattern(pattern, "nested '{'"));
                    }
                    match inner.to_lowercase().as_str() {
                        "start" | "end" => {}
                        other => {
                            return Err(RouteError::pattern(pattern, format!("unknown token '{{{other}}}'")));
                        }
                    }
                    // Skip the token body and the closing brace.
                    for _ in 0..=inner.chars().count() {
                        chars.next();
                    }
                    if !text.is_empty() {
                        tokens.push(SpecialToken::Text(std::mem::take(&mut text)));
                    }
                    tokens.push(SpecialToken::Anchor);
                }
                '}' => return Err(RouteError::pattern(pattern, "unmatched '}'")),
                '[' => return Err(RouteError::pattern(pattern, "unresolved segment marker")),
                ']' => return Err(RouteError::pattern(pattern, "unmatched ']'")),
                _ => text.push(c),
            }
        }

        if !text.is_empty() {
            tokens.push(SpecialToken::Text(text));
        }
        Ok(tokens)
    }

    fn marker_regex(name: &str) -> &'static str {
        match name.to_lowercase().as_str() {
            "numeric" => "([0-9]+)",
            "alpha" => "([a-zA-Z]+)",
            "alnum" => "([a-zA-Z0-9]+)",
            "seo" => "([a-zA-Z0-9_-]+)",
            "all" => "(.+)",
            _ => "([^/]+)",
        }
    }
}

impl PatternSyntax for SpecialSyntax {
    fn check(&self, pattern: &str) -> RouteResult<()> {
        let masked = dynamic::mask_markers(pattern)?;
        Self::tokenize(&masked).map(|_| ())
    }

    fn matcher(&self, pattern: &str) -> RouteResult<Matcher> {
        let tokens = Self::tokenize(pattern)?;

        if !tokens.iter().any(|t| matches!(t, SpecialToken::Marker(_))) {
            let literal: String = tokens
                .iter()
                .filter_map(|t| match t {
                    SpecialToken::Text(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect();
            return Ok(Matcher::literal(literal.trim_matches('/')));
        }

        let mut body = String::new();
        for token in &tokens {
            match token {
                SpecialToken::Text(s) => body.push_str(&regex::escape(s)),
                SpecialToken::Marker(name) => body.push_str(Self::marker_regex(name)),
                SpecialToken::Anchor => {}
            }
        }

        RegexBuilder::new(&format!("^{}$", body.trim_matches('/')))
            .case_insensitive(true)
            .build()
            .map(Matcher::Regex)
            .map_err(|e| RouteError::pattern(pattern, e.to_string()))
    }

    fn template(&self, pattern: &str, target: &Target, _matcher: &Matcher) -> String {
        let Ok(tokens) = Self::tokenize(pattern) else {
            return target.path();
        };

        let mut rendered = String::new();
        let mut ordinal = 0;
        let mut first_has_marker = false;

        for token in tokens {
            match token {
                SpecialToken::Text(s) => rendered.push_str(&s),
                SpecialToken::Marker(_) => {
                    ordinal += 1;
                    if !rendered.trim_start_matches('/').contains('/') {
                        first_has_marker = true;
                    }
                    rendered.push_str(&format!("${ordinal}"));
                }
                SpecialToken::Anchor => {}
            }
        }

        compose_template(&rendered, first_has_marker, target)
    }
}

// ============================================================================
// Classic syntax
// ============================================================================

/// Raw regular-expression syntax.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicSyntax;

impl PatternSyntax for ClassicSyntax {
    fn check(&self, pattern: &str) -> RouteResult<()> {
        let masked = dynamic::placeholder_markers(pattern);
        Regex::new(&masked)
            .map(|_| ())
            .map_err(|e| RouteError::pattern(pattern, e.to_string()))
    }

    fn matcher(&self, pattern: &str) -> RouteResult<Matcher> {
        if regex::escape(pattern) == pattern {
            return Ok(Matcher::literal(pattern));
        }

        RegexBuilder::new(&format!("^(?:{pattern})$"))
            .case_insensitive(true)
            .build()
            .map(Matcher::Regex)
            .map_err(|e| RouteError::pattern(pattern, e.to_string()))
    }

    fn template(&self, _pattern: &str, target: &Target, matcher: &Matcher) -> String {
        let mut template = target.path();
        for ordinal in 1..=matcher.group_count() {
            template.push_str(&format!("/${ordinal}"));
        }
        template
    }
}
