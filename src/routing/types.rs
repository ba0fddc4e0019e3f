//! Route targets and error definitions.

use std::fmt;
use thiserror::Error;

use crate::filters::FilterKind;

/// Errors raised while declaring routes and filters.
///
/// All of these are declaration-time failures: they abort startup and no
/// partial table is ever published.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Malformed marker syntax in a declared pattern.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A filter kind name with no registered handler.
    #[error("unknown filter kind '{0}'")]
    UnknownFilterKind(String),

    /// A filter declaration that cannot be honoured.
    #[error("invalid {kind} filter: {reason}")]
    InvalidFilter { kind: FilterKind, reason: String },

    /// Target string with no controller component.
    #[error("invalid route target '{0}'")]
    InvalidTarget(String),
}

impl RouteError {
    pub(crate) fn pattern(pattern: &str, reason: impl Into<String>) -> Self {
        RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for declaration-time operations.
pub type RouteResult<T> = Result<T, RouteError>;

/// Controller path + action name a route dispatches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub controller: String,
    pub action: String,
}

impl Target {
    /// Parse `controller[/sub]/action`, appending `default_action` when the
    /// target carries no `/`.
    pub fn parse(raw: &str, default_action: &str) -> RouteResult<Self> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(RouteError::InvalidTarget(raw.to_string()));
        }

        match trimmed.rsplit_once('/') {
            Some((controller, action)) if !controller.is_empty() && !action.is_empty() => {
                Ok(Self {
                    controller: controller.to_string(),
                    action: action.to_string(),
                })
            }
            Some(_) => Err(RouteError::InvalidTarget(raw.to_string())),
            None => Ok(Self {
                controller: trimmed.to_string(),
                action: default_action.to_string(),
            }),
        }
    }

    /// `controller/action` as declared.
    pub fn path(&self) -> String {
        format!("{}/{}", self.controller, self.action)
    }

    /// Lowercase key filter declarations are stored under.
    pub fn route_key(&self) -> String {
        self.path().to_lowercase()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.controller, self.action)
    }
}
