//! Origin gating for browser clients.

use std::fmt;

/// Which browser origins may open a connection.
///
/// Only browsers send an `Origin` header, so requests without one are
/// always let through; the policy is a guard against other web pages
/// talking to the server, not an authentication mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OriginPolicy {
    /// Accept every origin (the `*` setting).
    #[default]
    Any,
    /// Accept only this exact origin, e.g. `https://re-cards.vercel.app`.
    Exact(String),
}

impl OriginPolicy {
    /// Parses a setting value: `*` (or an empty value) means any origin,
    /// anything else is taken as the single allowed origin.
    pub fn from_setting(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value == "*" {
            Self::Any
        } else {
            Self::Exact(value.trim_end_matches('/').to_string())
        }
    }

    /// Returns `true` if a request carrying `origin` may connect.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match (self, origin) {
            (Self::Any, _) | (_, None) => true,
            (Self::Exact(allowed), Some(origin)) => {
                allowed.eq_ignore_ascii_case(origin.trim_end_matches('/'))
            }
        }
    }
}

impl fmt::Display for OriginPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(origin) => write!(f, "{origin}"),
        }
    }
}
