//! Plan tiers and inference from provider product names.

use std::fmt;

/// Subscription plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Plan {
    Free,
    Pro,
    Team,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Team => "team",
        }
    }

    /// Parses a stored plan string. Unknown values map to `None` rather
    /// than defaulting, so callers can distinguish "absent" from "free".
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "free" => Some(Plan::Free),
            "pro" => Some(Plan::Pro),
            "team" => Some(Plan::Team),
            _ => None,
        }
    }

    /// Infers a plan from a provider product name.
    ///
    /// "team" is checked before "pro" so a product named "Pro Team Plan"
    /// resolves to the team tier. Matching is case-insensitive substring.
    pub fn infer_from_product_name(name: &str) -> Option<Self> {
        let lowered = name.to_ascii_lowercase();
        if lowered.contains("team") {
            Some(Plan::Team)
        } else if lowered.contains("pro") {
            Some(Plan::Pro)
        } else {
            None
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
