//! Pattern-based WHOIS body interpretation (spec §4.4 WHOIS path).

use crate::model::Availability;

const DEFAULT_AVAILABLE_PATTERNS: &[&str] =
    &["no match", "not found", "no data found", "status: free"];
const DEFAULT_TAKEN_PATTERNS: &[&str] =
    &["domain name:", "status: active", "registration status:", "created on"];

/// Case-insensitive substring match against available/taken pattern lists.
/// First match wins; if neither list matches, the body is ambiguous and
/// must yield `Unknown` rather than a guess (spec §9 Open Questions).
pub struct WhoisInterpreter {
    available_patterns: Vec<String>,
    taken_patterns: Vec<String>,
}

impl Default for WhoisInterpreter {
    fn default() -> Self {
        Self {
            available_patterns: DEFAULT_AVAILABLE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            taken_patterns: DEFAULT_TAKEN_PATTERNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl WhoisInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patterns(available: Vec<String>, taken: Vec<String>) -> Self {
        Self { available_patterns: available, taken_patterns: taken }
    }

    pub fn interpret(&self, body: &str) -> Availability {
        let lower = body.to_lowercase();
        if self.available_patterns.iter().any(|p| lower.contains(p.as_str())) {
            return Availability::Available;
        }
        if self.taken_patterns.iter().any(|p| lower.contains(p.as_str())) {
            return Availability::Taken;
        }
        Availability::Unknown
    }
}
