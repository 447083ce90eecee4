//! Acknowledgement id extraction from upload responses

use crate::proxy::models::AcknowledgementId;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// A named response pattern whose first capture group is the id
struct AckPattern {
    name: &'static str,
    regex: Regex,
}

impl AckPattern {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("Invalid acknowledgement regex"),
        }
    }

    fn find(&self, text: &str) -> Option<AcknowledgementId> {
        let capture = self.regex.captures(text)?.get(1)?;
        AcknowledgementId::extracted(capture.as_str(), self.name)
    }
}

/// Patterns tried in order; the first match wins
static ACK_PATTERNS: Lazy<Vec<AckPattern>> = Lazy::new(|| {
    vec![
        AckPattern::new("key_value", r#"(?i)save_id["']?\s*:\s*["']?([^"'>\s]+)"#),
        AckPattern::new("query_string", r"(?i)save_id=([^&\s]+)"),
        AckPattern::new("json", r#"(?i)"save_id":\s*"([^"]+)""#),
        AckPattern::new("success_marker", r"(?i)Success[^a-zA-Z0-9]*([a-zA-Z0-9\-]+)"),
    ]
});

/// Run the ordered patterns over a response body without any fallback
pub fn match_acknowledgement(text: &str) -> Option<AcknowledgementId> {
    ACK_PATTERNS.iter().find_map(|pattern| pattern.find(text))
}

/// Extract the acknowledgement id for a batch response.
///
/// Never fails: when no pattern matches, a synthetic
/// `upload_<unix seconds>_<batch index>` id is returned and a warning logged.
pub fn parse_acknowledgement(text: &str, batch_index: usize) -> AcknowledgementId {
    if let Some(id) = match_acknowledgement(text) {
        debug!(batch = batch_index, save_id = %id, source = ?id.source(), "Found save_id");
        return id;
    }

    let id = AcknowledgementId::synthetic(Utc::now().timestamp(), batch_index);
    warn!(batch = batch_index, save_id = %id, "Could not extract save_id, using synthetic id");
    id
}
