//! Protocol classification for the free-text protocol column

use crate::proxy::models::{ProtocolSet, ProtocolTag};

/// Derive the protocol set from a protocol cell's text.
///
/// HTTP-family and SOCKS-family keywords are checked independently and the
/// results unioned. `None` (no protocol column) and unrecognised text both
/// yield `{HTTP}`.
pub fn classify_protocols(text: Option<&str>) -> ProtocolSet {
    let Some(text) = text else {
        return ProtocolSet::default();
    };
    let text = text.to_uppercase();
    let mut tags = Vec::with_capacity(4);

    if text.contains("HTTPS") {
        tags.extend([ProtocolTag::Http, ProtocolTag::Https]);
    } else if text.contains("HTTP") {
        tags.push(ProtocolTag::Http);
    }

    if text.contains("SOCKS5") {
        tags.push(ProtocolTag::Socks5);
    } else if text.contains("SOCKS4") {
        tags.push(ProtocolTag::Socks4);
    } else if text.contains("SOCKS") {
        tags.extend([ProtocolTag::Socks4, ProtocolTag::Socks5]);
    }

    ProtocolSet::from_tags(tags)
}
