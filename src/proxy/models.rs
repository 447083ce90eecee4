//! Proxy harvest data models

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Protocol a harvested proxy claims to support
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProtocolTag {
    Http,
    Https,
    Socks4,
    Socks5,
}

impl fmt::Display for ProtocolTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolTag::Http => write!(f, "HTTP"),
            ProtocolTag::Https => write!(f, "HTTPS"),
            ProtocolTag::Socks4 => write!(f, "SOCKS4"),
            ProtocolTag::Socks5 => write!(f, "SOCKS5"),
        }
    }
}

/// Non-empty, ordered set of protocol tags.
///
/// An empty input always collapses to `{HTTP}`, so a `ProtocolSet` can never
/// be observed empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ProtocolTag>", into = "Vec<ProtocolTag>")]
pub struct ProtocolSet(BTreeSet<ProtocolTag>);

impl ProtocolSet {
    /// Build a set from any tags, falling back to `{HTTP}` when none are given
    pub fn from_tags<I: IntoIterator<Item = ProtocolTag>>(tags: I) -> Self {
        let set: BTreeSet<_> = tags.into_iter().collect();
        if set.is_empty() {
            Self::default()
        } else {
            Self(set)
        }
    }

    pub fn contains(&self, tag: ProtocolTag) -> bool {
        self.0.contains(&tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ProtocolTag> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<ProtocolTag> {
        self.iter().collect()
    }
}

impl Default for ProtocolSet {
    fn default() -> Self {
        Self(BTreeSet::from([ProtocolTag::Http]))
    }
}

impl From<Vec<ProtocolTag>> for ProtocolSet {
    fn from(tags: Vec<ProtocolTag>) -> Self {
        Self::from_tags(tags)
    }
}

impl From<ProtocolSet> for Vec<ProtocolTag> {
    fn from(set: ProtocolSet) -> Self {
        set.0.into_iter().collect()
    }
}

impl fmt::Display for ProtocolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<String> = self.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", tags.join(","))
    }
}

/// A validated proxy endpoint scraped from a listing row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyRecord {
    #[serde(rename = "ip")]
    address: String,
    port: u16,
    protocols: ProtocolSet,
}

impl ProxyRecord {
    /// Create a record; `None` when the address is blank or the port is zero
    pub fn new(address: impl Into<String>, port: u16, protocols: ProtocolSet) -> Option<Self> {
        let address = address.into();
        if address.trim().is_empty() || port == 0 {
            return None;
        }
        Some(Self {
            address,
            port,
            protocols,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn protocols(&self) -> &ProtocolSet {
        &self.protocols
    }

    /// Get the record in ADDRESS:PORT format
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl fmt::Display for ProxyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.endpoint(), self.protocols)
    }
}

/// An ordered group of records submitted together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    pub members: Vec<ProxyRecord>,
}

impl Batch {
    pub fn new(index: usize, members: Vec<ProxyRecord>) -> Self {
        Self { index, members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// ADDRESS:PORT strings of every member, in batch order
    pub fn endpoints(&self) -> Vec<String> {
        self.members.iter().map(ProxyRecord::endpoint).collect()
    }

    /// Newline-joined endpoints, as sent in the `proxies` form field
    pub fn payload(&self) -> String {
        self.endpoints().join("\n")
    }
}

/// How an acknowledgement identifier was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckSource {
    /// Matched by the named response pattern
    Extracted(&'static str),
    /// Generated locally because no pattern matched
    Synthetic,
}

/// Opaque, never-empty identifier returned for an uploaded batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcknowledgementId {
    value: String,
    source: AckSource,
}

impl AcknowledgementId {
    /// Wrap an extracted value; `None` for an empty match
    pub fn extracted(value: impl Into<String>, pattern: &'static str) -> Option<Self> {
        let value = value.into();
        if value.is_empty() {
            return None;
        }
        Some(Self {
            value,
            source: AckSource::Extracted(pattern),
        })
    }

    /// Synthesize `upload_<unix seconds>_<batch index>`
    pub fn synthetic(unix_secs: i64, batch_index: usize) -> Self {
        Self {
            value: format!("upload_{}_{}", unix_secs, batch_index),
            source: AckSource::Synthetic,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> AckSource {
        self.source
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.source, AckSource::Synthetic)
    }
}

impl fmt::Display for AcknowledgementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Acknowledgement id → ADDRESS:PORT strings of the acknowledged batch
pub type ResultMap = BTreeMap<String, Vec<String>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn record(address: &str, port: u16) -> ProxyRecord {
        ProxyRecord::new(address, port, ProtocolSet::default()).unwrap()
    }

    #[test]
    fn test_record_creation() {
        let record = record("127.0.0.1", 8080);
        assert_eq!(record.address(), "127.0.0.1");
        assert_eq!(record.port(), 8080);
        assert!(record.protocols().contains(ProtocolTag::Http));
        assert_eq!(record.endpoint(), "127.0.0.1:8080");
    }

    #[test]
    fn test_record_rejects_zero_port_and_blank_address() {
        assert!(ProxyRecord::new("127.0.0.1", 0, ProtocolSet::default()).is_none());
        assert!(ProxyRecord::new("   ", 8080, ProtocolSet::default()).is_none());
    }

    #[test]
    fn test_protocol_set_never_empty() {
        let set = ProtocolSet::from_tags(Vec::new());
        assert_eq!(set.to_vec(), vec![ProtocolTag::Http]);

        let set: ProtocolSet = serde_json::from_str("[]").unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_protocol_set_is_ordered() {
        let set = ProtocolSet::from_tags([
            ProtocolTag::Socks5,
            ProtocolTag::Http,
            ProtocolTag::Https,
            ProtocolTag::Http,
        ]);
        assert_eq!(
            set.to_vec(),
            vec![ProtocolTag::Http, ProtocolTag::Https, ProtocolTag::Socks5]
        );
        assert_eq!(set.to_string(), "HTTP,HTTPS,SOCKS5");
    }

    #[test]
    fn test_record_json_shape() {
        let record = ProxyRecord::new(
            "10.0.0.1",
            1080,
            ProtocolSet::from_tags([ProtocolTag::Socks4, ProtocolTag::Socks5]),
        )
        .unwrap();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"ip": "10.0.0.1", "port": 1080, "protocols": ["SOCKS4", "SOCKS5"]})
        );
    }

    #[test]
    fn test_batch_payload() {
        let batch = Batch::new(0, vec![record("1.1.1.1", 80), record("2.2.2.2", 3128)]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.payload(), "1.1.1.1:80\n2.2.2.2:3128");
    }

    #[test]
    fn test_acknowledgement_ids() {
        assert!(AcknowledgementId::extracted("", "json").is_none());

        let id = AcknowledgementId::extracted("abc-123", "json").unwrap();
        assert_eq!(id.as_str(), "abc-123");
        assert!(!id.is_synthetic());

        let id = AcknowledgementId::synthetic(1_700_000_000, 2);
        assert_eq!(id.as_str(), "upload_1700000000_2");
        assert!(id.is_synthetic());
    }
}
