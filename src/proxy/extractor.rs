//! Record extraction from the proxy listing table
//!
//! This module provides functionality for:
//! - Locating the proxy table rows in a listing page
//! - Turning one raw row into a validated `ProxyRecord`
//! - Dropping malformed rows without interrupting the rest of the page

use crate::error::{HarvestError, RowRejection};
use crate::proxy::classifier::classify_protocols;
use crate::proxy::models::ProxyRecord;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

/// Row selectors tried in order; the first one yielding rows wins
const ROW_SELECTORS: [&str; 2] = ["table tbody tr", "table tr:not(:first-child)"];

static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td").expect("Invalid cell selector"));

static ANY_ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr").expect("Invalid row selector"));

/// Validation applied to the address column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressPolicy {
    /// Accept any non-blank address text
    #[default]
    Any,
    /// Require four dot-separated integers in 0..=255
    DottedQuad,
}

/// One table cell, as the text fragments it contains
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCell {
    fragments: Vec<String>,
}

impl RawCell {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
        }
    }

    /// A cell with no text at all
    pub fn empty() -> Self {
        Self::default()
    }

    fn from_element(element: ElementRef<'_>) -> Self {
        Self::new(element.text())
    }

    /// First fragment that is not blank, trimmed
    pub fn first_text(&self) -> Option<&str> {
        self.fragments
            .iter()
            .map(|fragment| fragment.trim())
            .find(|fragment| !fragment.is_empty())
    }

    /// All fragments concatenated
    pub fn full_text(&self) -> String {
        self.fragments.concat()
    }
}

/// One table row, as an ordered list of cells
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<RawCell>,
}

impl RawRow {
    pub fn new(cells: Vec<RawCell>) -> Self {
        Self { cells }
    }

    fn from_element(row: ElementRef<'_>) -> Self {
        Self::new(row.select(&CELL_SELECTOR).map(RawCell::from_element).collect())
    }

    pub fn cells(&self) -> &[RawCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Records pulled out of one listing page
#[derive(Debug, Clone)]
pub struct PageExtraction {
    /// Number of table rows inspected (after the row limit)
    pub rows_seen: usize,
    /// Valid records, in page order
    pub records: Vec<ProxyRecord>,
}

/// Extractor turning listing table rows into proxy records
#[derive(Debug, Clone, Default)]
pub struct RecordExtractor {
    policy: AddressPolicy,
    max_rows: Option<usize>,
}

impl RecordExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: AddressPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Validate one row, reporting why it was rejected
    pub fn extract_row(&self, row: &RawRow) -> std::result::Result<ProxyRecord, RowRejection> {
        let cells = row.cells();
        if cells.len() < 2 {
            return Err(RowRejection::TooFewCells(cells.len()));
        }

        let address = cells[0].first_text().ok_or(RowRejection::MissingAddress)?;
        if self.policy == AddressPolicy::DottedQuad && !is_dotted_quad(address) {
            return Err(RowRejection::InvalidAddress(address.to_string()));
        }

        let port_text = cells[1].first_text().ok_or(RowRejection::MissingPort)?;
        let port = parse_port(port_text)
            .ok_or_else(|| RowRejection::InvalidPort(port_text.to_string()))?;

        let protocol_text = cells.get(2).map(RawCell::full_text);
        let protocols = classify_protocols(protocol_text.as_deref());

        ProxyRecord::new(address, port, protocols).ok_or(RowRejection::MissingAddress)
    }

    /// Extract a record from a row, logging and dropping malformed rows
    pub fn extract_record(&self, row: &RawRow, row_num: usize) -> Option<ProxyRecord> {
        match self.extract_row(row) {
            Ok(record) => {
                debug!(row = row_num, proxy = %record, "Parsed proxy row");
                Some(record)
            }
            Err(reason) => {
                debug!(row = row_num, %reason, "Skipping proxy row");
                None
            }
        }
    }

    /// Extract records from every row of a listing page.
    ///
    /// Fails with `TableNotFound` when no row matches any known table shape,
    /// and with `NoRecords` when rows exist but none of them is valid.
    pub fn extract_page(&self, html: &str) -> std::result::Result<PageExtraction, HarvestError> {
        let mut rows = locate_rows(html)?;
        if rows.is_empty() {
            return Err(HarvestError::TableNotFound);
        }
        if let Some(limit) = self.max_rows {
            rows.truncate(limit);
        }

        let records: Vec<ProxyRecord> = rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| self.extract_record(row, i + 1))
            .collect();

        info!(
            rows = rows.len(),
            records = records.len(),
            "Successfully parsed proxies"
        );

        if records.is_empty() {
            return Err(HarvestError::NoRecords { rows: rows.len() });
        }

        Ok(PageExtraction {
            rows_seen: rows.len(),
            records,
        })
    }
}

/// Locate the proxy table rows of a page.
///
/// Tries each entry of `ROW_SELECTORS` in turn, then falls back to any
/// `tr`. Only rows holding at least one `td` are kept, so header rows never
/// count against the row limit. An empty result means no table was found.
pub fn locate_rows(html: &str) -> std::result::Result<Vec<RawRow>, HarvestError> {
    let document = Html::parse_document(html);

    for pattern in ROW_SELECTORS {
        let selector = Selector::parse(pattern)
            .map_err(|_| HarvestError::InvalidSelector(pattern.to_string()))?;
        let rows: Vec<RawRow> = document
            .select(&selector)
            .filter(has_data_cells)
            .map(RawRow::from_element)
            .collect();
        if !rows.is_empty() {
            debug!(selector = pattern, rows = rows.len(), "Found table rows");
            return Ok(rows);
        }
    }

    let rows: Vec<RawRow> = document
        .select(&ANY_ROW_SELECTOR)
        .filter(has_data_cells)
        .map(RawRow::from_element)
        .collect();
    debug!(rows = rows.len(), "Found loose table rows");
    Ok(rows)
}

fn has_data_cells(row: &ElementRef<'_>) -> bool {
    row.select(&CELL_SELECTOR).next().is_some()
}

fn parse_port(text: &str) -> Option<u16> {
    let port: i64 = text.parse().ok()?;
    if (1..=65535).contains(&port) {
        u16::try_from(port).ok()
    } else {
        None
    }
}

fn is_dotted_quad(address: &str) -> bool {
    let parts: Vec<&str> = address.split('.').collect();
    parts.len() == 4 && parts.iter().all(|part| part.parse::<u8>().is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::ProtocolTag;

    fn row(cells: &[&str]) -> RawRow {
        RawRow::new(cells.iter().map(|c| RawCell::new([*c])).collect())
    }

    #[test]
    fn test_extract_simple_row() {
        let extractor = RecordExtractor::new();
        let record = extractor
            .extract_row(&row(&[" 192.168.1.1 ", "8080", "HTTPS"]))
            .unwrap();
        assert_eq!(record.address(), "192.168.1.1");
        assert_eq!(record.port(), 8080);
        assert_eq!(
            record.protocols().to_vec(),
            vec![ProtocolTag::Http, ProtocolTag::Https]
        );
    }

    #[test]
    fn test_missing_protocol_cell_defaults_to_http() {
        let record = RecordExtractor::new()
            .extract_row(&row(&["10.0.0.1", "3128"]))
            .unwrap();
        assert_eq!(record.protocols().to_vec(), vec![ProtocolTag::Http]);
    }

    #[test]
    fn test_too_few_cells() {
        let extractor = RecordExtractor::new();
        assert_eq!(
            extractor.extract_row(&RawRow::default()),
            Err(RowRejection::TooFewCells(0))
        );
        assert_eq!(
            extractor.extract_row(&row(&["10.0.0.1"])),
            Err(RowRejection::TooFewCells(1))
        );
    }

    #[test]
    fn test_absent_address_and_port() {
        let extractor = RecordExtractor::new();
        let no_address = RawRow::new(vec![RawCell::empty(), RawCell::new(["80"])]);
        assert_eq!(
            extractor.extract_row(&no_address),
            Err(RowRejection::MissingAddress)
        );
        let blank_port = row(&["10.0.0.1", "   "]);
        assert_eq!(extractor.extract_row(&blank_port), Err(RowRejection::MissingPort));
    }

    #[test]
    fn test_invalid_ports() {
        let extractor = RecordExtractor::new();
        for port in ["0", "65536", "-1", "abc", "80a", "99999999999999999999"] {
            assert!(
                extractor.extract_record(&row(&["10.0.0.1", port]), 1).is_none(),
                "port {:?} should be rejected",
                port
            );
        }
        assert!(extractor.extract_record(&row(&["10.0.0.1", "65535"]), 1).is_some());
        assert!(extractor.extract_record(&row(&["10.0.0.1", "1"]), 1).is_some());
    }

    #[test]
    fn test_dotted_quad_policy() {
        let lenient = RecordExtractor::new();
        let strict = RecordExtractor::new().with_policy(AddressPolicy::DottedQuad);

        let hostname = row(&["proxy.example.com", "8080"]);
        assert!(lenient.extract_row(&hostname).is_ok());
        assert_eq!(
            strict.extract_row(&hostname),
            Err(RowRejection::InvalidAddress("proxy.example.com".to_string()))
        );

        assert!(strict.extract_row(&row(&["256.1.1.1", "80"])).is_err());
        assert!(strict.extract_row(&row(&["1.2.3", "80"])).is_err());
        assert!(strict.extract_row(&row(&["255.0.10.1", "80"])).is_ok());
    }

    #[test]
    fn test_first_non_blank_fragment_is_used() {
        let cell = RawCell::new(["\n  ", " 10.1.1.1 ", "ignored"]);
        assert_eq!(cell.first_text(), Some("10.1.1.1"));
        assert_eq!(RawCell::new(["  "]).first_text(), None);
    }

    #[test]
    fn test_extract_page_tbody() {
        let html = r#"
<html><body>
<table>
  <thead><tr><th>IP</th><th>Port</th><th>Protocol</th></tr></thead>
  <tbody>
    <tr><td>192.168.1.1</td><td>8080</td><td><a>HTTP</a>, <a>HTTPS</a></td></tr>
    <tr><td>10.0.0.1</td><td>1080</td><td>SOCKS5</td></tr>
    <tr><td>10.0.0.2</td><td>not-a-port</td><td>HTTP</td></tr>
  </tbody>
</table>
</body></html>
"#;
        let page = RecordExtractor::new().extract_page(html).unwrap();
        assert_eq!(page.rows_seen, 3);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].endpoint(), "192.168.1.1:8080");
        assert!(page.records[0].protocols().contains(ProtocolTag::Https));
        assert_eq!(
            page.records[1].protocols().to_vec(),
            vec![ProtocolTag::Socks5]
        );
    }

    #[test]
    fn test_extract_page_row_limit() {
        let rows: String = (1..=10)
            .map(|i| format!("<tr><td>10.0.0.{}</td><td>80</td></tr>", i))
            .collect();
        let html = format!("<table><tbody>{}</tbody></table>", rows);
        let page = RecordExtractor::new()
            .with_max_rows(Some(4))
            .extract_page(&html)
            .unwrap();
        assert_eq!(page.rows_seen, 4);
        assert_eq!(page.records.len(), 4);
        assert_eq!(page.records[3].address(), "10.0.0.4");
    }

    #[test]
    fn test_header_row_does_not_count_against_row_limit() {
        let rows: String = (1..=150)
            .map(|i| format!("<tr><td>10.0.{}.{}</td><td>80</td></tr>", i / 250, i % 250))
            .collect();
        let html = format!(
            "<table><tr><th>IP</th><th>Port</th></tr>{}<tr><td>10.9.9.9</td><td>80</td></tr></table>",
            rows
        );
        let page = RecordExtractor::new()
            .with_max_rows(Some(150))
            .extract_page(&html)
            .unwrap();
        assert_eq!(page.rows_seen, 150);
        assert_eq!(page.records.len(), 150);
        assert_eq!(page.records[0].address(), "10.0.0.1");
        assert_eq!(page.records[149].address(), "10.0.0.150");
    }

    #[test]
    fn test_header_only_table_is_not_found() {
        let html = "<table><tr><th>IP</th><th>Port</th></tr></table>";
        let result = RecordExtractor::new().extract_page(html);
        assert!(matches!(result, Err(HarvestError::TableNotFound)));
    }

    #[test]
    fn test_extract_page_without_table() {
        let result = RecordExtractor::new().extract_page("<html><body><p>nothing</p></body></html>");
        assert!(matches!(result, Err(HarvestError::TableNotFound)));
    }

    #[test]
    fn test_extract_page_without_valid_rows() {
        let html = "<table><tbody><tr><td>only-one-cell</td></tr></tbody></table>";
        let result = RecordExtractor::new().extract_page(html);
        assert!(matches!(result, Err(HarvestError::NoRecords { rows: 1 })));
    }

    #[test]
    fn test_is_dotted_quad() {
        assert!(is_dotted_quad("0.0.0.0"));
        assert!(is_dotted_quad("255.255.255.255"));
        assert!(!is_dotted_quad("1.2.3.4.5"));
        assert!(!is_dotted_quad("1..3.4"));
    }
}
