//! `PREFIX-YEAR-COUNTER` document identifiers

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::types::{HeraclionError, HeraclionResult};

/// Minimum number of digits of the counter segment
pub const DEFAULT_COUNTER_WIDTH: usize = 3;
/// Years accepted on either side of the current year
pub const DEFAULT_YEAR_WINDOW: i32 = 5;

/// Document families and the prefix their numbers carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Facture,
    Devis,
    Avoir,
    BonLivraison,
    BonCommande,
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Facture => "FAC",
            DocumentKind::Devis => "DEV",
            DocumentKind::Avoir => "AV",
            DocumentKind::BonLivraison => "BL",
            DocumentKind::BonCommande => "BC",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "FAC" => Some(DocumentKind::Facture),
            "DEV" => Some(DocumentKind::Devis),
            "AV" => Some(DocumentKind::Avoir),
            "BL" => Some(DocumentKind::BonLivraison),
            "BC" => Some(DocumentKind::BonCommande),
            _ => None,
        }
    }
}

/// Rules applied when generating numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberingPolicy {
    /// Accepted distance, in years, from the reference year
    pub year_window: i32,
    /// Minimum width of the counter segment
    pub counter_width: usize,
    /// Year used instead of the clock; tests pin it
    pub reference_year: Option<i32>,
}

impl Default for NumberingPolicy {
    fn default() -> Self {
        Self {
            year_window: DEFAULT_YEAR_WINDOW,
            counter_width: DEFAULT_COUNTER_WIDTH,
            reference_year: None,
        }
    }
}

impl NumberingPolicy {
    /// Policy pinned to a fixed reference year
    pub fn pinned(reference_year: i32) -> Self {
        Self {
            reference_year: Some(reference_year),
            ..Self::default()
        }
    }

    pub fn current_year(&self) -> i32 {
        self.reference_year
            .unwrap_or_else(|| chrono::Local::now().year())
    }

    /// Four-digit year within `year_window` of the reference year
    pub fn is_valid_year(&self, year: i32) -> bool {
        if !(1000..=9999).contains(&year) {
            return false;
        }
        let window = u32::try_from(self.year_window).unwrap_or(0);
        year.abs_diff(self.current_year()) <= window
    }

    /// Check that `(prefix, year)` names a scope numbers can be issued in
    pub fn validate_scope(&self, prefix: &str, year: i32) -> HeraclionResult<()> {
        validate_prefix(prefix).map_err(HeraclionError::InvalidArgument)?;

        if !self.is_valid_year(year) {
            return Err(HeraclionError::InvalidArgument(format!(
                "year {} is outside {} ± {}",
                year,
                self.current_year(),
                self.year_window
            )));
        }

        Ok(())
    }

    /// Render `prefix-year-counter` after checking every part
    pub fn generate(&self, prefix: &str, year: i32, counter: i64) -> HeraclionResult<String> {
        self.validate_scope(prefix, year)?;
        let counter = format_counter(counter, self.counter_width)?;
        Ok(format!("{}-{}-{}", prefix, year, counter))
    }
}

fn default_width() -> usize {
    DEFAULT_COUNTER_WIDTH
}

/// A parsed or allocated document number.
///
/// Identity is `(prefix, year, counter)`; `width` only drives rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentNumber {
    pub prefix: String,
    pub year: i32,
    pub counter: u64,
    /// Minimum digits of the rendered counter
    #[serde(default = "default_width")]
    pub width: usize,
}

impl DocumentNumber {
    pub fn new(prefix: impl Into<String>, year: i32, counter: u64) -> Self {
        Self {
            prefix: prefix.into(),
            year,
            counter,
            width: DEFAULT_COUNTER_WIDTH,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn kind(&self) -> Option<DocumentKind> {
        DocumentKind::from_prefix(&self.prefix)
    }
}

impl PartialEq for DocumentNumber {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix && self.year == other.year && self.counter == other.counter
    }
}

impl Eq for DocumentNumber {}

impl Hash for DocumentNumber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.prefix.hash(state);
        self.year.hash(state);
        self.counter.hash(state);
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{:0width$}",
            self.prefix,
            self.year,
            self.counter,
            width = self.width
        )
    }
}

impl FromStr for DocumentNumber {
    type Err = HeraclionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

fn validate_prefix(prefix: &str) -> Result<(), String> {
    if prefix.is_empty() {
        return Err("document prefix cannot be empty".to_string());
    }
    if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(format!(
            "document prefix '{}' must only contain letters and digits",
            prefix
        ));
    }
    Ok(())
}

/// Zero-pad `n` to at least `width` digits, never truncating
pub fn format_counter(n: i64, width: usize) -> HeraclionResult<String> {
    if n < 0 {
        return Err(HeraclionError::InvalidArgument(format!(
            "counter cannot be negative: {}",
            n
        )));
    }
    Ok(format!("{:0width$}", n, width = width))
}

/// Counter following `last`; a scope without documents passes 0
pub fn next_counter(last: u64) -> HeraclionResult<u64> {
    last.checked_add(1).ok_or_else(|| {
        HeraclionError::InvalidArgument(format!("counter {} cannot be incremented", last))
    })
}

/// Year check against the clock with the default window
pub fn is_valid_year(year: i32) -> bool {
    NumberingPolicy::default().is_valid_year(year)
}

/// Year check for untyped input; numeric strings are rejected
pub fn is_valid_year_value(value: &serde_json::Value) -> bool {
    value
        .as_i64()
        .and_then(|year| i32::try_from(year).ok())
        .is_some_and(is_valid_year)
}

/// Generate a number with the default policy
pub fn generate(prefix: &str, year: i32, counter: i64) -> HeraclionResult<String> {
    NumberingPolicy::default().generate(prefix, year, counter)
}

/// Parse `<alnum prefix>-<4-digit year>-<digits>`
///
/// Segments are taken from the right so a hyphen left in the prefix ends up
/// in the prefix part, where it is rejected.
pub fn parse(text: &str) -> HeraclionResult<DocumentNumber> {
    let invalid = |reason: &str| {
        HeraclionError::Parse(format!("'{}' is not a document number: {}", text, reason))
    };

    let mut segments = text.rsplitn(3, '-');
    let counter_part = segments.next().unwrap_or_default();
    let year_part = segments.next().ok_or_else(|| invalid("missing year"))?;
    let prefix = segments.next().ok_or_else(|| invalid("missing prefix"))?;

    validate_prefix(prefix).map_err(|reason| invalid(reason.as_str()))?;

    if year_part.len() != 4 || !year_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("year must have four digits"));
    }
    let year: i32 = year_part.parse().map_err(|_| invalid("bad year"))?;

    if counter_part.is_empty() || !counter_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("counter must be digits"));
    }
    let counter: u64 = counter_part
        .parse()
        .map_err(|_| invalid("counter is too large"))?;

    Ok(DocumentNumber {
        prefix: prefix.to_string(),
        year,
        counter,
        width: counter_part.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> NumberingPolicy {
        NumberingPolicy::pinned(2024)
    }

    #[test]
    fn test_format_counter_pads_without_truncating() {
        assert_eq!(format_counter(1, 3).unwrap(), "001");
        assert_eq!(format_counter(42, 3).unwrap(), "042");
        assert_eq!(format_counter(1000, 3).unwrap(), "1000");
        assert_eq!(format_counter(0, 3).unwrap(), "000");
        assert_eq!(format_counter(7, 5).unwrap(), "00007");
        assert!(format_counter(-1, 3).is_err());
    }

    #[test]
    fn test_next_counter() {
        assert_eq!(next_counter(0).unwrap(), 1);
        assert_eq!(next_counter(42).unwrap(), 43);
        assert!(next_counter(u64::MAX).is_err());
    }

    #[test]
    fn test_generate() {
        let p = policy();
        assert_eq!(p.generate("FAC", 2024, 1).unwrap(), "FAC-2024-001");
        assert_eq!(p.generate("DEV", 2023, 1000).unwrap(), "DEV-2023-1000");

        let err = p.generate("", 2024, 1).unwrap_err();
        assert!(matches!(err, HeraclionError::InvalidArgument(_)));
        let err = p.generate("FAC", 1900, 1).unwrap_err();
        assert!(matches!(err, HeraclionError::InvalidArgument(_)));
        let err = p.generate("FAC", 2100, 1).unwrap_err();
        assert!(matches!(err, HeraclionError::InvalidArgument(_)));
        let err = p.generate("FAC", 2024, -3).unwrap_err();
        assert!(matches!(err, HeraclionError::InvalidArgument(_)));
        assert!(p.generate("FA-C", 2024, 1).is_err());
    }

    #[test]
    fn test_year_window() {
        let p = policy();
        assert!(p.is_valid_year(2024));
        assert!(p.is_valid_year(2019));
        assert!(p.is_valid_year(2029));
        assert!(!p.is_valid_year(2018));
        assert!(!p.is_valid_year(2030));
    }

    #[test]
    fn test_extreme_years_are_rejected_without_overflow() {
        let p = policy();
        for year in [i32::MIN, i32::MIN + 1, -1, 0, 999, 10_000, i32::MAX] {
            assert!(!p.is_valid_year(year), "{}", year);
            assert!(!is_valid_year(year), "{}", year);
        }
        let err = generate("FAC", i32::MIN, 1).unwrap_err();
        assert!(matches!(err, HeraclionError::InvalidArgument(_)));
        let err = p.generate("FAC", i32::MAX, 1).unwrap_err();
        assert!(matches!(err, HeraclionError::InvalidArgument(_)));
        assert!(!is_valid_year_value(&serde_json::json!(i32::MIN)));
        assert!(!is_valid_year_value(&serde_json::json!(i32::MAX)));
        assert!(!is_valid_year_value(&serde_json::json!(i64::MIN)));

        let negative_window = NumberingPolicy {
            year_window: -1,
            ..policy()
        };
        assert!(negative_window.is_valid_year(2024));
        assert!(!negative_window.is_valid_year(2025));
    }

    #[test]
    fn test_year_value_rejects_strings() {
        let this_year = chrono::Local::now().year();
        assert!(is_valid_year_value(&serde_json::json!(this_year)));
        assert!(!is_valid_year_value(&serde_json::json!(this_year.to_string())));
        assert!(!is_valid_year_value(&serde_json::json!(1900)));
        assert!(!is_valid_year_value(&serde_json::json!(null)));
    }

    #[test]
    fn test_parse() {
        let number = parse("FAC-2024-007").unwrap();
        assert_eq!(number, DocumentNumber::new("FAC", 2024, 7));
        assert_eq!(number.kind(), Some(DocumentKind::Facture));

        let number: DocumentNumber = "BL2-2023-12345".parse().unwrap();
        assert_eq!(number.prefix, "BL2");
        assert_eq!(number.counter, 12345);

        for bad in [
            "",
            "FAC",
            "FAC-2024",
            "-2024-001",
            "FAC-24-001",
            "FAC-2024-",
            "FAC-2024-0x1",
            "FAC-2024-+1",
            "F-A-C-2024-001",
            "FAC 2024 001",
        ] {
            let err = parse(bad).unwrap_err();
            assert!(matches!(err, HeraclionError::Parse(_)), "{}", bad);
        }
    }

    #[test]
    fn test_display_is_canonical() {
        let text = "AV-2024-042";
        assert_eq!(parse(text).unwrap().to_string(), text);
        assert_eq!(DocumentNumber::new("FAC", 2024, 1000).to_string(), "FAC-2024-1000");
    }

    #[test]
    fn test_display_follows_width() {
        let number = DocumentNumber::new("FAC", 2024, 1).with_width(5);
        assert_eq!(number.to_string(), "FAC-2024-00001");
        assert_eq!(number, DocumentNumber::new("FAC", 2024, 1));

        let parsed = parse("FAC-2024-00001").unwrap();
        assert_eq!(parsed.width, 5);
        assert_eq!(parsed.to_string(), "FAC-2024-00001");
    }
}
