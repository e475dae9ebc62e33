use super::matcher::{CandidateSource, SourceKind};
use crate::types::EntityIdentity;
use std::collections::HashMap;

/// Name fragments that mark a listing row as a bond or preferred instrument.
const BOND_INDICATORS: &[&str] = &[
    "notes due",
    "bond",
    "% notes",
    "% note",
    "due ",
    " maturing",
    " maturity",
    " preferred",
    " series ",
    " class ",
];

/// Storage keys up to this many characters may be taken as bare tickers.
const MAX_BARE_TICKER_LEN: usize = 5;

/// True when a listing row looks like a bond rather than common stock.
/// Debt tickers carry a hyphen ("F-B", "F-C").
pub fn is_bond(ticker: &str, name: &str) -> bool {
    if ticker.contains('-') {
        return true;
    }
    let name = name.to_lowercase();
    BOND_INDICATORS.iter().any(|ind| name.contains(ind))
}

/// Bulk candidate source from an exchange listing, stocks only.
pub fn listing_source<I, K, V>(tag: &str, rows: I) -> CandidateSource
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut skipped = 0usize;
    let entries: Vec<(String, String)> = rows
        .into_iter()
        .filter_map(|(t, n)| {
            let ticker = t.as_ref().trim().to_uppercase();
            let name = n.as_ref().trim();
            if ticker.is_empty() || name.is_empty() || is_bond(&ticker, name) {
                skipped += 1;
                return None;
            }
            Some((ticker, name.to_string()))
        })
        .collect();

    tracing::debug!(tag, kept = entries.len(), skipped, "listing source loaded");
    CandidateSource::new(tag, SourceKind::Bulk, entries)
}

/// Ticker -> display name lookup used to canonicalise snapshot keys.
#[derive(Debug, Clone, Default)]
pub struct EntityDirectory {
    names: HashMap<String, String>,
    by_name: HashMap<String, String>,
}

impl EntityDirectory {
    /// Same precedence as the resolver: first bulk entry holds a ticker,
    /// override sources replace it.
    pub fn from_sources(sources: &[CandidateSource]) -> Self {
        let mut order: Vec<String> = Vec::new();
        let mut names: HashMap<String, String> = HashMap::new();

        for source in sources {
            for (raw_id, raw_name) in &source.entries {
                let ticker = raw_id.trim().to_uppercase();
                let name = raw_name.trim();
                if ticker.is_empty() || name.is_empty() {
                    continue;
                }
                match names.get_mut(&ticker) {
                    Some(existing) => {
                        if source.kind == SourceKind::Override {
                            *existing = name.to_string();
                        }
                    }
                    None => {
                        order.push(ticker.clone());
                        names.insert(ticker, name.to_string());
                    }
                }
            }
        }

        let mut by_name: HashMap<String, String> = HashMap::new();
        for ticker in &order {
            if let Some(name) = names.get(ticker) {
                by_name.entry(name.to_lowercase()).or_insert_with(|| ticker.clone());
            }
        }

        Self { names, by_name }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn display_name(&self, ticker: &str) -> Option<&str> {
        self.names.get(&ticker.to_uppercase()).map(String::as_str)
    }

    pub fn identity(&self, ticker: &str) -> EntityIdentity {
        let canonical_ticker = ticker.trim().to_uppercase();
        let display_name = self
            .names
            .get(&canonical_ticker)
            .cloned()
            .unwrap_or_else(|| canonical_ticker.clone());
        EntityIdentity {
            canonical_ticker,
            display_name,
        }
    }

    /// Resolve a snapshot storage key (ticker in any case, or a company
    /// display name) to its canonical ticker.
    pub fn canonical_ticker(&self, storage_key: &str) -> Option<String> {
        let key = storage_key.trim();
        let upper = key.to_uppercase();
        if self.names.contains_key(&upper) {
            return Some(upper);
        }

        if let Some(ticker) = self.by_name.get(&key.to_lowercase()) {
            return Some(ticker.clone());
        }

        let compact: String = key.chars().filter(|c| *c != ' ').collect();
        if key.chars().count() <= MAX_BARE_TICKER_LEN
            && !compact.is_empty()
            && compact.chars().all(char::is_alphabetic)
        {
            return Some(upper);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bond_detection() {
        assert!(is_bond("F-B", "Ford Motor Co 6.2% Notes"));
        assert!(is_bond("XYZ", "XYZ Corp 5.5% Notes Due 2030"));
        assert!(is_bond("BAC", "Bank of America Corp Preferred Stock"));
        assert!(!is_bond("F", "Ford Motor Company"));
        assert!(!is_bond("AAPL", "Apple Inc"));
    }

    #[test]
    fn test_listing_source_filters_bonds_and_blanks() {
        let src = listing_source(
            "database",
            [
                ("aapl", "Apple Inc"),
                ("F-B", "Ford Motor Co Notes"),
                ("", "Nameless"),
                ("MSFT", "  "),
            ],
        );
        assert_eq!(src.entries, vec![("AAPL".to_string(), "Apple Inc".to_string())]);
        assert_eq!(src.kind, SourceKind::Bulk);
    }

    #[test]
    fn test_canonical_ticker_rules() {
        let dir = EntityDirectory::from_sources(&[CandidateSource::bulk(
            "database",
            [("AAPL", "Apple Inc"), ("MSFT", "Microsoft Corporation")],
        )]);
        assert_eq!(dir.canonical_ticker("aapl").as_deref(), Some("AAPL"));
        assert_eq!(dir.canonical_ticker("microsoft corporation").as_deref(), Some("MSFT"));
        assert_eq!(dir.canonical_ticker("zzz").as_deref(), Some("ZZZ"));
        assert_eq!(dir.canonical_ticker("Some Long Private Co"), None);
        assert_eq!(dir.canonical_ticker("BRK1"), None);
    }

    #[test]
    fn test_override_name_wins() {
        let dir = EntityDirectory::from_sources(&[
            CandidateSource::bulk("database", [("META", "Facebook Inc")]),
            CandidateSource::overrides("definitions", [("META", "Meta Platforms")]),
        ]);
        assert_eq!(dir.display_name("meta"), Some("Meta Platforms"));
        assert_eq!(dir.identity("meta").display_name, "Meta Platforms");
        assert_eq!(dir.identity("nope").display_name, "NOPE");
    }
}
