use smallvec::SmallVec;

/// Corporate-entity suffixes dropped from keyword lists.
/// Compared after stripping trailing '.' and ','.
const CORPORATE_SUFFIXES: &[&str] = &[
    "inc", "corp", "corporation", "ltd", "limited", "llc", "plc", "sa", "ag", "nv", "bv",
    "gmbh", "se", "co", "company", "companies", "holdings", "holding", "group",
    "enterprises", "industries",
];

/// Normalized strings longer than this get short-token suppression.
const SHORT_QUERY_LEN: usize = 3;

/// Tokens at or below this length are dropped from longer queries.
const STOP_TOKEN_LEN: usize = 2;

pub type Tokens = SmallVec<[String; 4]>;

/// Lowercase, trim, collapse internal whitespace.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whitespace tokens of the normalized text, first-occurrence order, no duplicates.
///
/// Very short inputs (ticker-like strings such as "ge" or "f") keep every token;
/// anything longer drops tokens of one or two characters.
pub fn tokenize(text: &str) -> Tokens {
    let normalized = normalize(text);
    let suppress_short = normalized.chars().count() > SHORT_QUERY_LEN;

    let mut tokens = Tokens::new();
    for word in normalized.split(' ') {
        if word.is_empty() {
            continue;
        }
        if suppress_short && word.chars().count() <= STOP_TOKEN_LEN {
            continue;
        }
        if !tokens.iter().any(|t| t == word) {
            tokens.push(word.to_string());
        }
    }
    tokens
}

/// Name words with corporate suffixes removed, order preserved.
/// Used only for keyword comparisons, never for word-boundary checks.
pub fn extract_keywords(name: &str) -> Vec<String> {
    normalize(name)
        .split(' ')
        .filter(|w| !w.is_empty())
        .filter(|w| !is_corporate_suffix(w))
        .map(str::to_string)
        .collect()
}

#[inline]
fn is_corporate_suffix(word: &str) -> bool {
    let stripped = word.trim_end_matches(['.', ',']);
    CORPORATE_SUFFIXES.contains(&stripped)
}
