use super::normalizer::{extract_keywords, normalize, tokenize, Tokens};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

/// Score for an exact normalized match. Terminal.
const EXACT_MATCH: i32 = 1000;
/// One normalized string is a prefix of the other.
const PREFIX_MATCH: i32 = 500;
/// Every query token occurs as a whole word in the name.
const ALL_WORDS_BASE: i32 = 400;
const ALL_WORDS_PER_TOKEN: i32 = 50;
/// Some query tokens occur as whole words in the name.
const SOME_WORDS_BASE: i32 = 200;
const SOME_WORDS_PER_TOKEN: i32 = 30;
/// First query token equals the first name keyword.
const FIRST_KEYWORD_MATCH: i32 = 300;
/// Query tokens are a subset of the name keywords.
const KEYWORD_SUBSET: i32 = 100;
/// Plain substring containment in either direction.
const LOOSE_SUBSTRING: i32 = 50;
/// Query sits inside the name but only inside a longer word ("ford" in "ashford").
const EMBEDDED_PENALTY: i32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Bulk-sourced listing (exchange dumps, vendor tables).
    Bulk,
    /// Curated definitions. Win identifier collisions and get a small ranking bonus.
    Override,
}

/// One ordered identifier -> name table.
#[derive(Debug, Clone)]
pub struct CandidateSource {
    pub tag: String,
    pub kind: SourceKind,
    pub entries: Vec<(String, String)>,
}

impl CandidateSource {
    pub fn new<I, K, V>(tag: impl Into<String>, kind: SourceKind, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            tag: tag.into(),
            kind,
            entries: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn bulk<I, K, V>(tag: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(tag, SourceKind::Bulk, entries)
    }

    pub fn overrides<I, K, V>(tag: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(tag, SourceKind::Override, entries)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameMatch {
    pub identifier: String,
    pub name: String,
    pub source_tag: String,
    pub score: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolverConfig {
    /// Added to candidates from override sources that already scored above zero.
    pub override_bonus: i32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { override_bonus: 10 }
    }
}

/// Pre-normalized candidate. Built once per resolver.
#[derive(Debug, Clone)]
struct Candidate {
    identifier: String,
    name: String,
    normalized: String,
    keywords: Vec<String>,
    source_tag: String,
    kind: SourceKind,
}

/// Free-text -> canonical entity resolver.
///
/// Sources are merged at construction into one immutable table keyed by the
/// uppercased identifier. The first bulk occurrence of an identifier holds its
/// slot until an override source supplies the same identifier; the last
/// override seen wins. Because the table holds one candidate per identifier,
/// results never contain duplicate identifiers.
#[derive(Debug, Clone)]
pub struct NameResolver {
    config: ResolverConfig,
    candidates: Vec<Candidate>,
}

impl NameResolver {
    pub fn new(config: ResolverConfig, sources: &[CandidateSource]) -> Self {
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut dropped = 0usize;

        for source in sources {
            for (raw_id, raw_name) in &source.entries {
                let identifier = raw_id.trim().to_uppercase();
                let name = raw_name.trim();
                let normalized = normalize(name);
                if identifier.is_empty() || normalized.is_empty() {
                    dropped += 1;
                    continue;
                }

                let candidate = Candidate {
                    identifier: identifier.clone(),
                    name: name.to_string(),
                    keywords: extract_keywords(name),
                    normalized,
                    source_tag: source.tag.clone(),
                    kind: source.kind,
                };

                match slots.get(&identifier) {
                    Some(&idx) => {
                        if source.kind == SourceKind::Override {
                            candidates[idx] = candidate;
                        }
                    }
                    None => {
                        slots.insert(identifier, candidates.len());
                        candidates.push(candidate);
                    }
                }
            }
        }

        tracing::debug!(
            sources = sources.len(),
            candidates = candidates.len(),
            dropped,
            "name resolver built"
        );

        Self { config, candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Ranked matches for `query`, best first, at most `max_results`.
    ///
    /// Ties keep table order, so earlier sources (and earlier entries within a
    /// source) come first. Never fails: empty or unmatchable input yields an
    /// empty list.
    pub fn search(&self, query: &str, max_results: usize) -> Vec<NameMatch> {
        let Some(matcher) = QueryMatcher::new(query) else {
            return Vec::new();
        };

        let mut results: Vec<NameMatch> = self
            .candidates
            .iter()
            .filter_map(|c| {
                let base = matcher.score(&c.normalized, &c.keywords);
                if base <= 0 {
                    return None;
                }
                let bonus = match c.kind {
                    SourceKind::Override => self.config.override_bonus,
                    SourceKind::Bulk => 0,
                };
                Some(NameMatch {
                    identifier: c.identifier.clone(),
                    name: c.name.clone(),
                    source_tag: c.source_tag.clone(),
                    score: base + bonus,
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.cmp(&a.score));
        results.truncate(max_results);

        tracing::trace!(query, matches = results.len(), "name search");
        results
    }

    /// Best single match, if any.
    pub fn resolve(&self, query: &str) -> Option<NameMatch> {
        self.search(query, 1).into_iter().next()
    }
}

/// One-shot search with the default configuration.
pub fn search(query: &str, sources: &[CandidateSource], max_results: usize) -> Vec<NameMatch> {
    if sources.is_empty() {
        return Vec::new();
    }
    NameResolver::new(ResolverConfig::default(), sources).search(query, max_results)
}

/// Query compiled once, scored against many candidates.
struct QueryMatcher {
    normalized: String,
    tokens: Tokens,
    token_patterns: Vec<Option<Regex>>,
    whole_pattern: Option<Regex>,
}

impl QueryMatcher {
    fn new(query: &str) -> Option<Self> {
        let normalized = normalize(query);
        if normalized.is_empty() {
            return None;
        }
        let tokens = tokenize(&normalized);
        let token_patterns = tokens.iter().map(|t| word_pattern(t)).collect();
        let whole_pattern = word_pattern(&normalized);
        Some(Self {
            normalized,
            tokens,
            token_patterns,
            whole_pattern,
        })
    }

    fn score(&self, name: &str, keywords: &[String]) -> i32 {
        let query = self.normalized.as_str();
        if query == name {
            return EXACT_MATCH;
        }

        let mut score = 0;

        if name.starts_with(query) || query.starts_with(name) {
            score += PREFIX_MATCH;
        }

        let word_hits = self
            .token_patterns
            .iter()
            .filter(|p| p.as_ref().is_some_and(|re| re.is_match(name)))
            .count() as i32;
        if !self.tokens.is_empty() && word_hits == self.tokens.len() as i32 {
            score += ALL_WORDS_BASE + word_hits * ALL_WORDS_PER_TOKEN;
        } else if word_hits > 0 {
            score += SOME_WORDS_BASE + word_hits * SOME_WORDS_PER_TOKEN;
        }

        if let (Some(first), Some(first_kw)) = (self.tokens.first(), keywords.first()) {
            if first == first_kw {
                score += FIRST_KEYWORD_MATCH;
            }
        }

        if !self.tokens.is_empty() && self.tokens.iter().all(|t| keywords.contains(t)) {
            score += KEYWORD_SUBSET;
        }

        let embedded = name.contains(query);
        if embedded || query.contains(name) {
            score += LOOSE_SUBSTRING;
        }

        if embedded && !self.whole_pattern.as_ref().is_some_and(|re| re.is_match(name)) {
            score -= EMBEDDED_PENALTY;
        }

        score
    }
}

fn word_pattern(text: &str) -> Option<Regex> {
    Regex::new(&format!(r"\b{}\b", regex::escape(text))).ok()
}
