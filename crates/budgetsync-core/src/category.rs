//! Approximate resolution of free-text category phrases to existing keys

use std::cmp::Ordering;

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::model::is_reserved_key;

/// How strongly a category key matches a phrase. Compared field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MatchScore {
    pub exact: bool,
    pub shared_tokens: usize,
    pub longest_token: usize,
    pub fuzzy: i64,
}

/// Resolves phrases like "food" or "electronics stuff" against category keys.
///
/// A key is a candidate when the phrase is contained in it, it is contained
/// in the phrase, or one of its whitespace/`&` separated tokens appears in
/// the phrase. Among candidates the highest [`MatchScore`] wins and equal
/// scores go to the lexically smallest key, so the result never depends on
/// iteration order.
pub struct CategoryResolver {
    matcher: SkimMatcherV2,
}

impl CategoryResolver {
    pub fn new() -> Self {
        Self {
            matcher: SkimMatcherV2::default().ignore_case(),
        }
    }

    pub fn resolve<'a, I>(&self, phrase: &str, keys: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let phrase = normalize(phrase);
        if phrase.is_empty() {
            return None;
        }

        let mut best: Option<(&'a str, MatchScore)> = None;
        for key in keys {
            if is_reserved_key(key) {
                continue;
            }
            let Some(score) = self.score(&phrase, key) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((best_key, best_score)) => match score.cmp(&best_score) {
                    Ordering::Greater => true,
                    Ordering::Equal => key < best_key,
                    Ordering::Less => false,
                },
            };
            if better {
                best = Some((key, score));
            }
        }

        if let Some((key, score)) = best {
            tracing::debug!("Resolved category phrase {:?} to {:?} ({:?})", phrase, key, score);
        }
        best.map(|(key, _)| key)
    }

    /// Score `key` against an already normalized phrase; `None` if it does not match.
    pub fn score(&self, phrase: &str, key: &str) -> Option<MatchScore> {
        let key_lower = normalize(key);
        let tokens = key_tokens(&key_lower);
        let shared: Vec<&str> = tokens
            .iter()
            .copied()
            .filter(|token| phrase.contains(token))
            .collect();

        let contained = key_lower.contains(phrase) || phrase.contains(key_lower.as_str());
        if !contained && shared.is_empty() {
            return None;
        }

        Some(MatchScore {
            exact: key_lower == phrase,
            shared_tokens: shared.len(),
            longest_token: shared.iter().map(|token| token.len()).max().unwrap_or(0),
            fuzzy: self.matcher.fuzzy_match(&key_lower, phrase).unwrap_or(0),
        })
    }
}

impl Default for CategoryResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Split a lowercased key on whitespace and `&`, dropping filler words.
fn key_tokens(key: &str) -> Vec<&str> {
    key.split(|c: char| c.is_whitespace() || c == '&')
        .filter(|token| !token.is_empty() && *token != "and")
        .collect()
}
