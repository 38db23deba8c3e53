//! Name-to-email matching
//!
//! Scores a balance-file name against candidate (name, email) pairs taken
//! from the email file or the user directory. Scores are deterministic and
//! land in `[0, 1]`; the merged row carries the best score as its confidence.

use rust_decimal::Decimal;

use crate::domain::MergedRow;

/// Best score below this leaves the row unmatched
pub const MIN_MATCH_SCORE: f64 = 0.5;

const EXACT: f64 = 1.0;
const REORDERED: f64 = 0.95;
const SUBSET: f64 = 0.85;
const INITIAL_AND_LAST: f64 = 0.8;
const EDIT_DISTANCE_WEIGHT: f64 = 0.85;

/// Someone a balance row could belong to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub email: String,
}

impl Candidate {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Tokens compared against balance names. Falls back to the email local
    /// part ("jane.doe@corp.com" -> jane, doe) when the name is blank.
    fn tokens(&self) -> Vec<String> {
        let from_name = tokenize(&self.name);
        if !from_name.is_empty() {
            return from_name;
        }
        let local = self.email.split('@').next().unwrap_or_default();
        tokenize(local)
    }
}

/// Winning candidate and its score
#[derive(Debug, Clone, PartialEq)]
pub struct NameMatch<'a> {
    pub candidate: &'a Candidate,
    pub score: f64,
}

/// Matches names against a fixed candidate list
pub struct NameMatcher {
    candidates: Vec<(Candidate, Vec<String>)>,
    min_score: f64,
}

impl NameMatcher {
    /// Candidates without an email are dropped; nothing could be assigned from them
    pub fn new(candidates: Vec<Candidate>) -> Self {
        let candidates = candidates
            .into_iter()
            .filter(|c| !c.email.trim().is_empty())
            .map(|c| {
                let tokens = c.tokens();
                (c, tokens)
            })
            .collect();
        Self {
            candidates,
            min_score: MIN_MATCH_SCORE,
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Highest scoring candidate at or above the minimum; earlier candidates win ties
    pub fn find_best_match(&self, name: &str) -> Option<NameMatch<'_>> {
        let tokens = tokenize(name);
        if tokens.is_empty() {
            return None;
        }

        let mut best: Option<NameMatch<'_>> = None;
        for (candidate, candidate_tokens) in &self.candidates {
            let score = score_tokens(&tokens, candidate_tokens);
            if score < self.min_score {
                continue;
            }
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(NameMatch { candidate, score });
            }
        }
        best
    }

    /// Merged row for one balance-file row
    pub fn merge(&self, name: &str, amount: Decimal, market: Option<String>) -> MergedRow {
        match self.find_best_match(name) {
            Some(m) => MergedRow::matched(
                name,
                m.candidate.email.trim().to_lowercase(),
                amount,
                market,
                round_score(m.score),
            ),
            None => MergedRow::unmatched(name, amount, market),
        }
    }
}

/// Similarity of two names in `[0, 1]`
pub fn score_names(a: &str, b: &str) -> f64 {
    score_tokens(&tokenize(a), &tokenize(b))
}

/// Lowercased alphanumeric runs
pub fn tokenize(name: &str) -> Vec<String> {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

fn score_tokens(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return EXACT;
    }

    let mut sorted_a = a.to_vec();
    let mut sorted_b = b.to_vec();
    sorted_a.sort();
    sorted_b.sort();
    if sorted_a == sorted_b {
        return REORDERED;
    }

    // Middle names: "Jane Q Doe" vs "Jane Doe"
    let a_in_b = a.iter().all(|t| b.contains(t));
    let b_in_a = b.iter().all(|t| a.contains(t));
    if a_in_b || b_in_a {
        return SUBSET;
    }

    if initial_and_last_match(a, b) {
        return INITIAL_AND_LAST;
    }

    let joined_a = sorted_a.join(" ");
    let joined_b = sorted_b.join(" ");
    normalized_similarity(&joined_a, &joined_b) * EDIT_DISTANCE_WEIGHT
}

/// "J. Doe" vs "Jane Doe": same last token, one first token is the other's initial
fn initial_and_last_match(a: &[String], b: &[String]) -> bool {
    if a.len() < 2 || b.len() < 2 || a.last() != b.last() {
        return false;
    }
    let (first_a, first_b) = (&a[0], &b[0]);
    let is_initial_of = |short: &str, long: &str| {
        short.chars().count() == 1 && long.starts_with(short)
    };
    is_initial_of(first_a, first_b) || is_initial_of(first_b, first_a)
}

/// 1 - levenshtein / longer length
fn normalized_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = if ca == *cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

fn round_score(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}
