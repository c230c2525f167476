use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

const POWER_WORDS: &[&str] = &[
    "discover",
    "proven",
    "secret",
    "unveil",
    "transform",
    "unlock",
    "master",
    "essential",
    "remarkable",
    "ultimate",
    "powerful",
    "inspiring",
    "timeless",
];

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "if", "then", "when", "of", "for", "on", "in", "to",
    "with",
];

// Bell curve over word count
const LENGTH_MU: f64 = 14.0;
const LENGTH_SIGMA: f64 = 6.0;

const PREFIX_WORDS: usize = 8;
const DUPLICATE_PENALTY: f64 = 0.7;

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z']+").unwrap());
static STRUCTURE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,:—–-]").unwrap());
static TITLE_CASE_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+\b.*\b[A-Z][a-z]+\b").unwrap());

/// Feature breakdown behind a quote's score, rounded for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteFeatures {
    pub num_words: usize,
    pub length_score: f64,
    pub power_score: f64,
    pub clarity_score: f64,
    pub struct_bonus: f64,
    pub cap_bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteScore {
    pub quote: String,
    pub score: f64,
    /// `None` when the quote has no word tokens
    pub details: Option<QuoteFeatures>,
}

impl QuoteScore {
    /// Feature breakdown as a JSON object, empty for token-less quotes
    pub fn details_json(&self) -> serde_json::Value {
        match &self.details {
            Some(features) => serde_json::json!({
                "num_words": features.num_words,
                "length_score": features.length_score,
                "power_score": features.power_score,
                "clarity_score": features.clarity_score,
                "struct_bonus": features.struct_bonus,
                "cap_bonus": features.cap_bonus,
            }),
            None => serde_json::json!({}),
        }
    }
}

fn word_list(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    WORD_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Score a single quote. Never fails: a quote without word tokens scores 0.0.
pub fn compute_quote_score(quote: &str) -> QuoteScore {
    let words = word_list(quote);
    let num_words = words.len();
    if num_words == 0 {
        return QuoteScore {
            quote: quote.to_string(),
            score: 0.0,
            details: None,
        };
    }
    let n = num_words as f64;

    let length_score = (-(n - LENGTH_MU).powi(2) / (2.0 * LENGTH_SIGMA.powi(2))).exp();

    let power_hits = words
        .iter()
        .filter(|w| POWER_WORDS.contains(&w.as_str()))
        .count();
    let power_score = (power_hits as f64 / 3.0).min(1.0);

    let stop_hits = words
        .iter()
        .filter(|w| STOPWORDS.contains(&w.as_str()))
        .count();
    let clarity_score = (1.0 - stop_hits as f64 / n).max(0.0);

    let struct_bonus = if STRUCTURE_RE.is_match(quote) { 0.2 } else { 0.0 };
    let cap_bonus = if TITLE_CASE_PAIR_RE.is_match(quote) { 0.2 } else { 0.0 };

    let score = 0.5 * length_score
        + 0.2 * power_score
        + 0.2 * clarity_score
        + 0.05 * struct_bonus
        + 0.05 * cap_bonus;

    QuoteScore {
        quote: quote.to_string(),
        score,
        details: Some(QuoteFeatures {
            num_words,
            length_score: round3(length_score),
            power_score: round3(power_score),
            clarity_score: round3(clarity_score),
            struct_bonus,
            cap_bonus,
        }),
    }
}

/// Score, de-duplicate and rank quotes, best first.
///
/// A quote whose first eight normalized words match an earlier quote in the
/// input has its score multiplied by 0.7. The sort is stable, so equal scores
/// keep their input order.
pub fn score_quotes<S: AsRef<str>>(quotes: &[S]) -> Vec<QuoteScore> {
    let mut scores: Vec<QuoteScore> = quotes
        .iter()
        .map(|q| compute_quote_score(q.as_ref()))
        .collect();

    let mut seen_starts: HashSet<String> = HashSet::new();
    for qs in &mut scores {
        let start = word_list(&qs.quote)
            .into_iter()
            .take(PREFIX_WORDS)
            .collect::<Vec<_>>()
            .join(" ");
        if seen_starts.contains(&start) {
            qs.score *= DUPLICATE_PENALTY;
        } else {
            seen_starts.insert(start);
        }
    }

    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores
}

/// Three ready-to-post caption variants for a quote
pub fn compose_variants(book_title: &str, author: &str, quote: &str) -> [String; 3] {
    let base_tag = if book_title.is_empty() {
        "#books".to_string()
    } else {
        format!("#{}", book_title.trim().replace(' ', ""))
    };
    let sign = if author.is_empty() {
        String::new()
    } else {
        format!("— {}", author)
    };

    [
        format!("{}\n\n{}\n\n{} #booklover #reading", quote, sign, base_tag),
        format!(
            "{}\n\n{}\n\nWhat line would you underline? {}",
            quote, sign, base_tag
        ),
        format!("{}\n\n{}\n\nPreorder now. {} #amreading", quote, sign, base_tag),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    // Fourteen lowercase words, no stopwords, no power words, no punctuation
    const PLAIN_14: &str =
        "quiet rivers carry stories older than mountains whispering softly beneath silver skies every night";

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_fourteen_plain_words_hit_the_length_peak() {
        let qs = compute_quote_score(PLAIN_14);
        let details = qs.details.unwrap();
        assert_eq!(details.num_words, 14);
        assert_eq!(details.length_score, 1.0);
        assert_eq!(details.power_score, 0.0);
        assert_eq!(details.clarity_score, 1.0);
        assert_eq!(details.struct_bonus, 0.0);
        assert_eq!(details.cap_bonus, 0.0);
        assert!(approx(qs.score, 0.7));
    }

    #[test]
    fn test_empty_token_quotes_score_zero() {
        for quote in ["", "   ", "123", "42 -- 17"] {
            let qs = compute_quote_score(quote);
            assert_eq!(qs.score, 0.0, "quote {:?}", quote);
            assert!(qs.details.is_none());
            assert_eq!(qs.details_json(), serde_json::json!({}));
        }
    }

    #[test]
    fn test_length_score_is_symmetric() {
        let eight = compute_quote_score("one two three four five six seven eight");
        let twenty = compute_quote_score(
            "one two three four five six seven eight nine ten eleven twelve thirteen fourteen fifteen sixteen seventeen eighteen nineteen twenty",
        );
        assert_eq!(
            eight.details.unwrap().length_score,
            twenty.details.unwrap().length_score
        );
    }

    #[test]
    fn test_power_words_saturate_at_three() {
        let qs =
            compute_quote_score("discover the proven secret to unlock and master the ultimate");
        assert_eq!(qs.details.unwrap().power_score, 1.0);

        let one = compute_quote_score("discover yourself");
        assert_eq!(one.details.unwrap().power_score, 0.333);
    }

    #[test]
    fn test_clarity_counts_stopwords() {
        // 2 of 4 tokens are stopwords
        let qs = compute_quote_score("the cat and dog");
        assert_eq!(qs.details.unwrap().clarity_score, 0.5);
    }

    #[test]
    fn test_apostrophes_stay_inside_words() {
        assert_eq!(word_list("Don't STOP believin'"), vec!["don't", "stop", "believin'"]);
    }

    #[test]
    fn test_structure_bonus_for_punctuation() {
        let quotes = [
            "wait, then go",
            "note: this",
            "well-worn path",
            "now – later",
            "now — later",
        ];
        for quote in quotes {
            let details = compute_quote_score(quote).details.unwrap();
            assert_eq!(details.struct_bonus, 0.2, "quote {:?}", quote);
        }
        assert_eq!(
            compute_quote_score("no marks here").details.unwrap().struct_bonus,
            0.0
        );
    }

    #[test]
    fn test_cap_bonus_needs_two_title_case_words() {
        let with = compute_quote_score("we walked from Paris to Berlin");
        assert_eq!(with.details.unwrap().cap_bonus, 0.2);

        let single = compute_quote_score("we walked to Berlin alone");
        assert_eq!(single.details.unwrap().cap_bonus, 0.0);

        let shouting = compute_quote_score("we walked to BERLIN and PARIS");
        assert_eq!(shouting.details.unwrap().cap_bonus, 0.0);
    }

    #[test]
    fn test_score_quotes_empty_input() {
        let empty: Vec<String> = Vec::new();
        assert!(score_quotes(&empty).is_empty());
    }

    #[test]
    fn test_score_quotes_is_sorted_permutation() {
        let quotes = vec![
            "short one",
            PLAIN_14,
            "",
            "Discover the secret: every Ending is a Beginning in disguise, waiting patiently for you",
            "a the of",
        ];
        let ranked = score_quotes(&quotes);

        assert_eq!(ranked.len(), quotes.len());
        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        let mut got: Vec<&str> = ranked.iter().map(|q| q.quote.as_str()).collect();
        let mut want = quotes.clone();
        got.sort();
        want.sort();
        assert_eq!(got, want);
        assert_eq!(ranked.last().unwrap().quote, "");
    }

    #[test]
    fn test_ties_keep_input_order() {
        let quotes = vec!["alpha beta gamma", "delta epsilon zeta", "eta theta iota"];
        let ranked = score_quotes(&quotes);
        let order: Vec<&str> = ranked.iter().map(|q| q.quote.as_str()).collect();
        assert_eq!(order, quotes);
    }

    #[test]
    fn test_duplicate_prefix_penalized_once_each() {
        let first = "one two three four five six seven eight and then it ends";
        let second = "One two three four five six seven EIGHT, but something else follows here";
        let third = "one two three four five six seven eight nine";
        let ranked = score_quotes(&[first, second, third]);

        let find = |q: &str| ranked.iter().find(|s| s.quote == q).unwrap().score;
        assert_eq!(find(first), compute_quote_score(first).score);
        assert_eq!(find(second), compute_quote_score(second).score * 0.7);
        assert_eq!(find(third), compute_quote_score(third).score * 0.7);
    }

    #[test]
    fn test_dedup_follows_input_order_not_score() {
        // The weaker quote comes first and therefore keeps its full score
        let weak = "the a of the one two three four";
        let strong = "The a of the one two three four: Discover the Secret beyond Time";
        let ranked = score_quotes(&[weak, strong]);
        let find = |q: &str| ranked.iter().find(|s| s.quote == q).unwrap().score;
        assert_eq!(find(weak), compute_quote_score(weak).score);
        assert_eq!(find(strong), compute_quote_score(strong).score * 0.7);
    }

    #[test]
    fn test_compose_variants_tags_and_signature() {
        let variants = compose_variants("The Long Road", "Ann Lee", "Keep going.");
        assert_eq!(
            variants[0],
            "Keep going.\n\n— Ann Lee\n\n#TheLongRoad #booklover #reading"
        );
        assert!(variants[1].ends_with("What line would you underline? #TheLongRoad"));
        assert!(variants[2].ends_with("Preorder now. #TheLongRoad #amreading"));

        let bare = compose_variants("", "", "Hi.");
        assert_eq!(bare[0], "Hi.\n\n\n\n#books #booklover #reading");
    }
}
