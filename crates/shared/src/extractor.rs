use regex::Regex;
use std::sync::LazyLock;

// Curly, double or single quoted spans
static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"“([^”]+)”|"([^"]+)"|'([^']+)'"#).unwrap());

const MIN_QUOTE_WORDS: usize = 3;
const MIN_PARAGRAPH_WORDS: usize = 6;
const MAX_FALLBACK_PARAGRAPHS: usize = 5;

/// Pull candidate quotes out of OCR text.
///
/// Quoted spans of at least three words win. Text without any falls back to
/// its first few substantial paragraphs.
pub fn extract_quotes(text: &str) -> Vec<String> {
    let quotes: Vec<String> = QUOTED_RE
        .captures_iter(text)
        .filter_map(|caps| {
            caps.iter()
                .skip(1)
                .flatten()
                .next()
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|q| q.split_whitespace().count() >= MIN_QUOTE_WORDS)
        .collect();

    if !quotes.is_empty() {
        return quotes;
    }

    text.split("\n\n")
        .map(str::trim)
        .filter(|p| p.split_whitespace().count() >= MIN_PARAGRAPH_WORDS)
        .take(MAX_FALLBACK_PARAGRAPHS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_each_quote_style() {
        let text = "He wrote “every road bends somewhere” and then \"keep walking past the gate\" \
                    before adding 'nothing stays lost forever' at the end.";
        assert_eq!(
            extract_quotes(text),
            vec![
                "every road bends somewhere",
                "keep walking past the gate",
                "nothing stays lost forever",
            ]
        );
    }

    #[test]
    fn test_short_quotes_are_ignored() {
        let text = "She said \"no way\" and \"  we leave at dawn  \".";
        assert_eq!(extract_quotes(text), vec!["we leave at dawn"]);
    }

    #[test]
    fn test_falls_back_to_long_paragraphs() {
        let paragraphs: Vec<String> = (0..7)
            .map(|i| format!("paragraph {} has quite a few words in it", i))
            .collect();
        let text = format!("Title\n\n{}", paragraphs.join("\n\n"));

        let quotes = extract_quotes(&text);
        assert_eq!(quotes.len(), 5);
        assert_eq!(quotes[0], "paragraph 0 has quite a few words in it");
    }

    #[test]
    fn test_nothing_usable() {
        assert!(extract_quotes("too short\n\nalso short").is_empty());
    }
}
