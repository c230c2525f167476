use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const TILE_SIZE: u32 = 1080;
const QUOTE_FONT_SIZE: u32 = 48;
const AUTHOR_FONT_SIZE: u32 = 32;
const LINE_SPACING: u32 = 8;
// Rough average glyph width relative to font size, used for wrapping
const GLYPH_WIDTH_RATIO: f64 = 0.5;

const BACKGROUNDS: &[&str] = &["#121216", "#181c20", "#0a1e3c", "#3c1414"];
const FOREGROUNDS: &[&str] = &["#f0f0f0", "#e6e6e6", "#ffffff"];
const ACCENT: &str = "#ffd700";

/// Renders one quote into an image file
pub trait TileRenderer {
    fn render(&self, quote: &str, author: &str, out_path: &Path, index: usize) -> Result<()>;
}

/// Square SVG quote cards
#[derive(Debug, Clone)]
pub struct SvgTileRenderer {
    size: u32,
}

impl Default for SvgTileRenderer {
    fn default() -> Self {
        Self { size: TILE_SIZE }
    }
}

impl SvgTileRenderer {
    pub fn generate(&self, quote: &str, author: &str, index: usize) -> String {
        let size = self.size;
        let margin = (size as f64 * 0.08) as u32;
        let max_width = size - margin * 2;
        let background = BACKGROUNDS[index % BACKGROUNDS.len()];
        let foreground = FOREGROUNDS[index % FOREGROUNDS.len()];

        let lines = Self::wrap(&format!("“{}”", quote), QUOTE_FONT_SIZE, max_width);
        let line_height = QUOTE_FONT_SIZE + LINE_SPACING;
        let block_height = line_height * lines.len() as u32;
        let top = (size.saturating_sub(block_height) / 2).saturating_sub(40);
        let center = size / 2;

        let mut svg = String::new();
        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{0}\" height=\"{0}\" viewBox=\"0 0 {0} {0}\">\n",
            size
        ));
        svg.push_str(&format!(
            "  <rect width=\"100%\" height=\"100%\" fill=\"{}\"/>\n",
            background
        ));
        svg.push_str(&format!(
            "  <text font-family=\"Arial, sans-serif\" font-size=\"{}\" fill=\"{}\" text-anchor=\"middle\">\n",
            QUOTE_FONT_SIZE, foreground
        ));
        for (i, line) in lines.iter().enumerate() {
            let y = top + QUOTE_FONT_SIZE + line_height * i as u32;
            svg.push_str(&format!(
                "    <tspan x=\"{}\" y=\"{}\">{}</tspan>\n",
                center,
                y,
                Self::escape_xml(line)
            ));
        }
        svg.push_str("  </text>\n");

        if !author.is_empty() {
            svg.push_str(&format!(
                "  <text x=\"{}\" y=\"{}\" font-family=\"Arial, sans-serif\" font-size=\"{}\" fill=\"{}\" text-anchor=\"middle\">— {}</text>\n",
                center,
                top + block_height + 20 + AUTHOR_FONT_SIZE,
                AUTHOR_FONT_SIZE,
                ACCENT,
                Self::escape_xml(author)
            ));
        }

        svg.push_str("</svg>\n");
        svg
    }

    /// Greedy word wrap against an estimated pixel width
    fn wrap(text: &str, font_size: u32, max_width: u32) -> Vec<String> {
        let glyph_width = font_size as f64 * GLYPH_WIDTH_RATIO;
        let max_chars = (max_width as f64 / glyph_width).max(1.0) as usize;

        let mut lines = Vec::new();
        let mut current = String::new();
        for word in text.split_whitespace() {
            let candidate_len = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };

            if candidate_len <= max_chars || current.is_empty() {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }

    fn escape_xml(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;")
    }
}

impl TileRenderer for SvgTileRenderer {
    fn render(&self, quote: &str, author: &str, out_path: &Path, index: usize) -> Result<()> {
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).context("Failed to create tile directory")?;
        }
        let svg = self.generate(quote, author, index);
        fs::write(out_path, svg)
            .with_context(|| format!("Failed to write tile: {}", out_path.display()))
    }
}

/// Render one tile per quote as `quote_01.svg`, `quote_02.svg`, ...
pub fn generate_quote_tiles(
    renderer: &dyn TileRenderer,
    quotes: &[String],
    author: &str,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut paths = Vec::with_capacity(quotes.len());
    for (idx, quote) in quotes.iter().enumerate() {
        let path = out_dir.join(format!("quote_{:02}.svg", idx + 1));
        renderer.render(quote, author, &path, idx)?;
        paths.push(path);
    }
    Ok(paths)
}

/// Social caption for a quote with de-duplicated hashtags
pub fn compose_message(book_title: &str, author: &str, quote: &str, hashtags: &[&str]) -> String {
    let surname = author
        .split_whitespace()
        .last()
        .unwrap_or("author")
        .to_string();

    let mut tags = vec![
        format!("#{}", book_title.trim().replace(' ', "")),
        format!("#{}", surname),
        "#books".to_string(),
        "#reading".to_string(),
        "#booklover".to_string(),
    ];
    tags.extend(hashtags.iter().map(|t| t.to_string()));

    let mut seen = HashSet::new();
    let unique: Vec<String> = tags
        .into_iter()
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect();

    format!("{}\n\n— {}\n\n{}", quote, author, unique.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_escape_xml_combined() {
        assert_eq!(
            SvgTileRenderer::escape_xml("<a href=\"x\">Tom & Jerry's</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_wrap_respects_width() {
        // 20 chars per line at font 10 and width 100
        let lines = SvgTileRenderer::wrap("aaaa bbbb cccc dddd eeee ffff", 10, 100);
        assert_eq!(lines, vec!["aaaa bbbb cccc dddd", "eeee ffff"]);
    }

    #[test]
    fn test_wrap_keeps_overlong_word_whole() {
        let lines = SvgTileRenderer::wrap("supercalifragilistic ok", 10, 40);
        assert_eq!(lines, vec!["supercalifragilistic", "ok"]);
    }

    #[test]
    fn test_svg_contains_escaped_quote_and_author() {
        let svg = SvgTileRenderer::default().generate("Fish & chips", "A. Writer", 0);
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("“Fish &amp; chips”"));
        assert!(svg.contains("— A. Writer"));
        assert!(svg.contains(BACKGROUNDS[0]));
    }

    #[test]
    fn test_svg_without_author_has_no_signature() {
        let svg = SvgTileRenderer::default().generate("Just words here", "", 1);
        assert!(!svg.contains("—"));
        assert!(svg.contains(BACKGROUNDS[1]));
    }

    #[test]
    fn test_generate_quote_tiles_numbers_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("campaign");
        let quotes = vec!["first".to_string(), "second".to_string()];

        let paths =
            generate_quote_tiles(&SvgTileRenderer::default(), &quotes, "Ann", &out).unwrap();
        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["quote_01.svg", "quote_02.svg"]);
        assert!(paths.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_compose_message_dedupes_tags() {
        let message = compose_message("Books", "Ann Lee", "Read on.", &["#Reading", "#new"]);
        assert_eq!(message, "Read on.\n\n— Ann Lee\n\n#Books #Lee #reading #booklover #new");
    }

    #[test]
    fn test_compose_message_without_author() {
        let message = compose_message("My Book", "", "Hello.", &[]);
        assert!(message.ends_with("#MyBook #author #books #reading #booklover"));
    }
}
