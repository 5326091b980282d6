//! Editorial guides and their lightweight markup.
//!
//! Guide content uses a small dialect: `#`/`##`/`###` headings, `- ` bullet
//! lines, `**bold**` spans, blank lines between paragraphs and single line
//! breaks inside them. [`parse_guide_blocks`] turns it into structured
//! blocks so renderers never have to interpolate raw HTML.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{EntityId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guide {
    pub id: String,
    pub title: String,
    pub category: String,
    pub content: String,
    #[serde(default, alias = "relatedEntityIds")]
    pub related_entities: Vec<EntityId>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

/// Static guide collection loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct GuideCatalog {
    guides: Vec<Guide>,
}

impl GuideCatalog {
    pub fn new(guides: Vec<Guide>) -> Self {
        Self { guides }
    }

    /// Parse a JSON array of guides. Duplicate ids are rejected.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let guides: Vec<Guide> =
            serde_json::from_str(json).map_err(|e| CoreError::Parse(format!("guides: {e}")))?;
        let mut seen = std::collections::HashSet::new();
        for guide in &guides {
            if !seen.insert(guide.id.as_str()) {
                return Err(CoreError::Conflict(format!("duplicate guide id '{}'", guide.id)));
            }
        }
        Ok(Self::new(guides))
    }

    /// Guides in file order, optionally restricted to one category.
    pub fn list(&self, category: Option<&str>) -> Vec<&Guide> {
        self.guides
            .iter()
            .filter(|g| category.is_none_or(|c| g.category == c))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Guide> {
        self.guides.iter().find(|g| g.id == id)
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for guide in &self.guides {
            if !categories.contains(&guide.category.as_str()) {
                categories.push(&guide.category);
            }
        }
        categories
    }

    pub fn len(&self) -> usize {
        self.guides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guides.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Markup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Span {
    Text(String),
    Bold(String),
    LineBreak,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GuideBlock {
    Heading { level: u8, text: String },
    Bullet { spans: Vec<Span> },
    Paragraph { spans: Vec<Span> },
}

static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));

/// Split guide content into blocks.
pub fn parse_guide_blocks(content: &str) -> Vec<GuideBlock> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<Span> = Vec::new();

    let flush = |paragraph: &mut Vec<Span>, blocks: &mut Vec<GuideBlock>| {
        if !paragraph.is_empty() {
            blocks.push(GuideBlock::Paragraph {
                spans: std::mem::take(paragraph),
            });
        }
    };

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush(&mut paragraph, &mut blocks);
            continue;
        }

        if let Some((level, text)) = heading(trimmed) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(GuideBlock::Heading {
                level,
                text: text.to_string(),
            });
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(GuideBlock::Bullet {
                spans: inline_spans(item.trim()),
            });
            continue;
        }

        if !paragraph.is_empty() {
            paragraph.push(Span::LineBreak);
        }
        paragraph.extend(inline_spans(trimmed));
    }
    flush(&mut paragraph, &mut blocks);

    blocks
}

fn heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if !(1..=3).contains(&hashes) {
        return None;
    }
    let text = line[hashes..].strip_prefix(' ')?.trim();
    (!text.is_empty()).then_some((hashes as u8, text))
}

fn inline_spans(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;
    for caps in BOLD_RE.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            spans.push(Span::Text(text[last..whole.start()].to_string()));
        }
        spans.push(Span::Bold(inner.as_str().to_string()));
        last = whole.end();
    }
    if last < text.len() {
        spans.push(Span::Text(text[last..].to_string()));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const CATALOG: &str = r#"[
        {"id": "guide-1", "title": "First steps", "category": "Newcomers",
         "content": "Intro", "related_entities": ["bike-1", "visa-1"]},
        {"id": "guide-2", "title": "Where to eat", "category": "Food",
         "content": "Warungs", "relatedEntityIds": ["warung-1"],
         "updated_at": "2025-01-27T00:00:00Z"},
        {"id": "guide-3", "title": "Visa runs", "category": "Newcomers", "content": ""}
    ]"#;

    #[test]
    fn catalog_lists_and_filters() {
        let catalog = GuideCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.list(None).len(), 3);
        let newcomers: Vec<&str> = catalog
            .list(Some("Newcomers"))
            .iter()
            .map(|g| g.id.as_str())
            .collect();
        assert_eq!(newcomers, vec!["guide-1", "guide-3"]);
        assert!(catalog.list(Some("Nightlife")).is_empty());
        assert_eq!(catalog.categories(), vec!["Newcomers", "Food"]);
    }

    #[test]
    fn catalog_lookup_and_aliases() {
        let catalog = GuideCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.get("guide-2").unwrap().related_entities, vec!["warung-1"]);
        assert!(catalog.get("guide-2").unwrap().updated_at.is_some());
        assert!(catalog.get("guide-9").is_none());
    }

    #[test]
    fn catalog_rejects_bad_input() {
        assert_matches!(GuideCatalog::from_json("{}"), Err(CoreError::Parse(_)));
        let dup = r#"[{"id":"a","title":"A","category":"c","content":""},
                      {"id":"a","title":"B","category":"c","content":""}]"#;
        assert_matches!(GuideCatalog::from_json(dup), Err(CoreError::Conflict(_)));
    }

    #[test]
    fn blocks_from_markup() {
        let content = "# First steps\n\n## Housing\n- **Canggu** - surfers\n- Ubud\n\nScooter rental\nis **cheap** here.\n\nBudget";
        let blocks = parse_guide_blocks(content);
        assert_eq!(
            blocks,
            vec![
                GuideBlock::Heading { level: 1, text: "First steps".into() },
                GuideBlock::Heading { level: 2, text: "Housing".into() },
                GuideBlock::Bullet {
                    spans: vec![Span::Bold("Canggu".into()), Span::Text(" - surfers".into())]
                },
                GuideBlock::Bullet { spans: vec![Span::Text("Ubud".into())] },
                GuideBlock::Paragraph {
                    spans: vec![
                        Span::Text("Scooter rental".into()),
                        Span::LineBreak,
                        Span::Text("is ".into()),
                        Span::Bold("cheap".into()),
                        Span::Text(" here.".into()),
                    ]
                },
                GuideBlock::Paragraph { spans: vec![Span::Text("Budget".into())] },
            ]
        );
    }

    #[test]
    fn hashes_without_space_are_text() {
        let blocks = parse_guide_blocks("#hashtag\n#### deep");
        assert_eq!(
            blocks,
            vec![GuideBlock::Paragraph {
                spans: vec![
                    Span::Text("#hashtag".into()),
                    Span::LineBreak,
                    Span::Text("#### deep".into()),
                ]
            }]
        );
    }

    #[test]
    fn unmatched_bold_markers_stay_literal() {
        assert_eq!(inline_spans("a **b"), vec![Span::Text("a **b".into())]);
    }
}
