//! Fixed content tables posted to the application's content API

use serde::{Deserialize, Serialize};

/// Post type understood by `POST /api/posts`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Post,
    Blog,
    Question,
}

/// One item of a content table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub title: String,
    pub content: String,
}

impl ContentItem {
    pub fn new(kind: ContentKind, title: &str, content: &str) -> Self {
        Self {
            kind,
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    /// Item whose body repeats its title, as the seed tables do.
    pub fn echo(kind: ContentKind, text: &str) -> Self {
        Self::new(kind, text, text)
    }
}

/// Questions used by the rich Q&A capture
pub fn rich_questions() -> Vec<ContentItem> {
    ["salndfjnas", "asfdはsd", "sdfhjさああ", "dsjafjsd"]
        .iter()
        .map(|t| ContentItem::echo(ContentKind::Question, t))
        .collect()
}

/// Throwaway titles used to fill blog and Q&A lists
pub fn trashy(kind: ContentKind) -> Vec<ContentItem> {
    ["dsfaskdf", "さんdf亜jsdfあ", "fdsajkf", "あsfdhjkl"]
        .iter()
        .map(|t| ContentItem::echo(kind, t))
        .collect()
}

/// Single placeholder question that keeps the Q&A list non-empty
pub fn placeholder_question() -> Vec<ContentItem> {
    vec![ContentItem::echo(ContentKind::Question, "あ")]
}

/// Reactions picked at random by the post-creation script
pub const REACTION_EMOJIS: [&str; 4] = ["👍", "❤️", "😂", "🤔"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_serializes_with_api_field_names() {
        let item = ContentItem::echo(ContentKind::Question, "あ");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "question");
        assert_eq!(json["title"], "あ");
        assert_eq!(json["content"], "あ");
    }

    #[test]
    fn test_tables_have_four_items() {
        assert_eq!(rich_questions().len(), 4);
        assert!(trashy(ContentKind::Blog).iter().all(|i| i.kind == ContentKind::Blog));
    }
}
