//! The `---` delimited header at the top of a note.
//!
//! Only flat `key: value` pairs and simple `- item` lists are understood,
//! which covers the keys the publisher reads and writes.

use crate::discourse::PostRef;

pub const POST_ID_KEY: &str = "discourse_post_id";
pub const TOPIC_ID_KEY: &str = "discourse_topic_id";
pub const CATEGORY_KEY: &str = "discourse_category";
pub const TAGS_KEY: &str = "discourse_tags";
pub const TITLE_KEY: &str = "title";

/// Parsed frontmatter entries in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    entries: Vec<(String, String)>,
}

/// Byte offsets of a frontmatter block.
struct Block {
    /// Start of the first line inside the delimiters.
    inner_start: usize,
    /// Start of the closing delimiter line.
    inner_end: usize,
    /// Start of the body after the closing delimiter.
    body_start: usize,
}

impl Frontmatter {
    /// Split a note into its frontmatter and body.
    ///
    /// A note without a frontmatter block yields empty frontmatter and the
    /// whole text as body.
    #[must_use]
    pub fn parse(text: &str) -> (Self, &str) {
        match locate(text) {
            Some(block) => (
                Self::from_lines(&text[block.inner_start..block.inner_end]),
                &text[block.body_start..],
            ),
            None => (Self::default(), text),
        }
    }

    fn from_lines(block: &str) -> Self {
        let mut entries: Vec<(String, String)> = Vec::new();
        let mut list_key: Option<String> = None;
        let mut list_items: Vec<String> = Vec::new();

        for raw in block.lines() {
            let line = raw.trim_end();
            let trimmed = line.trim_start();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if let Some(item) = trimmed.strip_prefix("- ") {
                if list_key.is_some() {
                    list_items.push(unquote(item.trim()).to_string());
                }
                continue;
            }

            if let Some(key) = list_key.take() {
                entries.push((key, list_items.join(", ")));
                list_items.clear();
            }

            let Some((key, value)) = trimmed.split_once(':') else {
                continue;
            };
            let key = key.trim().to_string();
            let value = value.trim();

            if value.is_empty() {
                list_key = Some(key);
            } else {
                entries.push((key, unquote(value).to_string()));
            }
        }

        if let Some(key) = list_key {
            entries.push((key, list_items.join(", ")));
        }

        Self { entries }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.get(TITLE_KEY)
    }

    #[must_use]
    pub fn category(&self) -> Option<u64> {
        self.get(CATEGORY_KEY).and_then(|v| v.parse().ok())
    }

    /// Tags from `[a, b]`, `a, b` or a `- item` list.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.get(TAGS_KEY)
            .map(|v| {
                v.trim_start_matches('[')
                    .trim_end_matches(']')
                    .split(',')
                    .map(|t| unquote(t.trim()).to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The post this note was published as, if both ids are recorded.
    #[must_use]
    pub fn post_ref(&self) -> Option<PostRef> {
        let post_id = self.get(POST_ID_KEY)?.parse().ok()?;
        let topic_id = self.get(TOPIC_ID_KEY)?.parse().ok()?;
        Some(PostRef { post_id, topic_id })
    }
}

/// Record `post` in the note's frontmatter.
///
/// Existing id lines are replaced in place, missing ones are appended to the
/// block, and a block is created when the note has none. Everything else is
/// left as it was.
#[must_use]
pub fn with_post_ref(text: &str, post: PostRef) -> String {
    let ids = [
        (POST_ID_KEY, post.post_id.to_string()),
        (TOPIC_ID_KEY, post.topic_id.to_string()),
    ];

    let Some(block) = locate(text) else {
        let mut out = String::from("---\n");
        for (key, value) in &ids {
            out.push_str(&format!("{key}: {value}\n"));
        }
        out.push_str("---\n");
        out.push_str(text);
        return out;
    };

    let mut written = [false; 2];
    let mut out = String::with_capacity(text.len() + 64);
    out.push_str(&text[..block.inner_start]);

    for line in text[block.inner_start..block.inner_end].split_inclusive('\n') {
        let key = line.split_once(':').map(|(k, _)| k.trim());
        match ids.iter().position(|(k, _)| Some(*k) == key) {
            Some(i) => {
                let ending = if line.ends_with("\r\n") {
                    "\r\n"
                } else if line.ends_with('\n') {
                    "\n"
                } else {
                    ""
                };
                out.push_str(&format!("{}: {}{ending}", ids[i].0, ids[i].1));
                written[i] = true;
            }
            None => out.push_str(line),
        }
    }

    for (i, (key, value)) in ids.iter().enumerate() {
        if !written[i] {
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&format!("{key}: {value}\n"));
        }
    }

    out.push_str(&text[block.inner_end..]);
    out
}

fn locate(text: &str) -> Option<Block> {
    let text_start = if text.starts_with('\u{feff}') { 3 } else { 0 };
    let first_end = text[text_start..].find('\n')? + text_start;
    if text[text_start..first_end].trim_end() != "---" {
        return None;
    }

    let inner_start = first_end + 1;
    let mut offset = inner_start;

    while offset < text.len() {
        let line_end = text[offset..].find('\n').map_or(text.len(), |i| offset + i);
        if text[offset..line_end].trim_end() == "---" {
            return Some(Block {
                inner_start,
                inner_end: offset,
                body_start: (line_end + 1).min(text.len()),
            });
        }
        offset = line_end + 1;
    }

    None
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
}
