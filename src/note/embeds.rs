//! Image embeds in note bodies.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::IMAGE_EXTENSIONS;

/// `![[target]]` or `![[target|size]]`.
static WIKI_EMBED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[\[([^\]|#]+)(?:#[^\]|]*)?(?:\|[^\]]*)?\]\]").unwrap());

/// `![alt](target)`, optionally `<target>` and/or a quoted title.
static MARKDOWN_EMBED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"!\[([^\]]*)\]\(\s*(?:<([^>]+)>|([^)\s]+))(?:\s+"[^"]*")?\s*\)"#).unwrap()
});

/// A local image referenced from a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEmbed {
    /// Byte range of the whole embed in the body.
    pub range: Range<usize>,
    /// Reference as written, without size or title.
    pub target: String,
    /// Alt text of a Markdown embed.
    pub alt: Option<String>,
}

/// Local image embeds in document order.
///
/// Remote images, embeds of non-image files and anything inside fenced code
/// blocks or inline code spans are skipped.
#[must_use]
pub fn find_image_embeds(body: &str) -> Vec<ImageEmbed> {
    let mut embeds: Vec<ImageEmbed> = WIKI_EMBED
        .captures_iter(body)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let target = caps.get(1)?.as_str().trim();
            Some(ImageEmbed {
                range: whole.range(),
                target: target.to_string(),
                alt: None,
            })
        })
        .collect();

    embeds.extend(MARKDOWN_EMBED.captures_iter(body).filter_map(|caps| {
        let whole = caps.get(0)?;
        let target = caps.get(2).or_else(|| caps.get(3))?.as_str().trim();
        Some(ImageEmbed {
            range: whole.range(),
            target: target.to_string(),
            alt: Some(caps.get(1)?.as_str().to_string()).filter(|a| !a.is_empty()),
        })
    }));

    let code = code_ranges(body);
    embeds.retain(|e| {
        is_local_image(&e.target) && !code.iter().any(|r| r.contains(&e.range.start))
    });
    embeds.sort_by_key(|e| e.range.start);
    embeds
}

/// Byte ranges of fenced code blocks and inline code spans.
///
/// An unclosed fence runs to the end of the body. An unmatched backtick run
/// is literal text.
fn code_ranges(body: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut fence: Option<(u8, usize, usize)> = None;
    let mut prose_start = 0;
    let mut line_start = 0;

    for line in body.split_inclusive('\n') {
        let line_end = line_start + line.len();
        let (marker, len, rest) = fence_marker(line);

        match fence {
            Some((open_marker, open_len, start)) => {
                if marker == Some(open_marker) && len >= open_len && rest.trim().is_empty() {
                    ranges.push(start..line_end);
                    fence = None;
                    prose_start = line_end;
                }
            }
            None => {
                if let Some(m) = marker {
                    inline_code_spans(body, prose_start..line_start, &mut ranges);
                    fence = Some((m, len, line_start));
                }
            }
        }
        line_start = line_end;
    }

    match fence {
        Some((_, _, start)) => ranges.push(start..body.len()),
        None => inline_code_spans(body, prose_start..body.len(), &mut ranges),
    }
    ranges
}

/// Fence character, run length and the text after the run, for a line that
/// opens or closes a fenced block.
fn fence_marker(line: &str) -> (Option<u8>, usize, &str) {
    let trimmed = line.trim_start_matches(' ');
    let Some(&first) = trimmed.as_bytes().first() else {
        return (None, 0, trimmed);
    };
    if first != b'`' && first != b'~' {
        return (None, 0, trimmed);
    }
    let len = trimmed.bytes().take_while(|&b| b == first).count();
    if len < 3 {
        return (None, 0, trimmed);
    }
    (Some(first), len, &trimmed[len..])
}

fn inline_code_spans(body: &str, segment: Range<usize>, ranges: &mut Vec<Range<usize>>) {
    let bytes = &body.as_bytes()[..segment.end];
    let run_at = |i: usize| bytes[i..].iter().take_while(|&&b| b == b'`').count();
    let mut i = segment.start;

    while i < bytes.len() {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let open = run_at(i);
        let mut j = i + open;
        let mut close = None;
        while j < bytes.len() {
            if bytes[j] == b'`' {
                let run = run_at(j);
                if run == open {
                    close = Some(j + run);
                    break;
                }
                j += run;
            } else {
                j += 1;
            }
        }
        match close {
            Some(end) => {
                ranges.push(i..end);
                i = end;
            }
            None => i += open,
        }
    }
}

/// Whether `target` names a local file with an image extension.
#[must_use]
pub fn is_local_image(target: &str) -> bool {
    let lower = target.to_ascii_lowercase();
    if lower.contains("://") || lower.starts_with("data:") {
        return false;
    }
    lower
        .rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext))
}

/// Replace embeds with new text.
///
/// `replace` returns `None` to keep an embed unchanged. `embeds` must be in
/// document order, as [`find_image_embeds`] returns them.
pub fn rewrite_embeds<F>(body: &str, embeds: &[ImageEmbed], mut replace: F) -> String
where
    F: FnMut(&ImageEmbed) -> Option<String>,
{
    let mut out = String::with_capacity(body.len());
    let mut cursor = 0;

    for embed in embeds {
        if embed.range.start < cursor {
            continue;
        }
        if let Some(replacement) = replace(embed) {
            out.push_str(&body[cursor..embed.range.start]);
            out.push_str(&replacement);
            cursor = embed.range.end;
        }
    }

    out.push_str(&body[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_wiki_and_markdown_embeds_in_order() {
        let body = "Intro ![shot](img/shot.PNG \"Screen\")\n![[cat.png|300]] and ![[notes.md]]\n![remote](https://example.com/a.png)";
        let embeds = find_image_embeds(body);

        assert_eq!(embeds.len(), 2);
        assert_eq!(embeds[0].target, "img/shot.PNG");
        assert_eq!(embeds[0].alt.as_deref(), Some("shot"));
        assert_eq!(embeds[1].target, "cat.png");
        assert_eq!(embeds[1].alt, None);
        assert_eq!(&body[embeds[1].range.clone()], "![[cat.png|300]]");
    }

    #[test]
    fn test_angle_bracket_targets_allow_spaces() {
        let embeds = find_image_embeds("![](<my photo.jpg>)");
        assert_eq!(embeds.len(), 1);
        assert_eq!(embeds[0].target, "my photo.jpg");
        assert_eq!(embeds[0].alt, None);
    }

    #[test]
    fn test_embeds_in_code_are_ignored() {
        let body = "![[a.png]]\n```md\n![[b.png]]\n```\nUse `![[c.png]]` or ``![x](d.png)``\n![[e.png]]";
        let targets: Vec<String> = find_image_embeds(body)
            .into_iter()
            .map(|e| e.target)
            .collect();
        assert_eq!(targets, vec!["a.png", "e.png"]);
    }

    #[test]
    fn test_unclosed_fence_hides_rest_and_lone_backtick_is_text() {
        let body = "It`s ![[a.png]]\n~~~\n![[b.png]]\n";
        let targets: Vec<String> = find_image_embeds(body)
            .into_iter()
            .map(|e| e.target)
            .collect();
        assert_eq!(targets, vec!["a.png"]);
    }

    #[test]
    fn test_is_local_image() {
        assert!(is_local_image("a.png"));
        assert!(is_local_image("dir/b.JPEG"));
        assert!(!is_local_image("doc.pdf"));
        assert!(!is_local_image("noext"));
        assert!(!is_local_image("http://x.com/a.png"));
        assert!(!is_local_image("data:image/png;base64,xx.png"));
    }

    #[test]
    fn test_rewrite_keeps_unreplaced_embeds() {
        let body = "a ![[x.png]] b ![[y.png]] c";
        let embeds = find_image_embeds(body);
        let out = rewrite_embeds(body, &embeds, |e| {
            (e.target == "y.png").then(|| "![y](upload://y.png)".to_string())
        });
        assert_eq!(out, "a ![[x.png]] b ![y](upload://y.png) c");
    }
}
