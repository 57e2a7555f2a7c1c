//! Tag Text Helpers
//!
//! Pure functions over a record's raw text: tag extraction, summary
//! derivation, and the add/remove-tag mutations handed to the external
//! writer. Nothing here touches storage.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)(#[\p{L}\p{N}_/\-]+)").expect("valid tag regex"));
static BLOCK_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s+)\^[A-Za-z0-9\-]+$").expect("valid block ref regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Returns every tag in `text`, in order of appearance.
///
/// # Example
///
/// ```
/// use taskweave::workflow::text::extract_tags;
///
/// let tags = extract_tags("Review draft #tpm/workflow/Publish #tpm/step/draft");
/// assert_eq!(tags, vec!["#tpm/workflow/Publish", "#tpm/step/draft"]);
/// ```
pub fn extract_tags(text: &str) -> Vec<String> {
    TAG_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Strips every tag and a trailing block reference, collapsing whitespace.
pub fn strip_tags(text: &str) -> String {
    let without_tags = TAG_RE.replace_all(text, " ");
    let trimmed = without_tags.trim_end();
    let without_ref = BLOCK_REF_RE.replace(trimmed, "");
    WHITESPACE_RE
        .replace_all(&without_ref, " ")
        .trim()
        .to_string()
}

/// First whitespace-delimited token of `text`, cut to characters a tag
/// may contain. Used to name workflows.
pub fn first_tag_safe_token(text: &str) -> Option<String> {
    let token = text.split_whitespace().next()?;
    let safe: String = token
        .chars()
        .take_while(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '/'))
        .collect();
    if safe.is_empty() {
        None
    } else {
        Some(safe)
    }
}

/// Whether `tag` occurs in `text`, using the same boundaries as
/// [`extract_tags`].
pub fn has_tag(text: &str, tag: &str) -> bool {
    tag_spans(text, tag).next().is_some()
}

/// Byte ranges of every occurrence of `tag`, each widened to swallow one
/// adjacent whitespace character.
fn tag_spans<'t>(text: &'t str, tag: &'t str) -> impl Iterator<Item = (usize, usize)> + 't {
    TAG_RE.captures_iter(text).filter_map(move |c| {
        let found = c.get(1)?;
        if found.as_str() != tag {
            return None;
        }
        let whole = c.get(0)?;
        if whole.start() < found.start() {
            return Some((whole.start(), found.end()));
        }
        let trailing = text[found.end()..]
            .chars()
            .next()
            .filter(|ch| ch.is_whitespace())
            .map_or(0, char::len_utf8);
        Some((found.start(), found.end() + trailing))
    })
}

/// Appends `tag`, keeping a trailing block reference (`^id`) last.
///
/// Returns the text unchanged when the tag is already present.
///
/// # Example
///
/// ```
/// use taskweave::workflow::text::add_tag;
///
/// assert_eq!(add_tag("Ship it ^a1b2", "#tpm/step/done"), "Ship it #tpm/step/done ^a1b2");
/// ```
pub fn add_tag(text: &str, tag: &str) -> String {
    if has_tag(text, tag) {
        return text.to_string();
    }

    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        return tag.to_string();
    }

    match BLOCK_REF_RE.find(trimmed) {
        Some(m) if m.start() > 0 => {
            let body = trimmed[..m.start()].trim_end();
            let block_ref = trimmed[m.start()..].trim_start();
            format!("{} {} {}", body, tag, block_ref)
        }
        _ => format!("{} {}", trimmed, tag),
    }
}

/// Removes every occurrence of `tag` together with the whitespace before
/// it. Punctuation following the tag stays in place.
pub fn remove_tag(text: &str, tag: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in tag_spans(text, tag) {
        // Adjacent spans may share the whitespace between them.
        out.push_str(&text[cursor..start.max(cursor)]);
        cursor = end.max(cursor);
    }
    if cursor == 0 {
        return text.to_string();
    }
    out.push_str(&text[cursor..]);
    out.trim_end().to_string()
}
