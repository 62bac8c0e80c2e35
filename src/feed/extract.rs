// src/feed/extract.rs
//! Field extraction helpers for feed entries: author names, entry images,
//! source names and base URLs. Everything here is best-effort; a field that
//! cannot be extracted becomes `None` (or an empty string where the record
//! keeps a plain string), never an error.

use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

fn cdata_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("cdata regex"))
}

fn source_chars_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r#"[\\/*?:"<>|]"#).expect("source chars regex"))
}

fn img_selector() -> &'static Selector {
    static SEL: OnceCell<Selector> = OnceCell::new();
    SEL.get_or_init(|| Selector::parse("img").expect("img selector"))
}

/// Removes `<![CDATA[..]]>` wrappers some feeds leave inside author names.
pub fn strip_cdata(text: &str) -> String {
    cdata_re().replace_all(text, "$1").trim().to_string()
}

/// Joins author names into one display string.
///
/// Names are cleaned first (CDATA wrappers removed, blanks dropped,
/// duplicates removed keeping first occurrence), then joined: one name
/// stands alone, two become `"A and B"`, three or more get the Oxford
/// comma (`"A, B, and C"`). No usable name yields `None`.
pub fn join_authors(names: &[String]) -> Option<String> {
    let mut cleaned: Vec<String> = Vec::new();
    for raw in names {
        let name = strip_cdata(raw);
        if name.is_empty() || cleaned.contains(&name) {
            continue;
        }
        cleaned.push(name);
    }
    match cleaned.len() {
        0 => None,
        1 => Some(cleaned.remove(0)),
        2 => Some(format!("{} and {}", cleaned[0], cleaned[1])),
        _ => {
            let last = cleaned.pop().unwrap_or_default();
            Some(format!("{}, and {}", cleaned.join(", "), last))
        }
    }
}

/// First image URL referenced by an HTML blob: the first `<img>` element's
/// `src`, or the first candidate of its `srcset` when `src` is absent.
/// The parser recovers from broken markup, so this never fails; it just
/// returns `None` when nothing usable is found.
pub fn first_image_url(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    for img in document.select(img_selector()) {
        if let Some(src) = img.value().attr("src") {
            if !src.is_empty() {
                return Some(src.to_string());
            }
        }
        if let Some(srcset) = img.value().attr("srcset") {
            if let Some(first) = srcset
                .split(',')
                .next()
                .and_then(|candidate| candidate.split_whitespace().next())
            {
                if !first.is_empty() {
                    return Some(first.to_string());
                }
            }
        }
    }
    None
}

/// Source display name: the feed title with filesystem-hostile characters
/// (`\ / * ? : " < > |`) removed.
pub fn sanitize_source(title: &str) -> String {
    source_chars_re().replace_all(title, "").to_string()
}

/// Site base for an article link: `"{scheme}://{host}/"` with the path
/// discarded. `None` when the link is not an absolute URL with a host.
pub fn base_url(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let host = url.host_str()?;
    Some(format!("{}://{}/", url.scheme(), host))
}
