// src/feed/mod.rs
//! Feed normalization: raw RSS/Atom bytes in, deduplicated [`Article`]
//! candidates out.
//!
//! An entry qualifies only if it carries a publication timestamp and a
//! non-empty title. Its fingerprint is the hex MD5 of the title; entries
//! whose fingerprint is already scored, or whose timestamp falls before the
//! cutoff, are dropped here. Entries inserted but not yet scored are *not*
//! filtered: they surface again each cycle and bounce off the store's
//! conflict handling until a score lands.

pub mod extract;
pub mod opml;

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;

use crate::store::Article;

/// Parses a feed body and returns the candidates that survive the cutoff
/// and scored-fingerprint filters. Unparseable bodies are an `Err`; the
/// caller decides whether that sinks anything beyond this one feed.
pub fn extract_candidates(
    body: &[u8],
    cutoff: DateTime<Utc>,
    scored: &HashSet<String>,
) -> Result<Vec<Article>> {
    let feed = feed_rs::parser::parse(body).context("parsing feed body")?;

    let source = feed
        .title
        .as_ref()
        .map(|t| extract::sanitize_source(&t.content))
        .unwrap_or_default();
    let source_image = feed
        .logo
        .as_ref()
        .or(feed.icon.as_ref())
        .map(|image| image.uri.clone())
        .unwrap_or_default();

    let mut candidates = Vec::new();
    for entry in &feed.entries {
        let Some(published) = entry.published else {
            continue;
        };
        let Some(title) = entry.title.as_ref().map(|t| t.content.clone()) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        let fingerprint = format!("{:x}", md5::compute(title.as_bytes()));
        if published < cutoff || scored.contains(&fingerprint) {
            continue;
        }

        let link = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default();
        let author_names: Vec<String> =
            entry.authors.iter().map(|p| p.name.clone()).collect();

        candidates.push(Article {
            fingerprint,
            title,
            source_url: extract::base_url(&link).unwrap_or_default(),
            link,
            source: source.clone(),
            source_image: source_image.clone(),
            description: entry
                .summary
                .as_ref()
                .map(|t| t.content.clone())
                .unwrap_or_default(),
            image: entry_image(entry),
            author: extract::join_authors(&author_names),
            publication_date: published,
            score: None,
        });
    }
    Ok(candidates)
}

/// Image precedence: media-content URL, then enclosure URL, then the first
/// `<img>` in the description HTML, then in the content HTML.
fn entry_image(entry: &Entry) -> Option<String> {
    if let Some(url) = entry
        .media
        .iter()
        .flat_map(|object| object.content.iter())
        .find_map(|content| content.url.as_ref().map(|u| u.to_string()))
    {
        return Some(url);
    }
    if let Some(src) = entry.content.as_ref().and_then(|c| c.src.as_ref()) {
        return Some(src.href.clone());
    }
    if let Some(url) = entry
        .summary
        .as_ref()
        .and_then(|t| extract::first_image_url(&t.content))
    {
        return Some(url);
    }
    entry
        .content
        .as_ref()
        .and_then(|c| c.body.as_ref())
        .and_then(|body| extract::first_image_url(body))
}
