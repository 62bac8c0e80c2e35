// src/feed/opml.rs
//! Source loader: an OPML subscription document in, an ordered list of feed
//! URLs out. Order follows document order (depth-first through nested
//! outlines) and duplicates are kept; malformed XML is fatal for the cycle
//! that tried to load it.

use anyhow::{Context, Result};
use quick_xml::de::from_str;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Opml {
    body: Body,
}

#[derive(Debug, Deserialize)]
struct Body {
    #[serde(rename = "outline", default)]
    outlines: Vec<Outline>,
}

#[derive(Debug, Deserialize)]
struct Outline {
    #[serde(rename = "@xmlUrl")]
    xml_url: Option<String>,
    #[serde(rename = "outline", default)]
    children: Vec<Outline>,
}

/// Every `outline` element carrying a non-empty `xmlUrl` attribute names one
/// feed, wherever it sits in the outline tree.
pub fn feed_urls(opml: &str) -> Result<Vec<String>> {
    let doc: Opml = from_str(opml).context("parsing opml document")?;
    let mut urls = Vec::new();
    for outline in &doc.body.outlines {
        collect(outline, &mut urls);
    }
    Ok(urls)
}

fn collect(outline: &Outline, urls: &mut Vec<String>) {
    if let Some(url) = &outline.xml_url {
        if !url.is_empty() {
            urls.push(url.clone());
        }
    }
    for child in &outline.children {
        collect(child, urls);
    }
}
