//! Field extraction from catalog HTML pages.
//!
//! These functions are synchronous and own the parsed document for their
//! whole body, so no `Html` value ever lives across an await point.

use crate::error::{HarvestError, Result};
use crate::models::VersionRecord;
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

const VERSION_WRAP: &str = ".gem__version-wrap";
const VERSION_LINK: &str = ".t-list__item";
const VERSION_DATE: &str = "small.gem__version__date";
const VERSION_SIZE: &str = "span[class=\"gem__version__date\"]";
const SPAN: &str = "span";
const PLATFORM: &str = ".platform";
const DESCRIPTION: &str = "#markup";
const CHECKSUM: &str = ".gem__sha";

/// Fields read from a version detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailFields {
    /// Displayed SHA-256 checksum
    pub checksum: String,
    /// Description text
    pub description: String,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| HarvestError::Parse(format!("bad selector {css}: {e:?}")))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn joined_text<'a>(elements: impl Iterator<Item = ElementRef<'a>>) -> String {
    elements
        .flat_map(|element| element.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Parses a date as shown on version rows, e.g. "March 14, 2023"
pub fn parse_display_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    ["%B %d, %Y", "%b %d, %Y", "%Y-%m-%d"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// Extracts one record per version row of a gem's versions page
///
/// Rows without a version link are ignored. Detail URLs are resolved
/// against `page_url`.
pub fn parse_versions_page(name: &str, page_url: &Url, html: &str) -> Result<Vec<VersionRecord>> {
    let wrap_selector = selector(VERSION_WRAP)?;
    let link_selector = selector(VERSION_LINK)?;
    let date_selector = selector(VERSION_DATE)?;
    let size_selector = selector(VERSION_SIZE)?;
    let span_selector = selector(SPAN)?;
    let platform_selector = selector(PLATFORM)?;

    let document = Html::parse_document(html);
    let mut records = Vec::new();

    for wrap in document.select(&wrap_selector) {
        let Some(link) = wrap.select(&link_selector).next() else {
            debug!("Version row without link on {}", page_url);
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            debug!("Version link without href on {}", page_url);
            continue;
        };
        let url = page_url.join(href)?;

        let size = wrap
            .select(&size_selector)
            .next()
            .map(text_of)
            .unwrap_or_default()
            .replace(['(', ')'], "");

        let yanked = wrap
            .select(&span_selector)
            .any(|span| span.text().any(|text| text.contains("yanked")));

        let platform = wrap
            .select(&platform_selector)
            .next()
            .map(text_of)
            .filter(|platform| !platform.is_empty());

        records.push(VersionRecord {
            name: name.to_string(),
            version: text_of(link),
            url: url.to_string(),
            size: size.trim().to_string(),
            published_at: parse_display_date(&joined_text(wrap.select(&date_selector))),
            yanked,
            platform,
        });
    }

    Ok(records)
}

/// Extracts the checksum and description from a version detail page
pub fn parse_detail_page(html: &str) -> Result<DetailFields> {
    let description_selector = selector(DESCRIPTION)?;
    let checksum_selector = selector(CHECKSUM)?;

    let document = Html::parse_document(html);
    Ok(DetailFields {
        checksum: joined_text(document.select(&checksum_selector)),
        description: joined_text(document.select(&description_selector)),
    })
}
