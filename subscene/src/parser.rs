//! Extraction of subtitle rows and site-search results from listing pages.

use crate::language;
use crate::types::{CandidateId, SubtitleCandidate};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

static SUBTITLE_ROWS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table tbody tr").expect("Valid row selector"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("Valid anchor selector"));
static SEARCH_RESULT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.search-result").expect("Valid search result selector"));

/// Relevance headings of the site-search page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    Exact,
    Close,
    Popular,
}

impl Relevance {
    fn class_name(&self) -> &'static str {
        match self {
            Relevance::Exact => "exact",
            Relevance::Close => "close",
            Relevance::Popular => "popular",
        }
    }
}

/// One link of the site-search result list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEntry {
    pub title: String,
    pub href: String,
}

impl SearchEntry {
    /// Year in the first parenthesized group, e.g. `The Old Guard (2020)`
    pub fn year(&self) -> Option<i32> {
        self.title.split(['(', ')']).nth(1)?.trim().parse().ok()
    }
}

/// Drop line breaks and tabs, then trim
pub fn remove_extra_characters(text: &str) -> String {
    text.replace("\r\n", "")
        .replace(['\r', '\t'], "")
        .trim()
        .to_string()
}

/// Parse the subtitle table of a title listing page.
///
/// Rows without a release name are skipped.
pub fn extract_subtitle_rows(
    html: &str,
    language: &str,
    fallback_language: &str,
) -> Vec<SubtitleCandidate> {
    let document = Html::parse_document(html);
    let iso_language = language::to_iso(language, fallback_language);

    let candidates: Vec<SubtitleCandidate> = document
        .select(&SUBTITLE_ROWS)
        .filter_map(|row| parse_subtitle_row(row, language, &iso_language))
        .collect();

    debug!("Extracted {} subtitle rows", candidates.len());
    candidates
}

fn parse_subtitle_row(
    row: ElementRef<'_>,
    language: &str,
    iso_language: &str,
) -> Option<SubtitleCandidate> {
    let anchor = row.select(&ANCHOR).next()?;

    let name = child_elements(anchor, "span")
        .nth(1)
        .map(|span| remove_extra_characters(&span.text().collect::<String>()))
        .filter(|name| !name.is_empty())?;

    let href = anchor.value().attr("href")?;

    Some(SubtitleCandidate {
        id: CandidateId::new(href, language).encode(),
        name,
        author: cell_text(row, "a6"),
        uploader_group: cell_text(row, "a5"),
        language: iso_language.to_string(),
        // the site does not distinguish hash matches
        is_hash_match: true,
        comment: None,
    })
}

fn child_elements<'a>(parent: ElementRef<'a>, tag: &'a str) -> impl Iterator<Item = ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |child| child.value().name() == tag)
}

fn cell_text(row: ElementRef<'_>, class: &str) -> Option<String> {
    child_elements(row, "td")
        .find(|cell| cell.value().classes().any(|c| c == class))
        .map(|cell| remove_extra_characters(&cell.text().collect::<String>()))
        .filter(|text| !text.is_empty())
}

/// Parse a site-search page.
///
/// Returns `None` unless the result container carries one of the `accepted`
/// relevance headings; otherwise every link of its first list.
pub fn parse_search_results(html: &str, accepted: &[Relevance]) -> Option<Vec<SearchEntry>> {
    let document = Html::parse_document(html);
    let container = document.select(&SEARCH_RESULT).next()?;

    let relevance = accepted.iter().find(|relevance| {
        child_elements(container, "h2")
            .any(|heading| heading.value().classes().any(|c| c == relevance.class_name()))
    });
    let Some(relevance) = relevance else {
        debug!("Search result has no {:?} heading", accepted);
        return None;
    };
    debug!("Using {:?} search results", relevance);

    let list = child_elements(container, "ul").next()?;
    let entries = list
        .select(&ANCHOR)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            Some(SearchEntry {
                title: remove_extra_characters(&link.text().collect::<String>()),
                href: href.to_string(),
            })
        })
        .collect();

    Some(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<html><body>
<div class="content">
<table>
<thead><tr><td>Name</td></tr></thead>
<tbody>
<tr>
    <td class="a1">
        <a href="/subtitles/the-old-guard/farsi_persian/2236170">
            <span class="l r positive-icon">
                Farsi/Persian
            </span>
            <span>
                The.Old.Guard.2020.720p.WEBRip
            </span>
        </a>
    </td>
    <td class="a3"></td>
    <td class="a5"><a href="/u/1">	Pooya	</a></td>
    <td class="a6"><div>Synced for WEBRip</div></td>
</tr>
<tr>
    <td class="a1"><a href="/subtitles/the-old-guard/farsi_persian/2236171"><span>Farsi/Persian</span><span>  </span></a></td>
</tr>
<tr>
    <td class="a1"><a href="/subtitles/the-old-guard/farsi_persian/2236172"><span>Farsi/Persian</span><span>The.Old.Guard.2020.1080p</span></a></td>
    <td class="a5">Hamed</td>
</tr>
<tr><td class="empty" colspan="5">ad</td></tr>
</tbody>
</table>
</div>
</body></html>"#;

    #[test]
    fn test_extract_subtitle_rows() {
        let rows = extract_subtitle_rows(LISTING, "per", "eng");
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.name, "The.Old.Guard.2020.720p.WEBRip");
        assert_eq!(first.uploader_group.as_deref(), Some("Pooya"));
        assert_eq!(first.author.as_deref(), Some("Synced for WEBRip"));
        assert_eq!(first.language, "per");
        assert!(first.is_hash_match);

        let id = CandidateId::decode(&first.id).unwrap();
        assert_eq!(id.path, "/subtitles/the-old-guard/farsi_persian/2236170");
        assert_eq!(id.language, "per");

        let second = &rows[1];
        assert_eq!(second.name, "The.Old.Guard.2020.1080p");
        assert_eq!(second.uploader_group.as_deref(), Some("Hamed"));
        assert_eq!(second.author, None);
    }

    #[test]
    fn test_extract_blank_language_uses_fallback() {
        let rows = extract_subtitle_rows(LISTING, "", "fa");
        assert!(rows.iter().all(|row| row.language == "per"));
    }

    #[test]
    fn test_extract_from_page_without_table() {
        assert!(extract_subtitle_rows("<p>Not found</p>", "eng", "eng").is_empty());
        assert!(extract_subtitle_rows("", "eng", "eng").is_empty());
    }

    #[test]
    fn test_remove_extra_characters() {
        assert_eq!(remove_extra_characters("\r\n\t  Name.720p \r\n"), "Name.720p");
        assert_eq!(remove_extra_characters("a\tb"), "ab");
    }

    const SEARCH: &str = r#"<div class="byTitle">
<div class="search-result">
    <h2 class="exact">Exact</h2>
    <ul>
        <li><div class="title"><a href="/subtitles/the-old-guard">The Old Guard (2020)</a></div></li>
        <li><div class="title"><a href="/subtitles/the-old-guard-2017">The Old Guard (2017)</a></div></li>
    </ul>
    <h2 class="close">Close</h2>
    <ul>
        <li><div class="title"><a href="/subtitles/the-old-guard-ii">The Old Guard II (2024)</a></div></li>
    </ul>
</div>
</div>"#;

    #[test]
    fn test_parse_search_results() {
        let entries = parse_search_results(SEARCH, &[Relevance::Exact, Relevance::Close]).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "The Old Guard (2020)");
        assert_eq!(entries[0].href, "/subtitles/the-old-guard");
        assert_eq!(entries[0].year(), Some(2020));
        assert_eq!(entries[1].year(), Some(2017));
    }

    #[test]
    fn test_parse_search_results_requires_accepted_heading() {
        assert!(parse_search_results(SEARCH, &[Relevance::Popular]).is_none());

        let popular_only = r#"<div class="search-result"><h2 class="popular">Popular</h2>
            <ul><li><a href="/subtitles/x">X (2001)</a></li></ul></div>"#;
        assert!(parse_search_results(popular_only, &[Relevance::Exact, Relevance::Close]).is_none());
        let entries = parse_search_results(popular_only, &[Relevance::Popular]).unwrap();
        assert_eq!(entries[0].href, "/subtitles/x");

        let no_heading = r#"<div class="search-result"><ul><li><a href="/x">X</a></li></ul></div>"#;
        assert!(parse_search_results(no_heading, &[Relevance::Exact]).is_none());
        assert!(parse_search_results("<p>nothing</p>", &[Relevance::Exact]).is_none());
    }

    #[test]
    fn test_search_entry_year() {
        let entry = |title: &str| SearchEntry {
            title: title.to_string(),
            href: String::new(),
        };
        assert_eq!(entry("Bright (2017)").year(), Some(2017));
        assert_eq!(entry("Bright").year(), None);
        assert_eq!(entry("Bright (TV)").year(), None);
    }
}
