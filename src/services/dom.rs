// src/services/dom.rs

//! DOM queries over fetched pages.
//!
//! The harvester only needs three things from markup: the thread entries
//! of a listing page, their title text and link attribute, and the readable
//! text of a detail page. Everything selector-specific stays in here.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::SourceSelectors;
use crate::utils::normalize_whitespace;

/// A thread as it appears on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadEntry {
    /// Trimmed title text, if the title selector matched
    pub title: Option<String>,
    /// Raw link attribute, if the link selector matched and carried it
    pub href: Option<String>,
}

/// Parse a CSS selector, mapping syntax errors to `AppError::Selector`.
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Read at most `limit` thread entries from a listing page, in document order.
pub fn thread_entries(
    html: &str,
    selectors: &SourceSelectors,
    limit: usize,
) -> Result<Vec<ThreadEntry>> {
    let thread_sel = parse_selector(&selectors.thread)?;
    let title_sel = parse_selector(&selectors.title)?;
    let link_sel = parse_selector(&selectors.link)?;

    let document = Html::parse_document(html);
    let entries = document
        .select(&thread_sel)
        .take(limit)
        .map(|row| ThreadEntry {
            title: row
                .select(&title_sel)
                .next()
                .map(element_text)
                .filter(|t| !t.is_empty()),
            href: row
                .select(&link_sel)
                .next()
                .and_then(|el| el.value().attr(&selectors.link_attr))
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty()),
        })
        .collect();

    Ok(entries)
}

/// Readable text of a detail page.
///
/// With a body selector, the text of every matching element is joined;
/// if nothing matches, or no selector is given, the whole document is used.
pub fn page_text(html: &str, body_selector: Option<&str>) -> Result<String> {
    let document = Html::parse_document(html);

    if let Some(selector) = body_selector {
        let body_sel = parse_selector(selector)?;
        let parts: Vec<String> = document.select(&body_sel).map(element_text).collect();
        if !parts.is_empty() {
            return Ok(parts.join(" "));
        }
    }

    Ok(normalize_whitespace(
        &document.root_element().text().collect::<Vec<_>>().join(" "),
    ))
}

fn element_text(el: ElementRef<'_>) -> String {
    normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(n: usize) -> String {
        let rows: String = (1..=n)
            .map(|i| {
                format!(
                    r#"<div class="structItem structItem--thread">
                         <div class="structItem-title"><a href="/forums/threads/t.{i}/">  Thread {i} </a></div>
                       </div>"#
                )
            })
            .collect();
        format!("<html><body>{rows}</body></html>")
    }

    #[test]
    fn test_parse_selector_valid() {
        assert!(parse_selector("div.structItem--thread").is_ok());
        assert!(parse_selector("tr:has(a)").is_ok());
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(matches!(
            parse_selector("[[invalid"),
            Err(AppError::Selector { .. })
        ));
    }

    #[test]
    fn test_thread_entries_are_capped_in_document_order() {
        let entries = thread_entries(&listing(12), &SourceSelectors::xenforo(), 10).unwrap();
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0].title.as_deref(), Some("Thread 1"));
        assert_eq!(entries[0].href.as_deref(), Some("/forums/threads/t.1/"));
        assert_eq!(entries[9].title.as_deref(), Some("Thread 10"));
    }

    #[test]
    fn test_thread_entry_without_link() {
        let html = r#"<div class="structItem--thread">
                        <div class="structItem-title"><a>No link here</a></div>
                      </div>"#;
        let entries = thread_entries(html, &SourceSelectors::xenforo(), 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title.as_deref(), Some("No link here"));
        assert_eq!(entries[0].href, None);
    }

    #[test]
    fn test_thread_entry_with_empty_title() {
        let html = r#"<div class="structItem--thread">
                        <div class="structItem-title"><a href="/t/1">   </a></div>
                      </div>"#;
        let entries = thread_entries(html, &SourceSelectors::xenforo(), 10).unwrap();
        assert_eq!(entries[0].title, None);
    }

    #[test]
    fn test_page_text_prefers_body_selector() {
        let html = r#"<html><body><nav>Menu alternator</nav>
                      <article class="message-body">Code  P0300
                      here</article></body></html>"#;
        let text = page_text(html, Some("article.message-body")).unwrap();
        assert_eq!(text, "Code P0300 here");
    }

    #[test]
    fn test_page_text_falls_back_to_document() {
        let html = "<html><body><p>Dead battery</p><p>again</p></body></html>";
        let text = page_text(html, Some("article.missing")).unwrap();
        assert!(text.contains("Dead battery"));
        assert!(text.contains("again"));
    }
}
