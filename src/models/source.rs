// src/models/source.rs

//! Forum source definitions.

use serde::{Deserialize, Serialize};

/// A forum to harvest threads from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDefinition {
    /// Short name, used as the record id prefix
    pub name: String,

    /// Base URL that relative thread links are resolved against
    pub base_url: String,

    /// URL of the thread listing page
    pub listing_url: String,

    /// CSS selectors for the listing and detail pages
    pub selectors: SourceSelectors,
}

/// CSS selectors used to read a source's pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSelectors {
    /// Selector for each thread container on the listing page
    pub thread: String,

    /// Selector for the title element within a thread container
    pub title: String,

    /// Selector for the link element within a thread container
    pub link: String,

    /// HTML attribute holding the thread link (usually "href")
    #[serde(default = "default_link_attr")]
    pub link_attr: String,

    /// Selector for the post body on the detail page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

fn default_link_attr() -> String {
    "href".to_string()
}

impl SourceSelectors {
    /// Selectors for XenForo thread listings.
    pub fn xenforo() -> Self {
        Self {
            thread: "div.structItem--thread".to_string(),
            title: "div.structItem-title a".to_string(),
            link: "div.structItem-title a".to_string(),
            link_attr: default_link_attr(),
            body: Some("article.message-body".to_string()),
        }
    }
}

impl SourceDefinition {
    /// Every selector this source declares, for validation.
    pub fn selector_list(&self) -> Vec<&str> {
        let s = &self.selectors;
        let mut list = vec![s.thread.as_str(), s.title.as_str(), s.link.as_str()];
        if let Some(body) = &s.body {
            list.push(body.as_str());
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_attr_defaults_to_href() {
        let toml_src = r#"
            name = "forum"
            base_url = "https://forum.example.com"
            listing_url = "https://forum.example.com/electrics/"

            [selectors]
            thread = "li.topic"
            title = "a.title"
            link = "a.title"
        "#;
        let source: SourceDefinition = toml::from_str(toml_src).unwrap();
        assert_eq!(source.selectors.link_attr, "href");
        assert!(source.selectors.body.is_none());
        assert_eq!(source.selector_list().len(), 3);
    }
}
