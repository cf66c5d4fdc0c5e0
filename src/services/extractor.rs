// src/services/extractor.rs

//! Fault signal extraction from thread text.
//!
//! Matching is plain case-insensitive substring search over a fixed
//! vocabulary, plus one regular expression for diagnostic trouble codes.

use std::collections::BTreeSet;

use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::Vocabulary;

/// Letter prefix (powertrain, chassis, body, network) and four digits.
const DTC_PATTERN: &str = r"(?i)[PCBU][0-9]{4}";

/// Signals extracted from one thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub symptoms: BTreeSet<String>,
    pub error_codes: BTreeSet<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
}

impl Extraction {
    /// A thread is worth cataloguing when it names a symptom or a code.
    pub fn is_relevant(&self) -> bool {
        !self.symptoms.is_empty() || !self.error_codes.is_empty()
    }
}

/// Vocabulary-driven extractor. Pure; never performs I/O.
#[derive(Debug, Clone)]
pub struct Extractor {
    symptoms: Vec<(String, String)>,
    brands: Vec<BrandMatcher>,
    dtc: Regex,
}

#[derive(Debug, Clone)]
struct BrandMatcher {
    needle: String,
    label: String,
    models: Vec<(String, String)>,
}

impl Extractor {
    /// Build an extractor from a vocabulary.
    pub fn new(vocabulary: &Vocabulary) -> Result<Self> {
        let dtc = Regex::new(DTC_PATTERN)
            .map_err(|e| AppError::config(format!("invalid DTC pattern: {e}")))?;

        let symptoms = vocabulary
            .symptoms
            .iter()
            .filter(|k| !k.trim().is_empty())
            .map(|k| (k.to_lowercase(), k.clone()))
            .collect();

        let brands = vocabulary
            .brands
            .iter()
            .filter(|b| !b.name.trim().is_empty())
            .map(|b| BrandMatcher {
                needle: b.name.to_lowercase(),
                label: b.name.to_uppercase(),
                models: b
                    .models
                    .iter()
                    .filter(|m| !m.trim().is_empty())
                    .map(|m| (m.to_lowercase(), m.clone()))
                    .collect(),
            })
            .collect();

        Ok(Self {
            symptoms,
            brands,
            dtc,
        })
    }

    /// Extract symptoms, codes and the vehicle guess from a thread.
    pub fn extract(&self, title: &str, body: &str) -> Extraction {
        let title_lower = title.to_lowercase();
        let haystack = format!("{} {}", title_lower, body.to_lowercase());

        let symptoms = self
            .symptoms
            .iter()
            .filter(|(needle, _)| haystack.contains(needle.as_str()))
            .map(|(_, keyword)| keyword.clone())
            .collect();

        let (brand, model) = self.vehicle(&title_lower);

        Extraction {
            symptoms,
            error_codes: self.error_codes(body),
            brand,
            model,
        }
    }

    /// Every diagnostic trouble code in `text`, uppercased.
    pub fn error_codes(&self, text: &str) -> BTreeSet<String> {
        self.dtc
            .find_iter(text)
            .map(|m| m.as_str().to_uppercase())
            .collect()
    }

    fn vehicle(&self, title_lower: &str) -> (Option<String>, Option<String>) {
        let Some(brand) = self
            .brands
            .iter()
            .find(|b| title_lower.contains(b.needle.as_str()))
        else {
            return (None, None);
        };

        let model = brand
            .models
            .iter()
            .find(|(needle, _)| title_lower.contains(needle.as_str()))
            .map(|(_, label)| label.clone());

        (Some(brand.label.clone()), model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BrandEntry;

    fn extractor() -> Extractor {
        Extractor::new(&Vocabulary::default()).unwrap()
    }

    #[test]
    fn test_toyota_corolla_scenario() {
        let title = "Toyota Corolla check engine P0300 won't start";
        let ex = extractor().extract(title, title);
        assert_eq!(ex.brand.as_deref(), Some("TOYOTA"));
        assert_eq!(ex.model.as_deref(), Some("Corolla"));
        assert!(ex.symptoms.contains("check engine"));
        assert!(ex.symptoms.contains("won't start"));
        assert!(ex.error_codes.contains("P0300"));
        assert!(ex.is_relevant());
    }

    #[test]
    fn test_brand_without_known_model() {
        let ex = extractor().extract("Toyota Hilux alternator whine", "");
        assert_eq!(ex.brand.as_deref(), Some("TOYOTA"));
        assert_eq!(ex.model, None);
    }

    #[test]
    fn test_model_never_set_without_brand() {
        let ex = extractor().extract("Corolla dead battery", "");
        assert_eq!(ex.brand, None);
        assert_eq!(ex.model, None);
    }

    #[test]
    fn test_brand_only_read_from_title() {
        let ex = extractor().extract("Engine knocking", "My old Toyota Corolla");
        assert_eq!(ex.brand, None);
        assert!(ex.symptoms.contains("knocking"));
    }

    #[test]
    fn test_first_brand_in_vocabulary_order_wins() {
        let ex = extractor().extract("BMW vs Audi: short circuit", "");
        // "bmw" precedes "audi" in the default vocabulary
        assert_eq!(ex.brand.as_deref(), Some("BMW"));
    }

    #[test]
    fn test_cyrillic_brand_is_uppercased() {
        let ex = extractor().extract("ВАЗ 2110 не заводится", "");
        assert_eq!(ex.brand.as_deref(), Some("ВАЗ"));
        assert_eq!(ex.model.as_deref(), Some("2110"));
        assert!(ex.symptoms.contains("не заводится"));
    }

    #[test]
    fn test_model_priority_follows_vocabulary_order() {
        let vocab = Vocabulary {
            symptoms: vec![],
            brands: vec![BrandEntry {
                name: "ford".into(),
                models: vec!["Focus".into(), "Fiesta".into()],
            }],
        };
        let ex = Extractor::new(&vocab)
            .unwrap()
            .extract("Ford Fiesta or Focus?", "");
        assert_eq!(ex.model.as_deref(), Some("Focus"));
    }

    #[test]
    fn test_error_codes_case_insensitive_and_deduplicated() {
        let ex = extractor().extract(
            "",
            "p0300 then P0300 again, also c1234, b0001 and U0100; X1234 is not one",
        );
        let expected: BTreeSet<String> = ["P0300", "C1234", "B0001", "U0100"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(ex.error_codes, expected);
    }

    #[test]
    fn test_error_codes_independent_of_order() {
        let e = extractor();
        assert_eq!(
            e.error_codes("P0171 U0100 P0300"),
            e.error_codes("P0300 P0171 U0100")
        );
    }

    #[test]
    fn test_codes_only_come_from_body() {
        let ex = extractor().extract("P0420 in title", "nothing here");
        assert!(ex.error_codes.is_empty());
    }

    #[test]
    fn test_irrelevant_thread() {
        let ex = extractor().extract("Selling winter tyres", "Nearly new, Toyota fit");
        assert!(!ex.is_relevant());
    }

    #[test]
    fn test_code_alone_is_relevant() {
        let ex = extractor().extract("Help", "Scanner shows P0562");
        assert!(ex.symptoms.is_empty());
        assert!(ex.is_relevant());
    }
}
