// src/models/vocabulary.rs

//! Fixed keyword vocabularies for symptom and vehicle detection.

use serde::{Deserialize, Serialize};

/// Keyword lists consulted by the extractor.
///
/// Order matters for brands and models: the first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    /// Symptom phrases, matched as case-insensitive substrings
    #[serde(default = "defaults::symptoms")]
    pub symptoms: Vec<String>,

    /// Known brands in priority order
    #[serde(default = "defaults::brands")]
    pub brands: Vec<BrandEntry>,
}

/// A brand token and the model tokens recognised for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandEntry {
    /// Brand token as it appears in titles
    pub name: String,

    /// Model tokens in priority order
    #[serde(default)]
    pub models: Vec<String>,
}

impl BrandEntry {
    fn new(name: &str, models: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            models: models.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            symptoms: defaults::symptoms(),
            brands: defaults::brands(),
        }
    }
}

mod defaults {
    use super::BrandEntry;

    pub fn symptoms() -> Vec<String> {
        [
            "won't start",
            "check engine",
            "current leak",
            "no charging",
            "rough idle",
            "knocking",
            "dead battery",
            "short circuit",
            "open circuit",
            "ignition module",
            "crank sensor",
            "alternator",
            "не заводится",
            "утечка",
            "нет зарядки",
            "троит",
            "стучит",
            "сел аккумулятор",
            "короткое замыкание",
            "обрыв",
            "модуль зажигания",
            "датчик коленвала",
            "генератор",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    pub fn brands() -> Vec<BrandEntry> {
        vec![
            BrandEntry::new(
                "ваз",
                &["2107", "2109", "2110", "2114", "Приора", "Калина", "Гранта", "Веста", "Нива"],
            ),
            BrandEntry::new(
                "лада",
                &["Приора", "Калина", "Гранта", "Веста", "Ларгус", "Нива", "Granta", "Vesta"],
            ),
            BrandEntry::new(
                "toyota",
                &["Corolla", "Camry", "RAV4", "Land Cruiser", "Prius", "Yaris"],
            ),
            BrandEntry::new("bmw", &["E39", "E46", "E60", "E90", "F10", "X5", "X3"]),
            BrandEntry::new("audi", &["A3", "A4", "A6", "Q5", "Q7", "80", "100"]),
            BrandEntry::new("ford", &["Focus", "Mondeo", "Fiesta", "Kuga", "Transit"]),
            BrandEntry::new("opel", &["Astra", "Vectra", "Corsa", "Insignia", "Zafira"]),
            BrandEntry::new("renault", &["Logan", "Sandero", "Duster", "Megane", "Kaptur"]),
            BrandEntry::new("kia", &["Rio", "Ceed", "Sportage", "Sorento", "Cerato"]),
            BrandEntry::new("hyundai", &["Solaris", "Accent", "Elantra", "Tucson", "Creta"]),
        ]
    }
}
