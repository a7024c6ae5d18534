use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use anyhow::Result;

/// Translation tables bundled with the binary, keyed by language code.
static LANGUAGES_JSON: &str = include_str!("../data/languages.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    En,
    Hi,
    Te,
    Ta,
    Kn,
    Ml,
    Mr,
    Gu,
    Bn,
    Pa,
    Or,
}

impl LanguageCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageCode::En => "en",
            LanguageCode::Hi => "hi",
            LanguageCode::Te => "te",
            LanguageCode::Ta => "ta",
            LanguageCode::Kn => "kn",
            LanguageCode::Ml => "ml",
            LanguageCode::Mr => "mr",
            LanguageCode::Gu => "gu",
            LanguageCode::Bn => "bn",
            LanguageCode::Pa => "pa",
            LanguageCode::Or => "or",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "en" => Some(LanguageCode::En),
            "hi" => Some(LanguageCode::Hi),
            "te" => Some(LanguageCode::Te),
            "ta" => Some(LanguageCode::Ta),
            "kn" => Some(LanguageCode::Kn),
            "ml" => Some(LanguageCode::Ml),
            "mr" => Some(LanguageCode::Mr),
            "gu" => Some(LanguageCode::Gu),
            "bn" => Some(LanguageCode::Bn),
            "pa" => Some(LanguageCode::Pa),
            "or" => Some(LanguageCode::Or),
            _ => None,
        }
    }
}

/// A supported language as shown in the language selector.
pub struct LanguageInfo {
    pub code: LanguageCode,
    pub name: &'static str,
    pub native_name: &'static str,
}

pub static LANGUAGES: &[LanguageInfo] = &[
    LanguageInfo { code: LanguageCode::En, name: "English", native_name: "English" },
    LanguageInfo { code: LanguageCode::Hi, name: "Hindi", native_name: "हिंदी" },
    LanguageInfo { code: LanguageCode::Te, name: "Telugu", native_name: "తెలుగు" },
    LanguageInfo { code: LanguageCode::Ta, name: "Tamil", native_name: "தமிழ்" },
    LanguageInfo { code: LanguageCode::Kn, name: "Kannada", native_name: "ಕನ್ನಡ" },
    LanguageInfo { code: LanguageCode::Ml, name: "Malayalam", native_name: "മലയാളം" },
    LanguageInfo { code: LanguageCode::Mr, name: "Marathi", native_name: "मराठी" },
    LanguageInfo { code: LanguageCode::Gu, name: "Gujarati", native_name: "ગુજરાતી" },
    LanguageInfo { code: LanguageCode::Bn, name: "Bengali", native_name: "বাংলা" },
    LanguageInfo { code: LanguageCode::Pa, name: "Punjabi", native_name: "ਪੰਜਾਬੀ" },
    LanguageInfo { code: LanguageCode::Or, name: "Odia", native_name: "ଓଡ଼ିଆ" },
];

pub fn language_info(code: LanguageCode) -> &'static LanguageInfo {
    LANGUAGES
        .iter()
        .find(|l| l.code == code)
        .unwrap_or(&LANGUAGES[0])
}

/// Static key -> string tables for all supported languages.
///
/// Lookup falls back from the active language to English, and finally to
/// the key itself, so `translate` never fails.
pub struct Translations {
    tables: HashMap<String, HashMap<String, String>>,
}

impl Translations {
    pub fn load() -> Result<Self> {
        let tables: HashMap<String, HashMap<String, String>> =
            serde_json::from_str(LANGUAGES_JSON)?;
        Ok(Self { tables })
    }

    pub fn translate(&self, language: LanguageCode, key: &str) -> String {
        if let Some(table) = self.tables.get(language.as_str()) {
            if let Some(value) = table.get(key) {
                return value.clone();
            }
        }
        if let Some(base) = self.tables.get(LanguageCode::En.as_str()) {
            if let Some(value) = base.get(key) {
                return value.clone();
            }
        }
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_returns_active_table_value() {
        let t = Translations::load().unwrap();
        assert_eq!(t.translate(LanguageCode::Hi, "app_name"), "किसान मित्र");
    }

    #[test]
    fn translate_falls_back_to_english() {
        let t = Translations::load().unwrap();
        // Telugu table is partial; feature_soil only exists in English.
        assert_eq!(t.translate(LanguageCode::Te, "feature_soil"), "Soil Analysis");
    }

    #[test]
    fn translate_returns_key_on_double_miss() {
        let t = Translations::load().unwrap();
        assert_eq!(t.translate(LanguageCode::Hi, "no_such_key"), "no_such_key");
    }

    #[test]
    fn every_language_has_a_table() {
        let t = Translations::load().unwrap();
        for info in LANGUAGES {
            assert!(
                t.tables.contains_key(info.code.as_str()),
                "missing table for {}",
                info.code.as_str()
            );
        }
    }

    #[test]
    fn from_code_round_trips() {
        for info in LANGUAGES {
            assert_eq!(LanguageCode::from_code(info.code.as_str()), Some(info.code));
        }
        assert_eq!(LanguageCode::from_code("xx"), None);
    }
}
