//! Typed schema of the site settings store.
//!
//! Raw rows hold arbitrary JSON. Every known key has a decoder and a
//! default here, so readers always see a complete, valid `SiteSettings`.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingError {
    #[error("Setting '{key}' expects {expected}")]
    InvalidValue { key: String, expected: &'static str },
    #[error("Unknown setting '{0}'")]
    UnknownKey(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteSettings {
    pub site_name: String,
    pub site_tagline: String,
    pub hero_title: String,
    pub hero_subtitle: String,
    pub typing_quotes: Vec<String>,
    pub about_title: String,
    pub about_description: String,
    pub words_to_live_by_title: String,
    pub words_to_live_by: Vec<String>,
    pub footer_text: String,
    pub contact_email: String,
    pub social_instagram: String,
    pub social_linkedin: String,
    pub meta_description: String,
    pub meta_keywords: String,
    pub comments_require_approval: bool,
    pub max_upload_size_mb: u64,
}

impl Default for SiteSettings {
    fn default() -> Self {
        SiteSettings {
            site_name: "The Unfiltered Voice".to_string(),
            site_tagline: "Raw thoughts, honest words".to_string(),
            hero_title: "The Unfiltered Voice".to_string(),
            hero_subtitle: "A space for honest conversations about mental health, current affairs, creative writing and books.".to_string(),
            typing_quotes: vec![
                "Every voice matters.".to_string(),
                "Words have the power to heal.".to_string(),
                "Speak your truth, unfiltered.".to_string(),
            ],
            about_title: "About This Space".to_string(),
            about_description: "A personal corner of the internet for unfiltered thoughts.".to_string(),
            words_to_live_by_title: "Words to Live By".to_string(),
            words_to_live_by: vec![
                "Be kind to your mind.".to_string(),
                "Read widely, think deeply.".to_string(),
            ],
            footer_text: "Made with love and a lot of coffee.".to_string(),
            contact_email: "hello@unfilteredvoice.me".to_string(),
            social_instagram: String::new(),
            social_linkedin: String::new(),
            meta_description: "Personal blog about mental health, current affairs, creative writing and books.".to_string(),
            meta_keywords: "mental health, current affairs, creative writing, books, blog".to_string(),
            comments_require_approval: true,
            max_upload_size_mb: 10,
        }
    }
}

/// Metadata used when seeding a key for the first time.
pub struct SettingDefault {
    pub key: &'static str,
    pub value: Value,
    pub category: &'static str,
    pub description: &'static str,
}

impl SiteSettings {
    /// Builds settings from stored rows. Missing keys keep their default.
    /// Invalid values also keep their default and are reported back.
    pub fn from_rows<'a, I>(rows: I) -> (Self, Vec<SettingError>)
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let mut settings = SiteSettings::default();
        let mut issues = Vec::new();
        for (key, value) in rows {
            match settings.apply(key, value) {
                Ok(()) => {}
                // Keys written by older frontends are kept in the table but ignored here.
                Err(SettingError::UnknownKey(_)) => {}
                Err(e) => issues.push(e),
            }
        }
        (settings, issues)
    }

    /// Decodes a single key into this struct.
    pub fn apply(&mut self, key: &str, value: &Value) -> Result<(), SettingError> {
        match key {
            "site_name" => self.site_name = decode_text(key, value)?,
            "site_tagline" => self.site_tagline = decode_text(key, value)?,
            "hero_title" => self.hero_title = decode_text(key, value)?,
            "hero_subtitle" => self.hero_subtitle = decode_text(key, value)?,
            "typing_quotes" => self.typing_quotes = decode_text_list(key, value)?,
            "about_title" => self.about_title = decode_text(key, value)?,
            "about_description" => self.about_description = decode_text(key, value)?,
            "words_to_live_by_title" => self.words_to_live_by_title = decode_text(key, value)?,
            "words_to_live_by" => self.words_to_live_by = decode_text_list(key, value)?,
            "footer_text" => self.footer_text = decode_text(key, value)?,
            "contact_email" => self.contact_email = decode_text(key, value)?,
            "social_instagram" => self.social_instagram = decode_optional_text(key, value)?,
            "social_linkedin" => self.social_linkedin = decode_optional_text(key, value)?,
            "meta_description" => self.meta_description = decode_text(key, value)?,
            "meta_keywords" => self.meta_keywords = decode_text(key, value)?,
            "comments_require_approval" => self.comments_require_approval = decode_bool(key, value)?,
            "max_upload_size_mb" => self.max_upload_size_mb = decode_positive_int(key, value)?,
            other => return Err(SettingError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Checks a value for a known key without keeping it.
    pub fn validate(key: &str, value: &Value) -> Result<(), SettingError> {
        SiteSettings::default().apply(key, value)
    }

    pub fn default_rows() -> Vec<SettingDefault> {
        let d = SiteSettings::default();
        vec![
            row("site_name", json!(d.site_name), "general", "Name of the site"),
            row("site_tagline", json!(d.site_tagline), "general", "Short tagline"),
            row("hero_title", json!(d.hero_title), "homepage", "Homepage hero title"),
            row("hero_subtitle", json!(d.hero_subtitle), "homepage", "Homepage hero subtitle"),
            row("typing_quotes", json!(d.typing_quotes), "homepage", "Rotating quotes in the hero"),
            row("about_title", json!(d.about_title), "homepage", "About section title"),
            row("about_description", json!(d.about_description), "homepage", "About section text"),
            row("words_to_live_by_title", json!(d.words_to_live_by_title), "homepage", "Words to live by title"),
            row("words_to_live_by", json!(d.words_to_live_by), "homepage", "Words to live by list"),
            row("footer_text", json!(d.footer_text), "general", "Footer text"),
            row("contact_email", json!(d.contact_email), "contact", "Public contact address"),
            row("social_instagram", json!(d.social_instagram), "social", "Instagram profile URL"),
            row("social_linkedin", json!(d.social_linkedin), "social", "LinkedIn profile URL"),
            row("meta_description", json!(d.meta_description), "seo", "Default meta description"),
            row("meta_keywords", json!(d.meta_keywords), "seo", "Default meta keywords"),
            row("comments_require_approval", json!(d.comments_require_approval), "moderation", "Hide new comments until approved"),
            row("max_upload_size_mb", json!(d.max_upload_size_mb), "media", "Maximum upload size in megabytes"),
        ]
    }
}

fn row(key: &'static str, value: Value, category: &'static str, description: &'static str) -> SettingDefault {
    SettingDefault { key, value, category, description }
}

// An empty string falls back to the default, like a missing key.
fn decode_text(key: &str, value: &Value) -> Result<String, SettingError> {
    match value.as_str().map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(SettingError::InvalidValue { key: key.to_string(), expected: "a non-empty string" }),
    }
}

fn decode_optional_text(key: &str, value: &Value) -> Result<String, SettingError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.trim().to_string()),
        _ => Err(SettingError::InvalidValue { key: key.to_string(), expected: "a string" }),
    }
}

fn decode_text_list(key: &str, value: &Value) -> Result<Vec<String>, SettingError> {
    let invalid = || SettingError::InvalidValue { key: key.to_string(), expected: "a non-empty list of strings" };
    let items = value.as_array().ok_or_else(invalid)?;
    let list = items
        .iter()
        .map(|v| v.as_str().map(|s| s.trim().to_string()).ok_or_else(invalid))
        .collect::<Result<Vec<_>, _>>()?;
    if list.is_empty() {
        return Err(invalid());
    }
    Ok(list)
}

fn decode_bool(key: &str, value: &Value) -> Result<bool, SettingError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "true" => Ok(true),
        Value::String(s) if s == "false" => Ok(false),
        _ => Err(SettingError::InvalidValue { key: key.to_string(), expected: "a boolean" }),
    }
}

fn decode_positive_int(key: &str, value: &Value) -> Result<u64, SettingError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .filter(|n| *n > 0)
        .ok_or_else(|| SettingError::InvalidValue { key: key.to_string(), expected: "a positive integer" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let (settings, issues) = SiteSettings::from_rows(Vec::<(&str, &Value)>::new());
        assert_eq!(settings, SiteSettings::default());
        assert!(issues.is_empty());
    }

    #[test]
    fn invalid_values_are_reported_and_ignored() {
        let name = json!("My Blog");
        let quotes = json!("not a list");
        let approval = json!(false);
        let rows = vec![
            ("site_name", &name),
            ("typing_quotes", &quotes),
            ("comments_require_approval", &approval),
        ];
        let (settings, issues) = SiteSettings::from_rows(rows);
        assert_eq!(settings.site_name, "My Blog");
        assert_eq!(settings.typing_quotes, SiteSettings::default().typing_quotes);
        assert!(!settings.comments_require_approval);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn empty_text_is_rejected() {
        assert!(SiteSettings::validate("hero_title", &json!("   ")).is_err());
        assert!(SiteSettings::validate("social_instagram", &json!("")).is_ok());
        assert_eq!(
            SiteSettings::validate("nope", &json!(1)),
            Err(SettingError::UnknownKey("nope".to_string()))
        );
    }

    #[test]
    fn upload_limit_accepts_numeric_strings() {
        let mut settings = SiteSettings::default();
        settings.apply("max_upload_size_mb", &json!("25")).unwrap();
        assert_eq!(settings.max_upload_size_mb, 25);
        assert!(settings.apply("max_upload_size_mb", &json!(0)).is_err());
    }

    #[test]
    fn every_default_row_decodes() {
        for default in SiteSettings::default_rows() {
            assert!(SiteSettings::validate(default.key, &default.value).is_ok(), "{}", default.key);
        }
    }
}
