//! Resource slugs

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ErrorKind, Result, Rule, ValidationError};

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").unwrap());

/// Lowercase, dash-separated slug derived from a display name
///
/// `"My Workflow!"` becomes `"my-workflow"`.
pub fn generate_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        let ch = if ch.is_ascii_alphanumeric() {
            ch.to_ascii_lowercase()
        } else {
            '-'
        };
        if ch == '-' && (slug.is_empty() || slug.ends_with('-')) {
            continue;
        }
        slug.push(ch);
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if SLUG_RE.is_match(slug) {
        return Ok(());
    }
    Err(ValidationError::new(
        ErrorKind::InvalidSlug,
        "slug",
        Rule::Format,
        "slug must be lowercase alphanumerics separated by single dashes",
    )
    .with_value(slug)
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("My Workflow"), "my-workflow");
        assert_eq!(generate_slug("  Daily -- Sync!  "), "daily-sync");
        assert_eq!(generate_slug("data_pipeline v2"), "data-pipeline-v2");
        assert_eq!(generate_slug("already-a-slug"), "already-a-slug");
        assert_eq!(generate_slug("!!!"), "");
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("daily-sync").is_ok());
        assert!(validate_slug("a").is_ok());
        for bad in ["", "-lead", "trail-", "Upper", "under_score", "sp ace"] {
            let err = validate_slug(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidSlug, "{bad:?}");
        }
    }

    #[test]
    fn test_generated_slugs_validate() {
        for name in ["Customer Onboarding", "ETL: nightly (v3)", "x"] {
            assert!(validate_slug(&generate_slug(name)).is_ok(), "{name}");
        }
    }
}
