use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Short, filesystem- and DNS-safe identifier of a challenge.
///
/// Built as `<prefix>-<slug>` from the challenge category and title. The tag
/// names the build directory under `challenges/` and is embedded in container
/// names and hostnames, so the same metadata must always produce the same tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeTag(String);

impl ChallengeTag {
    /// Derive a tag and reject metadata that cannot produce a usable one.
    ///
    /// Fails when the category prefix is shorter than three characters or is not
    /// made of `[a-z0-9]`, or when the title slugifies to nothing.
    pub fn validated(category: &str, title: &str) -> Result<Self, ModelError> {
        let prefix = category_prefix(category);
        if prefix.chars().count() != 3
            || !prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ModelError::ChallengeMisconfigured(format!(
                "category {category:?} does not yield a three-character prefix"
            )));
        }

        let slug = slugify(title);
        if slug.is_empty() {
            return Err(ModelError::ChallengeMisconfigured(format!(
                "title {title:?} has no slug-safe characters"
            )));
        }
        Ok(Self(format!("{prefix}-{slug}")))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChallengeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChallengeTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChallengeTag {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChallengeTag {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Derive the tag for a challenge. Total: never fails and never panics.
pub fn derive_tag(category: &str, title: &str) -> ChallengeTag {
    ChallengeTag(format!("{}-{}", category_prefix(category), slugify(title)))
}

/// Three-letter prefix for a category.
///
/// Known categories map through a fixed table; anything else uses its first
/// three lowercase characters (fewer if the category is shorter).
pub fn category_prefix(category: &str) -> String {
    let lower = category.to_lowercase();
    match lower.as_str() {
        "web" => "web".to_string(),
        "cryptography" => "cry".to_string(),
        "forensics" => "fns".to_string(),
        "reverse engineering" => "rev".to_string(),
        "misc" => "msc".to_string(),
        _ => lower.chars().take(3).collect(),
    }
}

/// Lowercase, spaces to hyphens, drop everything outside `[a-z0-9-]`,
/// collapse hyphen runs and trim hyphens at both ends.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        let c = if c == ' ' { '-' } else { c };
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            continue;
        }
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_tag_for_known_category() {
        let tag = derive_tag("Reverse Engineering", "Baby RE!!");
        assert_eq!(tag.as_str(), "rev-baby-re");
    }

    #[test]
    fn category_table() {
        assert_eq!(category_prefix("Web"), "web");
        assert_eq!(category_prefix("CRYPTOGRAPHY"), "cry");
        assert_eq!(category_prefix("Forensics"), "fns");
        assert_eq!(category_prefix("misc"), "msc");
        assert_eq!(category_prefix("Pwnable"), "pwn");
    }

    #[test]
    fn short_category_does_not_panic() {
        assert_eq!(category_prefix("ab"), "ab");
        assert_eq!(category_prefix(""), "");
        assert_eq!(derive_tag("", "").as_str(), "-");
    }

    #[test]
    fn non_ascii_category_is_sliced_by_chars() {
        assert_eq!(category_prefix("Ünïcode"), "ünï");
    }

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("  Hello,   World -- 2025!  "), "hello-world-2025");
        assert_eq!(slugify("---"), "");
        assert_eq!(slugify("SQL_Injection 101"), "sqlinjection-101");
    }

    #[test]
    fn derive_is_deterministic() {
        let a = derive_tag("Cryptography", "Caesar Shift");
        let b = derive_tag("Cryptography", "Caesar Shift");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "cry-caesar-shift");
    }

    #[test]
    fn validated_rejects_short_category() {
        let err = ChallengeTag::validated("ab", "Title").unwrap_err();
        assert!(matches!(err, ModelError::ChallengeMisconfigured(_)));
    }

    #[test]
    fn validated_rejects_unsafe_prefix() {
        assert!(ChallengeTag::validated("a b c", "Title").is_err());
        assert!(ChallengeTag::validated("Ünïcode", "Title").is_err());
    }

    #[test]
    fn validated_rejects_empty_slug() {
        assert!(ChallengeTag::validated("Web", "!!!").is_err());
    }

    #[test]
    fn validated_matches_derive() {
        let tag = ChallengeTag::validated("Web", "Cookie Thief").unwrap();
        assert_eq!(tag, derive_tag("Web", "Cookie Thief"));
    }
}
