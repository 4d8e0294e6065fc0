// ─────────────────────────────────────────────────────────────────────
// SpiralSafe — ATOM Tag Generator
// ─────────────────────────────────────────────────────────────────────
//! Human-legible decision identifiers:
//! `ATOM-<CATEGORY>-<YYYYMMDD>-<RND>-<slug>`.
//!
//! Uniqueness is probabilistic only. Two tags for the same category,
//! day and slug collide with probability 1/36³ per pair.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use rand::Rng;

use spiralsafe_types::SpiralError;

const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TOKEN_LEN: usize = 3;
const SLUG_MAX: usize = 20;

/// Lowercase, spaces to dashes, first 20 characters.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .replace(' ', "-")
        .chars()
        .take(SLUG_MAX)
        .collect()
}

/// A parsed ATOM tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomTag {
    pub category: String,
    pub date: NaiveDate,
    pub token: String,
    pub slug: String,
}

impl AtomTag {
    /// Build a tag for `name` on `date`, drawing the token from `rng`.
    pub fn generate_with<R: Rng>(
        category: &str,
        name: &str,
        date: NaiveDate,
        rng: &mut R,
    ) -> Self {
        let token = (0..TOKEN_LEN)
            .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
            .collect();
        Self {
            category: category.to_uppercase().replace([' ', '-'], "_"),
            date,
            token,
            slug: slugify(name),
        }
    }

    /// Build a tag for today (UTC) with a thread-local RNG.
    pub fn generate(category: &str, name: &str) -> Self {
        Self::generate_with(category, name, Utc::now().date_naive(), &mut rand::thread_rng())
    }
}

impl fmt::Display for AtomTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ATOM-{}-{}-{}-{}",
            self.category,
            self.date.format("%Y%m%d"),
            self.token,
            self.slug
        )
    }
}

impl FromStr for AtomTag {
    type Err = SpiralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || SpiralError::Validation(format!("malformed ATOM tag: {s}"));
        let mut parts = s.splitn(5, '-');
        if parts.next() != Some("ATOM") {
            return Err(bad());
        }
        let category = parts.next().filter(|c| !c.is_empty()).ok_or_else(bad)?;
        let date = parts
            .next()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
            .ok_or_else(bad)?;
        let token = parts
            .next()
            .filter(|t| t.len() == TOKEN_LEN && t.bytes().all(|b| TOKEN_ALPHABET.contains(&b)))
            .ok_or_else(bad)?;
        let slug = parts.next().unwrap_or_default();
        Ok(Self {
            category: category.to_string(),
            date,
            token: token.to_string(),
            slug: slug.to_string(),
        })
    }
}

/// Convenience: a fresh tag rendered as a string.
pub fn atom_tag(category: &str, name: &str) -> String {
    AtomTag::generate(category, name).to_string()
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 17).unwrap()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("CNOT Gate"), "cnot-gate");
        assert_eq!(slugify("A very long circuit name indeed"), "a-very-long-circuit-");
    }

    #[test]
    fn test_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let tag = AtomTag::generate_with("qr", "Hadamard Gate Demo", date(), &mut rng).to_string();
        assert!(tag.starts_with("ATOM-QR-20260117-"));
        assert!(tag.ends_with("-hadamard-gate-demo"));
        let token = &tag["ATOM-QR-20260117-".len().."ATOM-QR-20260117-".len() + 3];
        assert!(token.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let a = AtomTag::generate_with("INFRA", "scale web", date(), &mut StdRng::seed_from_u64(1));
        let b = AtomTag::generate_with("INFRA", "scale web", date(), &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_category_normalised() {
        let tag = AtomTag::generate_with("pr review", "x", date(), &mut StdRng::seed_from_u64(3));
        assert_eq!(tag.category, "PR_REVIEW");
    }

    #[test]
    fn test_parse_roundtrip_with_dashed_slug() {
        let tag = AtomTag::generate_with("QR", "cnot gate", date(), &mut StdRng::seed_from_u64(9));
        let parsed: AtomTag = tag.to_string().parse().unwrap();
        assert_eq!(parsed, tag);
        assert_eq!(parsed.slug, "cnot-gate");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("ATOM-QR-2026-ABC-x".parse::<AtomTag>().is_err());
        assert!("TAG-QR-20260117-ABC-x".parse::<AtomTag>().is_err());
        assert!("ATOM-QR-20260117-abc-x".parse::<AtomTag>().is_err());
    }

    #[test]
    fn test_generate_uses_today() {
        let before = Utc::now().date_naive();
        let tag = AtomTag::generate("QR", "demo");
        let after = Utc::now().date_naive();
        assert!(tag.date == before || tag.date == after);
        assert!(atom_tag("QR", "demo").starts_with("ATOM-QR-"));
    }
}
