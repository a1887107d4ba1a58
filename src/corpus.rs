use anyhow::{Result, bail};

use crate::util::normalize_whitespace;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AbstractStatus {
    Valid,
    Missing,
}

impl AbstractStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Missing => "missing",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "valid" => Ok(Self::Valid),
            "missing" => Ok(Self::Missing),
            other => bail!("unknown abstract status '{other}'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Paper {
    pub paper_id: String,
    pub title: String,
    pub abstract_text: String,
    pub abstract_status: AbstractStatus,
}

/// Validation boundary for incoming rows: anything absent or blank is
/// flagged here so downstream stages never see an untyped abstract.
pub fn validate_abstract(raw: Option<&str>) -> (String, AbstractStatus) {
    let normalized = raw.map(normalize_whitespace).unwrap_or_default();
    if normalized.is_empty() {
        (String::new(), AbstractStatus::Missing)
    } else {
        (normalized, AbstractStatus::Valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_abstract_flags_missing_and_blank_values() {
        assert_eq!(validate_abstract(None).1, AbstractStatus::Missing);
        assert_eq!(validate_abstract(Some("")).1, AbstractStatus::Missing);
        assert_eq!(validate_abstract(Some("   \t\n")).1, AbstractStatus::Missing);
    }

    #[test]
    fn validate_abstract_normalizes_interior_whitespace() {
        let (text, status) = validate_abstract(Some("  Deep   learning\nfor\tcats.  "));
        assert_eq!(status, AbstractStatus::Valid);
        assert_eq!(text, "Deep learning for cats.");
    }

    #[test]
    fn abstract_status_round_trips_through_labels() {
        assert_eq!(
            AbstractStatus::parse(AbstractStatus::Valid.as_str()).unwrap(),
            AbstractStatus::Valid
        );
        assert_eq!(
            AbstractStatus::parse(AbstractStatus::Missing.as_str()).unwrap(),
            AbstractStatus::Missing
        );
        assert!(AbstractStatus::parse("bogus").is_err());
    }
}
