use chrono::NaiveDate;
use validator::ValidationError;

use crate::shared::errors::DomainError;

/// Rejects identifiers that are empty once surrounding whitespace is removed.
pub fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank_identifier"));
    }
    if value.trim() != value {
        return Err(ValidationError::new("untrimmed_identifier"));
    }
    Ok(())
}

/// Parses an ETA given as `YYYY-MM-DD`.
pub fn parse_eta(value: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| DomainError::Validation(format!("invalid eta '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_must_not_be_blank() {
        assert!(validate_identifier("batch-001").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("   ").is_err());
        assert!(validate_identifier(" batch ").is_err());
    }

    #[test]
    fn eta_is_an_iso_date() {
        assert_eq!(
            parse_eta("2026-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
        assert!(matches!(
            parse_eta("01/03/2026"),
            Err(DomainError::Validation(_))
        ));
    }
}
