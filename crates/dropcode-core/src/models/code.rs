use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::constants::{CODE_ALPHABET, CODE_LENGTH};
use crate::error::AppError;

/// Six-symbol identifier naming a transfer session.
///
/// Construction always goes through [`TransferCode::parse`], which trims and
/// upper-cases the input before checking it against [`CODE_ALPHABET`], so a
/// value of this type is known to be well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String, example = "AB3456")]
pub struct TransferCode(String);

impl TransferCode {
    /// Normalize and validate a code coming from any input path.
    pub fn parse(input: &str) -> Result<Self, AppError> {
        let normalized = input.trim().to_uppercase();
        if Self::is_well_formed(&normalized) {
            Ok(TransferCode(normalized))
        } else {
            Err(AppError::InvalidCodeFormat(input.trim().to_string()))
        }
    }

    /// Exact format check, no normalization.
    pub fn is_well_formed(candidate: &str) -> bool {
        candidate.len() == CODE_LENGTH && candidate.bytes().all(|b| CODE_ALPHABET.contains(&b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TransferCode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransferCode::parse(s)
    }
}

impl TryFrom<String> for TransferCode {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TransferCode::parse(&value)
    }
}

impl From<TransferCode> for String {
    fn from(code: TransferCode) -> Self {
        code.0
    }
}

impl AsRef<str> for TransferCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for TransferCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let code = TransferCode::parse("  ab3456 ").unwrap();
        assert_eq!(code.as_str(), "AB3456");
    }

    #[test]
    fn test_parse_rejects_ambiguous_symbols() {
        for input in ["AB345O", "AB345I", "AB3450", "AB3451"] {
            assert!(
                matches!(TransferCode::parse(input), Err(AppError::InvalidCodeFormat(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(TransferCode::parse("AB345").is_err());
        assert!(TransferCode::parse("AB34567").is_err());
        assert!(TransferCode::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_path_like_input() {
        assert!(TransferCode::parse("../AB3").is_err());
        assert!(TransferCode::parse("AB/456").is_err());
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let code: TransferCode = serde_json::from_str("\"xy7kmn\"").unwrap();
        assert_eq!(code.as_str(), "XY7KMN");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"XY7KMN\"");
        assert!(serde_json::from_str::<TransferCode>("\"OOOOOO\"").is_err());
    }
}
