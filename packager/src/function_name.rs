//! Lambda function name newtype.
//!
//! Validates that the value is 1–64 characters drawn from ASCII letters,
//! digits, hyphens, and underscores, matching the AWS Lambda naming rules
//! for unqualified function names.

use crate::error::{PackagerError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Maximum length of an unqualified Lambda function name.
const MAX_LEN: usize = 64;

/// Function name used when no configuration overrides it.
pub const DEFAULT_FUNCTION_NAME: &str = "data-pipeline-etl";

/// A validated AWS Lambda function name.
///
/// # Examples
///
/// ```
/// use lambda_packager::function_name::FunctionName;
///
/// let name = FunctionName::try_from("data-pipeline-etl")?;
/// assert_eq!(name.as_str(), "data-pipeline-etl");
/// assert!(FunctionName::try_from("has spaces").is_err());
/// # Ok::<(), lambda_packager::error::PackagerError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FunctionName(String);

impl FunctionName {
    /// Return the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for FunctionName {
    fn default() -> Self {
        Self(DEFAULT_FUNCTION_NAME.to_owned())
    }
}

impl TryFrom<&str> for FunctionName {
    type Error = PackagerError;

    fn try_from(value: &str) -> Result<Self> {
        validate_function_name(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for FunctionName {
    type Error = PackagerError;

    fn try_from(value: String) -> Result<Self> {
        validate_function_name(&value)?;
        Ok(Self(value))
    }
}

impl<'de> Deserialize<'de> for FunctionName {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for FunctionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_function_name(value: &str) -> Result<()> {
    let reject = |reason: &str| PackagerError::InvalidFunctionName {
        value: value.to_owned(),
        reason: reason.to_owned(),
    };

    if value.is_empty() {
        return Err(reject("name must not be empty"));
    }
    if value.len() > MAX_LEN {
        return Err(reject("name must be at most 64 characters"));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(reject(&format!(
            "character {bad:?} is not allowed; use letters, digits, '-' or '_'"
        )));
    }
    Ok(())
}
