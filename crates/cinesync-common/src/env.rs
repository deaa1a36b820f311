//! Typed access to environment variables.
//!
//! Unset variables fall back to defaults; set but malformed variables are
//! reported instead of silently ignored, so a typo in `.env` fails the run at
//! startup.

use std::str::FromStr;

use crate::error::{CommonError, Result};

/// Read a variable, treating an empty value as unset
pub fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read a variable that must be present
pub fn require(name: &str) -> Result<String> {
    var(name).ok_or_else(|| CommonError::MissingVar(name.to_string()))
}

/// Read a variable or fall back to `default`
pub fn var_or(name: &str, default: &str) -> String {
    var(name).unwrap_or_else(|| default.to_string())
}

/// Parse a variable if it is set
pub fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CommonError::invalid(name, raw, e)),
        None => Ok(None),
    }
}

/// Parse a variable, using `default` when it is unset
pub fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_var(name)?.unwrap_or(default))
}
