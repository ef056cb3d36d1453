//! CLI error type.

use std::fmt;

use bundlefetch::FetchError;

/// Errors surfaced to the terminal.
#[derive(Debug)]
pub enum CliError {
    /// A bundle operation failed.
    Fetch(FetchError),
    /// The CLI was invoked or configured incorrectly.
    Usage(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Fetch(e) => write!(f, "{}", e),
            CliError::Usage(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<FetchError> for CliError {
    fn from(e: FetchError) -> Self {
        CliError::Fetch(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_passes_through_fetch_error() {
        let err = CliError::from(FetchError::Configuration("no bundles".into()));
        assert_eq!(err.to_string(), "configuration error: no bundles");
    }

    #[test]
    fn test_display_usage() {
        let err = CliError::Usage("nothing to fetch".into());
        assert_eq!(err.to_string(), "nothing to fetch");
    }
}
