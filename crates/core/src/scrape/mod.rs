#[cfg(feature = "browser")]
pub mod browser;
pub mod dates;
pub mod extract;
pub mod matcher;
pub mod navigator;
pub mod obstruction;
pub mod orchestrator;
pub mod price;
pub mod search;
pub mod selectors;
pub mod synthetic;

use crate::scrape::navigator::NavigatorError;
use crate::scrape::price::PriceParseError;
use std::time::Duration;

/// All variants but `NavigationSessionFatal` are recovered inside the run loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScrapeError {
    #[error("results did not appear within {timeout:?} ({url})")]
    NavigationTimeout { url: String, timeout: Duration },
    #[error("navigation failed ({url}): {reason}")]
    Navigation { url: String, reason: String },
    #[error("no {field} found")]
    ElementNotFound { field: String },
    #[error("unparseable price: {0}")]
    Parse(#[from] PriceParseError),
    #[error("could not dismiss obstruction {selector}: {reason}")]
    ObstructionDismissFailure { selector: String, reason: String },
    #[error("navigation session is unusable: {0}")]
    NavigationSessionFatal(String),
}

impl ScrapeError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScrapeError::NavigationSessionFatal(_))
    }

    pub(crate) fn from_navigator(err: NavigatorError, url: &str) -> Self {
        match err {
            NavigatorError::Timeout { timeout, .. } => ScrapeError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            },
            NavigatorError::NotFound(selector) => ScrapeError::ElementNotFound { field: selector },
            NavigatorError::Interaction(reason) => ScrapeError::Navigation {
                url: url.to_string(),
                reason,
            },
            NavigatorError::SessionFatal(reason) => ScrapeError::NavigationSessionFatal(reason),
        }
    }
}
