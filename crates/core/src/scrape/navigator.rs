use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigatorError {
    #[error("timed out after {timeout:?} waiting for {selector}")]
    Timeout { selector: String, timeout: Duration },
    #[error("no element matches {0}")]
    NotFound(String),
    #[error("page interaction failed: {0}")]
    Interaction(String),
    /// The browser or its connection is gone; nothing on this session can succeed.
    #[error("navigation session is unusable: {0}")]
    SessionFatal(String),
}

impl NavigatorError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, NavigatorError::SessionFatal(_))
    }
}

pub type NavResult<T> = Result<T, NavigatorError>;

#[async_trait::async_trait]
pub trait PageElement: Send + Sync + Sized {
    async fn text(&self) -> NavResult<String>;

    async fn is_visible(&self) -> NavResult<bool>;

    async fn click(&self) -> NavResult<()>;

    async fn find_element(&self, selector: &str) -> NavResult<Option<Self>>;

    async fn find_all(&self, selector: &str) -> NavResult<Vec<Self>>;
}

/// One browsing session. Acquired for a whole run and released exactly once.
#[async_trait::async_trait]
pub trait PageNavigator: Send {
    type Element: PageElement;

    async fn navigate(&mut self, url: &str) -> NavResult<()>;

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> NavResult<Self::Element>;

    async fn find_all(&mut self, selector: &str) -> NavResult<Vec<Self::Element>>;

    async fn scroll_by_viewport(&mut self) -> NavResult<()>;

    async fn scroll_to_top(&mut self) -> NavResult<()>;

    /// Tear the session down. Calling it twice is a no-op.
    async fn release(&mut self);
}
