use crate::scrape::navigator::{NavResult, NavigatorError, PageElement, PageNavigator};
use anyhow::Context;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::page::Page;
use futures::{Stream, StreamExt};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub executable: Option<PathBuf>,
    /// `http://host:9222` of an already running browser to attach to.
    pub remote_url: Option<String>,
    pub headless: bool,
    pub request_timeout: Duration,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            executable: None,
            remote_url: None,
            headless: true,
            request_timeout: Duration::from_secs(30),
        }
    }
}

fn classify(err: CdpError) -> NavigatorError {
    match err {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            NavigatorError::SessionFatal(err.to_string())
        }
        other => NavigatorError::Interaction(other.to_string()),
    }
}

/// Dropped without release, the event loop stops and a launched process is killed.
pub struct ChromeSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    owns_process: bool,
}

impl ChromeSession {
    pub async fn open(options: &ChromeOptions) -> anyhow::Result<Self> {
        let (browser, handler, owns_process) = match options.remote_url.as_deref() {
            Some(url) => {
                let (browser, handler) = connect_remote(url, options.request_timeout).await?;
                (browser, handler, false)
            }
            None => {
                let (browser, handler) = launch_local(options).await?;
                (browser, handler, true)
            }
        };

        let handler = spawn_event_loop(handler);
        let page = abort_on_err(browser.new_page("about:blank").await, &handler)
            .context("failed to open browser tab")?;

        tracing::info!(remote = !owns_process, headless = options.headless, "chrome session opened");

        Ok(Self {
            browser: Some(browser),
            page: Some(page),
            handler: Some(handler),
            owns_process,
        })
    }

    fn page(&self) -> NavResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| NavigatorError::SessionFatal("chrome session already released".to_string()))
    }
}

fn spawn_event_loop<S>(mut events: S) -> JoinHandle<()>
where
    S: Stream<Item = Result<(), CdpError>> + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if let Err(err) = event {
                tracing::debug!(error = %err, "cdp handler error");
                if matches!(err, CdpError::Ws(_)) {
                    break;
                }
            }
        }
    })
}

/// Stops the event loop when session setup fails after it was spawned.
fn abort_on_err<T, E>(res: Result<T, E>, events: &JoinHandle<()>) -> Result<T, E> {
    if res.is_err() {
        events.abort();
    }
    res
}

async fn launch_local(
    options: &ChromeOptions,
) -> anyhow::Result<(Browser, chromiumoxide::Handler)> {
    let mut builder = BrowserConfig::builder()
        .request_timeout(options.request_timeout)
        .window_size(1920, 1080)
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-blink-features=AutomationControlled")
        .arg(format!("--user-agent={USER_AGENT}"));
    if !options.headless {
        builder = builder.with_head();
    }
    if let Some(path) = options.executable.as_ref() {
        builder = builder.chrome_executable(path);
    }

    let config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

    Browser::launch(config)
        .await
        .context("failed to launch Chromium (set CHROME_EXECUTABLE?)")
}

async fn connect_remote(
    url: &str,
    request_timeout: Duration,
) -> anyhow::Result<(Browser, chromiumoxide::Handler)> {
    let http_url = url
        .replace("ws://", "http://")
        .replace("wss://", "https://");
    let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

    let version: serde_json::Value = reqwest::Client::new()
        .get(&version_url)
        .send()
        .await
        .with_context(|| format!("failed to reach remote browser at {version_url}"))?
        .error_for_status()
        .context("remote browser version endpoint returned an error")?
        .json()
        .await
        .context("failed to parse remote browser version info")?;

    let ws_url = version
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .context("no webSocketDebuggerUrl in remote browser version info")?;

    let config = HandlerConfig {
        request_timeout,
        ..Default::default()
    };

    Browser::connect_with_config(ws_url, config)
        .await
        .with_context(|| format!("failed to attach to remote browser at {ws_url}"))
}

#[async_trait::async_trait]
impl PageNavigator for ChromeSession {
    type Element = ChromeElement;

    async fn navigate(&mut self, url: &str) -> NavResult<()> {
        self.page()?.goto(url).await.map_err(classify)?;
        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> NavResult<ChromeElement> {
        let page = self.page()?;
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match page.find_elements(selector).await {
                Ok(found) => {
                    if let Some(element) = found.into_iter().next() {
                        return Ok(ChromeElement(element));
                    }
                }
                Err(err) => {
                    let err = classify(err);
                    if err.is_fatal() {
                        return Err(err);
                    }
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(NavigatorError::Timeout {
                    selector: selector.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn find_all(&mut self, selector: &str) -> NavResult<Vec<ChromeElement>> {
        let found = self
            .page()?
            .find_elements(selector)
            .await
            .map_err(classify)?;
        Ok(found.into_iter().map(ChromeElement).collect())
    }

    async fn scroll_by_viewport(&mut self) -> NavResult<()> {
        self.page()?
            .evaluate("window.scrollBy(0, window.innerHeight)")
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn scroll_to_top(&mut self) -> NavResult<()> {
        self.page()?
            .evaluate("window.scrollTo(0, 0)")
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn release(&mut self) {
        let Some(mut browser) = self.browser.take() else {
            return;
        };

        if let Some(page) = self.page.take() {
            if let Err(err) = page.close().await {
                tracing::debug!(error = %err, "closing tab failed");
            }
        }

        if self.owns_process {
            if let Err(err) = browser.close().await {
                tracing::warn!(error = %err, "closing browser failed");
            }
            if let Err(err) = browser.wait().await {
                tracing::warn!(error = %err, "waiting for browser exit failed");
            }
        }

        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        tracing::info!("chrome session released");
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            // Dropping `Browser` kills the child process.
            tracing::warn!("chrome session dropped without release; tearing browser down");
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

pub struct ChromeElement(Element);

#[async_trait::async_trait]
impl PageElement for ChromeElement {
    async fn text(&self) -> NavResult<String> {
        Ok(self
            .0
            .inner_text()
            .await
            .map_err(classify)?
            .unwrap_or_default())
    }

    async fn is_visible(&self) -> NavResult<bool> {
        match self.0.bounding_box().await {
            Ok(bounds) => Ok(bounds.width > 0.0 && bounds.height > 0.0),
            Err(err) => {
                let err = classify(err);
                if err.is_fatal() {
                    Err(err)
                } else {
                    // Detached or display:none nodes have no box model.
                    Ok(false)
                }
            }
        }
    }

    async fn click(&self) -> NavResult<()> {
        self.0.click().await.map_err(classify)?;
        Ok(())
    }

    async fn find_element(&self, selector: &str) -> NavResult<Option<Self>> {
        let found = self.0.find_elements(selector).await.map_err(classify)?;
        Ok(found.into_iter().next().map(ChromeElement))
    }

    async fn find_all(&self, selector: &str) -> NavResult<Vec<Self>> {
        let found = self.0.find_elements(selector).await.map_err(classify)?;
        Ok(found.into_iter().map(ChromeElement).collect())
    }
}
