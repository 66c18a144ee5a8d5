//! Headless Chrome sessions via chromiumoxide

use crate::capture::{SessionFactory, Viewport};
use crate::config::ViewportSize;
use crate::error::{NewsError, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Launches one Chrome process per capture
pub struct ChromeLauncher {
    window: ViewportSize,
    navigation_timeout: Duration,
}

impl ChromeLauncher {
    pub fn new(window: ViewportSize, navigation_timeout_ms: u64) -> Self {
        Self {
            window,
            navigation_timeout: Duration::from_millis(navigation_timeout_ms),
        }
    }
}

#[async_trait]
impl SessionFactory for ChromeLauncher {
    async fn open(&self) -> Result<Box<dyn Viewport>> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(self.window.width, self.window.height)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-setuid-sandbox")
            .arg("--no-first-run")
            .arg("--headless=new")
            .build()
            .map_err(|e| NewsError::browser("Browser config error", e))?;

        let (mut browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            NewsError::browser("Failed to launch Chrome. Is Chrome/Chromium installed?", e)
        })?;

        // Drive the CDP connection in the background
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = match new_page(&browser).await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                handler.abort();
                return Err(e);
            }
        };

        Ok(Box::new(ChromeSession {
            browser,
            page,
            handler,
            navigation_timeout: self.navigation_timeout,
        }))
    }
}

async fn new_page(browser: &Browser) -> Result<Page> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| NewsError::browser("Failed to open tab", e))?;
    page.execute(SetUserAgentOverrideParams::new(USER_AGENT))
        .await
        .map_err(|e| NewsError::browser("Failed to set user agent", e))?;
    Ok(page)
}

/// A browser process with a single tab
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    navigation_timeout: Duration,
}

#[async_trait]
impl Viewport for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(NewsError::browser(
                &format!("Navigation to {} failed ({})", url, classify_error(&e.to_string())),
                e,
            )),
            Err(_) => Err(NewsError::Browser(format!("Navigation timeout: {}", url))),
        }
    }

    async fn set_size(&mut self, size: ViewportSize) -> Result<()> {
        let params = SetDeviceMetricsOverrideParams::new(
            i64::from(size.width),
            i64::from(size.height),
            1.0,
            false,
        );
        self.page
            .execute(params)
            .await
            .map_err(|e| NewsError::browser("Failed to set viewport", e))?;
        Ok(())
    }

    async fn capture_viewport(&mut self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| NewsError::browser("Screenshot failed", e))
    }

    async fn scroll_to(&mut self, offset: u64) -> Result<()> {
        self.page
            .evaluate(format!("window.scrollTo(0, {});", offset))
            .await
            .map_err(|e| NewsError::browser("Scroll failed", e))?;
        Ok(())
    }

    async fn page_height(&mut self) -> Result<u64> {
        let result = self
            .page
            .evaluate("document.body.scrollHeight")
            .await
            .map_err(|e| NewsError::browser("Failed to read page height", e))?;
        let height: f64 = result
            .into_value()
            .map_err(|e| NewsError::browser("Page height is not a number", e))?;
        Ok(height.max(0.0) as u64)
    }

    async fn close(&mut self) -> Result<()> {
        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler.abort();
        debug!("Browser session closed");
        closed
            .map(|_| ())
            .map_err(|e| NewsError::browser("Failed to close browser", e))
    }
}

/// Short label for a Chrome network error
fn classify_error(error: &str) -> &'static str {
    if error.contains("ERR_NAME_NOT_RESOLVED") {
        "DNS_FAILED"
    } else if error.contains("ERR_CONNECTION_REFUSED") {
        "CONNECTION_REFUSED"
    } else if error.contains("ERR_CONNECTION_TIMED_OUT") {
        "TIMEOUT"
    } else if error.contains("ERR_CERT") || error.contains("SSL") {
        "SSL_ERROR"
    } else {
        "NETWORK_ERROR"
    }
}
