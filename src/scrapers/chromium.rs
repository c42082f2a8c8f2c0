//! Headless Chromium driver.
//!
//! Talks CDP through `chromiumoxide`. The browser's event handler runs on its
//! own tokio task for the lifetime of the driver; everything else happens on
//! the caller's task, one command at a time.
//!
//! Readiness is detected by polling for a selector rather than sleeping for a
//! fixed time after each navigation.
//!
//! chromiumoxide bounds the navigation request itself at 30 s regardless of
//! the configured deadline; only the readiness wait can use the remainder.

use super::PageDriver;
use crate::error::{Result, ScrapeError};
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launch options for [`ChromiumPage::launch`].
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Show the browser window instead of running headless.
    pub headful: bool,
    /// Deadline for each navigation, readiness wait included.
    pub navigation_timeout: Duration,
    pub window_size: (u32, u32),
}

/// A single Chromium tab plus the browser that owns it.
pub struct ChromiumPage {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    navigation_timeout: Duration,
}

/// chromiumoxide reports its own request deadline as `CdpError::Timeout`.
fn navigation_error(url: &str, deadline: Duration, e: CdpError) -> ScrapeError {
    match e {
        CdpError::Timeout => ScrapeError::NavigationTimeout {
            url: url.to_string(),
            timeout: deadline,
        },
        other => other.into(),
    }
}

impl ChromiumPage {
    #[instrument(level = "info", skip_all, fields(headful = options.headful))]
    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        let (width, height) = options.window_size;
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .window_size(width, height)
            .request_timeout(options.navigation_timeout);
        if options.headful {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(ScrapeError::Launch)?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler error");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::Launch(e.to_string()))?;

        info!("Browser launched");
        Ok(Self {
            browser,
            page,
            handler,
            navigation_timeout: options.navigation_timeout,
        })
    }

    async fn wait_for_selector(&self, url: &str, css: &str, started: Instant) -> Result<()> {
        loop {
            if self.page.find_element(css).await.is_ok() {
                return Ok(());
            }
            if started.elapsed() >= self.navigation_timeout {
                return Err(ScrapeError::NavigationTimeout {
                    url: url.to_string(),
                    timeout: self.navigation_timeout,
                });
            }
            sleep(READY_POLL_INTERVAL).await;
        }
    }
}

impl PageDriver for ChromiumPage {
    #[instrument(level = "info", skip(self, ready_selector))]
    async fn navigate(&mut self, url: &str, ready_selector: &str) -> Result<()> {
        let started = Instant::now();
        match timeout(self.navigation_timeout, self.page.goto(url)).await {
            Err(_) => {
                warn!(%url, timeout = ?self.navigation_timeout, "Navigation timed out");
                return Err(ScrapeError::NavigationTimeout {
                    url: url.to_string(),
                    timeout: self.navigation_timeout,
                });
            }
            Ok(Err(e)) => {
                warn!(%url, error = %e, "Navigation failed");
                return Err(navigation_error(url, self.navigation_timeout, e));
            }
            Ok(Ok(_)) => {}
        }
        self.wait_for_selector(url, ready_selector, started).await?;
        debug!(%url, elapsed_ms = started.elapsed().as_millis() as u64, "Page ready");
        Ok(())
    }

    async fn dismiss_overlay(&mut self, close_selectors: &[String]) -> Result<bool> {
        for css in close_selectors {
            let Ok(button) = self.page.find_element(css.as_str()).await else {
                continue;
            };
            match button.click().await {
                Ok(_) => return Ok(true),
                // Present but hidden or detached; try the next candidate.
                Err(e) => debug!(selector = %css, error = %e, "Overlay close button not clickable"),
            }
        }
        Ok(false)
    }

    async fn html(&mut self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn close(mut self) -> Result<()> {
        if let Err(e) = self.page.clone().close().await {
            warn!(error = %e, "Failed to close page (non-fatal)");
        }
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Failed to close browser (non-fatal)");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Failed waiting for browser exit (non-fatal)");
        }
        self.handler.abort();
        info!("Browser closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdp_timeout_is_a_navigation_timeout() {
        let err = navigation_error(
            "https://milkroad.com/daily/",
            Duration::from_secs(100),
            CdpError::Timeout,
        );
        assert!(matches!(
            err,
            ScrapeError::NavigationTimeout { ref url, timeout }
                if url == "https://milkroad.com/daily/" && timeout == Duration::from_secs(100)
        ));
        assert!(err.is_page_scoped());
    }

    #[test]
    fn test_other_cdp_errors_stay_browser_errors() {
        let err = navigation_error(
            "https://milkroad.com/x",
            Duration::from_secs(100),
            CdpError::NotFound,
        );
        assert!(matches!(err, ScrapeError::Browser(_)));
    }
}
