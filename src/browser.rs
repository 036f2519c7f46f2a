//! Headless Chrome browser management via chromiumoxide

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;

/// Cap on the tolerant post-navigation wait. Tab clicks swap DOM
/// without navigating, so the navigation event may never fire.
const SETTLE_CAP: Duration = Duration::from_secs(5);

/// Short pause for in-page scripts to finish rendering.
const RENDER_PAUSE: Duration = Duration::from_millis(500);

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const STYLESHEET_JS: &str = r#"(() => {
    const chunks = [];
    for (const sheet of document.styleSheets) {
        try {
            for (const rule of sheet.cssRules) {
                chunks.push(rule.cssText);
            }
        } catch (e) {
            // cross-origin sheets are unreadable
        }
    }
    return chunks.join('\n');
})()"#;

/// One headless Chrome session driving a single page.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    timeout: Duration,
}

impl BrowserSession {
    /// Launch Chrome and open a blank page. `timeout_ms` bounds every
    /// navigation made through this session.
    pub async fn launch(timeout_ms: u64) -> Result<Self> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-setuid-sandbox")
            .arg("--no-first-run")
            .arg("--headless=new")
            .build()
            .map_err(|e| anyhow::anyhow!("Browser config error: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch Chrome. Is Chrome/Chromium installed?")?;

        // Spawn handler in background
        tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser.new_page("about:blank").await?;
        page.execute(
            chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams::new(
                USER_AGENT,
            ),
        )
        .await?;

        Ok(Self {
            browser,
            page,
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// Navigate and wait for the page to settle. A timed-out or failed
    /// navigation is fatal; nothing can be extracted without the page.
    pub async fn goto(&self, url: &str) -> Result<()> {
        log::info!("loading {}", url);
        tokio::time::timeout(self.timeout, self.page.goto(url))
            .await
            .map_err(|_| {
                anyhow::anyhow!("navigation to {} timed out after {:?}", url, self.timeout)
            })?
            .with_context(|| format!("failed to load {}", url))?;
        self.settle().await;
        Ok(())
    }

    /// Wait out any in-flight navigation, then give scripts a moment.
    /// Never fails: a quiet page is exactly what we are waiting for.
    pub async fn settle(&self) {
        if tokio::time::timeout(SETTLE_CAP, self.page.wait_for_navigation())
            .await
            .is_err()
        {
            log::debug!("no navigation event within {:?}, continuing", SETTLE_CAP);
        }
        tokio::time::sleep(RENDER_PAUSE).await;
    }

    /// Serialized DOM of the current page.
    pub async fn html(&self) -> Result<String> {
        self.page
            .content()
            .await
            .context("Failed to get page content")
    }

    /// Collect the text of every same-origin stylesheet on the page.
    pub async fn stylesheet_text(&self) -> Result<String> {
        self.page
            .evaluate(STYLESHEET_JS)
            .await
            .context("stylesheet collection script failed")?
            .into_value::<String>()
            .context("stylesheet collection returned a non-string")
    }

    /// Click the first element matching `selector`.
    pub async fn click(&self, selector: &str) -> Result<()> {
        self.page
            .find_element(selector)
            .await
            .with_context(|| format!("element {} not found", selector))?
            .click()
            .await
            .with_context(|| format!("failed to click {}", selector))?;
        Ok(())
    }

    /// Screenshot the first element matching `selector` into a PNG file.
    pub async fn save_element_png(&self, selector: &str, path: &Path) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("element {} not found", selector))?;
        element
            .save_screenshot(CaptureScreenshotFormat::Png, path)
            .await
            .with_context(|| format!("failed to screenshot {} to {}", selector, path.display()))?;
        Ok(())
    }

    /// Close the browser
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }
}
