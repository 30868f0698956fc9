use super::config::BrowserConfig;
use super::manager::BrowserError;
use headless_chrome::Tab;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counts resource requests plus load state, polled to detect network idle
const NETWORK_PROBE: &str =
    "JSON.stringify([document.readyState, performance.getEntriesByType('resource').length])";

/// High-level scraping utilities for a browser tab
pub struct BrowserScraper {
    tab: Arc<Tab>,
    timeout: Duration,
    idle: Duration,
}

impl BrowserScraper {
    pub fn new(tab: Arc<Tab>, config: &BrowserConfig) -> Self {
        Self {
            tab,
            timeout: config.timeout(),
            idle: config.network_idle(),
        }
    }

    /// Navigate and wait until the page stops issuing requests
    pub fn navigate_until_idle(&self, url: &str) -> Result<(), BrowserError> {
        log::info!("Browser navigating to: {}", url);
        self.tab
            .navigate_to(url)
            .map_err(|e| BrowserError::NavigationError(format!("Failed to navigate to {}: {}", url, e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| BrowserError::NavigationError(format!("Navigation timeout for {}: {}", url, e)))?;

        self.wait_for_network_idle()
    }

    /// Poll until the document is complete and the resource count holds
    /// steady for the idle period
    pub fn wait_for_network_idle(&self) -> Result<(), BrowserError> {
        let start = Instant::now();
        let mut last_count: Option<u64> = None;
        let mut stable_since = Instant::now();

        loop {
            if start.elapsed() > self.timeout {
                return Err(BrowserError::Timeout("network idle".to_string()));
            }

            if let Ok((ready, count)) = self.probe() {
                if last_count != Some(count) {
                    last_count = Some(count);
                    stable_since = Instant::now();
                } else if ready == "complete" && stable_since.elapsed() >= self.idle {
                    return Ok(());
                }
            }

            std::thread::sleep(Duration::from_millis(100));
        }
    }

    fn probe(&self) -> Result<(String, u64), BrowserError> {
        let raw = self.evaluate_script(NETWORK_PROBE)?;
        let (ready, count): (String, u64) = serde_json::from_str(&raw)
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
        Ok((ready, count))
    }

    /// Get the HTML content of the page
    pub fn get_html(&self) -> Result<String, BrowserError> {
        self.tab
            .get_content()
            .map_err(|e| BrowserError::HtmlExtractionError(e.to_string()))
    }

    /// Execute JavaScript and return the result as a string
    pub fn evaluate_script(&self, script: &str) -> Result<String, BrowserError> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        result
            .value
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .ok_or_else(|| BrowserError::JavaScriptError("Script returned no value".to_string()))
    }

    /// Close the tab
    pub fn close(&self) -> Result<(), BrowserError> {
        self.tab
            .close(true)
            .map(|_| ())
            .map_err(|e| BrowserError::NavigationError(format!("Tab close failed: {}", e)))
    }
}
