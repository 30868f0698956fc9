use super::config::BrowserConfig;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;

/// Owns the Chrome process and hands out tabs
pub struct BrowserManager {
    browser: Arc<Browser>,
    config: BrowserConfig,
}

impl BrowserManager {
    /// Launch Chrome with the given configuration
    pub fn new(config: BrowserConfig) -> Result<Self, BrowserError> {
        let flags = config.launch_flags();
        let launch_options = Self::build_launch_options(&config, &flags)?;

        let browser = Browser::new(launch_options)
            .map_err(|e| BrowserError::InitializationError(e.to_string()))?;
        log::info!("Browser launched (headless: {})", config.headless);

        Ok(Self {
            browser: Arc::new(browser),
            config,
        })
    }

    fn build_launch_options<'a>(
        config: &BrowserConfig,
        flags: &'a [String],
    ) -> Result<LaunchOptions<'a>, BrowserError> {
        LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some(config.window_size))
            .idle_browser_timeout(config.timeout() * 10)
            .args(flags.iter().map(OsStr::new).collect())
            .build()
            .map_err(|e| BrowserError::ConfigurationError(e.to_string()))
    }

    /// Open a new tab
    pub fn new_tab(&self) -> Result<Arc<Tab>, BrowserError> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| BrowserError::TabCreationError(e.to_string()))?;
        tab.set_default_timeout(self.config.timeout());
        Ok(tab)
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }
}

/// Errors that can occur during browser operations
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("Browser initialization failed: {0}")]
    InitializationError(String),

    #[error("Browser configuration error: {0}")]
    ConfigurationError(String),

    #[error("Tab creation failed: {0}")]
    TabCreationError(String),

    #[error("Navigation error: {0}")]
    NavigationError(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("JavaScript execution error: {0}")]
    JavaScriptError(String),

    #[error("HTML extraction error: {0}")]
    HtmlExtractionError(String),
}
