use std::time::Duration;

/// Configuration for browser instances
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,

    /// Browser window size
    pub window_size: (u32, u32),

    /// Navigation timeout in seconds
    pub timeout_seconds: u64,

    /// How long the page must issue no new requests to count as idle
    pub network_idle_ms: u64,

    /// Disable image loading for performance
    pub disable_images: bool,

    /// Additional Chrome flags
    pub chrome_flags: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1920, 1080),
            timeout_seconds: 30,
            network_idle_ms: 500,
            disable_images: true,
            chrome_flags: vec![],
        }
    }
}

impl BrowserConfig {
    /// Flags that keep the origin challenge from spotting automation
    pub fn stealth_mode() -> Self {
        Self {
            chrome_flags: vec![
                "--disable-blink-features=AutomationControlled".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--no-sandbox".to_string(),
            ],
            ..Self::default()
        }
    }

    /// Chrome flags including the image toggle
    pub fn launch_flags(&self) -> Vec<String> {
        let mut flags = self.chrome_flags.clone();
        if self.disable_images {
            flags.push("--blink-settings=imagesEnabled=false".to_string());
        }
        flags
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn network_idle(&self) -> Duration {
        Duration::from_millis(self.network_idle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert_eq!(config.window_size, (1920, 1080));
        assert_eq!(config.network_idle(), Duration::from_millis(500));
    }

    #[test]
    fn test_stealth_mode() {
        let config = BrowserConfig::stealth_mode();
        assert!(config
            .chrome_flags
            .iter()
            .any(|f| f.contains("AutomationControlled")));
    }

    #[test]
    fn test_launch_flags_image_toggle() {
        let mut config = BrowserConfig::default();
        assert!(config.launch_flags().iter().any(|f| f.contains("imagesEnabled=false")));
        config.disable_images = false;
        assert!(config.launch_flags().is_empty());
    }
}
