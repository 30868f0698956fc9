//! Headless Chrome layer for sources that sit behind an origin challenge
//!
//! One `BrowserManager` owns the Chrome process for the whole run; each title
//! gets its own tab wrapped in a `BrowserScraper`, which is closed once the
//! title's chapters are done.
//!
//! # Example
//!
//! ```no_run
//! use paperback_cache_warmer::browser::{BrowserConfig, BrowserManager, BrowserScraper};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = BrowserManager::new(BrowserConfig::stealth_mode())?;
//! let scraper = BrowserScraper::new(manager.new_tab()?, manager.config());
//! scraper.navigate_until_idle("https://bato.to/series/86663")?;
//! let html = scraper.get_html()?;
//! println!("Extracted {} bytes of HTML", html.len());
//! scraper.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod manager;
pub mod scraper;

pub use config::BrowserConfig;
pub use manager::{BrowserError, BrowserManager};
pub use scraper::BrowserScraper;
