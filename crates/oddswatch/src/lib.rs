pub mod bookmakers;
pub mod config;
pub mod diff;
mod parser;
pub mod render;
pub mod scraper;
pub mod types;
pub mod watch;

#[cfg(test)]
mod testutil;

pub use config::{FetchConfig, ProxyConfig};
pub use parser::ParseError;
pub use scraper::{ScraperError, WebScraper};
pub use watch::{RaceTarget, WatchError};

pub(crate) const BASE_URL: &str = "https://www.oddschecker.com";
