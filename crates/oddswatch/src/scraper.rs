use moka::future::Cache;
use reqwest::{Client, Url};

use crate::config::FetchConfig;
use crate::parser::{ParseError, parse_race_meets, parse_race_odds};
use crate::types::{ListedRace, Meeting, RunnerOdds, find_meeting};

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Giving up on {url} after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        last: reqwest::Error,
    },
    #[error("No meeting found for venue '{0}'")]
    VenueNotFound(String),
    #[error("No race at {time} found for venue '{venue}'")]
    RaceNotFound { venue: String, time: String },
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
    config: FetchConfig,
    /// Home page listing, keyed by `()` since there is only ever one.
    meetings: Cache<(), Vec<Meeting>>,
}

impl WebScraper {
    pub fn new(config: FetchConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            meetings: Cache::builder()
                .max_capacity(1)
                .time_to_live(config.meetings_ttl)
                .build(),
            config,
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Lists today's meetings, served from cache while it is fresh.
    pub async fn fetch_meetings(&self) -> Result<Vec<Meeting>, ScraperError> {
        if let Some(meetings) = self.meetings.get(&()).await {
            log::debug!("Using cached meetings ({} venue(s))", meetings.len());
            return Ok(meetings);
        }

        log::info!("Fetching race meetings...");
        let html = self.get_html(&self.config.base_url).await?;
        let meetings = parse_race_meets(&html, &self.config.base_url)?;
        log::info!("Found {} meeting(s)", meetings.len());

        self.meetings.insert((), meetings.clone()).await;
        Ok(meetings)
    }

    pub async fn fetch_race_odds(&self, url: &str) -> Result<Vec<RunnerOdds>, ScraperError> {
        let url = self.absolute_url(url)?;
        log::info!("Fetching odds: {}", url);
        let html = self.get_html(&url).await?;
        let runners = parse_race_odds(&html);
        if runners.is_empty() {
            log::warn!("No runners found on {}", url);
        }
        Ok(runners)
    }

    /// Looks a race up in the (cached) meetings list. The returned venue is the
    /// site's spelling, not `venue` as typed.
    pub async fn resolve_race(&self, venue: &str, time: &str) -> Result<ListedRace, ScraperError> {
        let meetings = self.fetch_meetings().await?;
        let meeting = find_meeting(&meetings, venue)
            .ok_or_else(|| ScraperError::VenueNotFound(venue.to_string()))?;
        let race = meeting
            .find_race(time)
            .cloned()
            .ok_or_else(|| ScraperError::RaceNotFound {
                venue: meeting.venue.clone(),
                time: time.to_string(),
            })?;

        Ok(ListedRace {
            venue: meeting.venue.clone(),
            race,
        })
    }

    fn absolute_url(&self, url_or_path: &str) -> Result<String, ScraperError> {
        if url_or_path.starts_with("http") {
            return Ok(url_or_path.to_string());
        }
        Url::parse(&self.config.base_url)
            .and_then(|base| base.join(url_or_path))
            .map(|url| url.to_string())
            .map_err(|e| ScraperError::InvalidUrl(format!("{}: {}", url_or_path, e)))
    }

    fn request_url(&self, target: &str) -> Result<Url, ScraperError> {
        match &self.config.proxy {
            Some(proxy) => {
                let mut params = vec![("api_key", proxy.api_key.as_str()), ("url", target)];
                if proxy.render_js {
                    params.push(("render_js", "true"));
                }
                Url::parse_with_params(&proxy.endpoint, &params)
                    .map_err(|e| ScraperError::InvalidUrl(format!("{}: {}", proxy.endpoint, e)))
            }
            None => Url::parse(target)
                .map_err(|e| ScraperError::InvalidUrl(format!("{}: {}", target, e))),
        }
    }

    async fn get_html(&self, target: &str) -> Result<String, ScraperError> {
        let request_url = self.request_url(target)?;
        let attempts = self.config.attempts();
        let mut attempt = 1;

        loop {
            match self.try_get(request_url.clone()).await {
                Ok(html) => return Ok(html),
                Err(e) if attempt < attempts => {
                    log::warn!("Attempt {} for {} failed: {}", attempt, target, e);
                    log::info!("Retrying in {:?}...", self.config.retry_delay);
                    tokio::time::sleep(self.config.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("Max retries reached for {}", target);
                    return Err(ScraperError::RetriesExhausted {
                        url: target.to_string(),
                        attempts,
                        last: e,
                    });
                }
            }
        }
    }

    async fn try_get(&self, url: Url) -> Result<String, reqwest::Error> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?;
        log::debug!("Response status: {}", response.status());
        response
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use crate::testutil::serve;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn scraper(config: FetchConfig) -> WebScraper {
        WebScraper::new(config).expect("Failed to build scraper")
    }

    fn offline_config() -> FetchConfig {
        FetchConfig::default()
            .with_base_url("http://127.0.0.1:9")
            .with_max_retries(1)
            .with_timeout(Duration::from_secs(2))
    }

    fn fixture_meetings() -> Vec<Meeting> {
        let html = std::fs::read_to_string("fixtures/race_meets.html").expect("Failed to read fixture");
        parse_race_meets(&html, crate::BASE_URL).expect("Failed to parse")
    }

    #[test]
    fn test_request_url_direct() {
        let s = scraper(FetchConfig::default());
        let url = s
            .request_url("https://www.oddschecker.com/horse-racing/ascot/13:30/winner")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.oddschecker.com/horse-racing/ascot/13:30/winner"
        );
    }

    #[test]
    fn test_request_url_through_proxy() {
        let s = scraper(
            FetchConfig::default().with_proxy(Some(ProxyConfig::new("k3y").with_render_js(true))),
        );
        let url = s.request_url("https://www.oddschecker.com/").unwrap();

        assert_eq!(url.host_str(), Some("scraping.narf.ai"));
        let params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            params,
            vec![
                ("api_key".to_string(), "k3y".to_string()),
                ("url".to_string(), "https://www.oddschecker.com/".to_string()),
                ("render_js".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_absolute_url() {
        let s = scraper(FetchConfig::default());
        assert_eq!(
            s.absolute_url("/horse-racing/ascot/13:30/winner").unwrap(),
            "https://www.oddschecker.com/horse-racing/ascot/13:30/winner"
        );
        assert_eq!(
            s.absolute_url("https://example.com/x").unwrap(),
            "https://example.com/x"
        );
    }

    #[tokio::test]
    async fn test_resolve_race_from_cached_meetings() {
        let s = scraper(offline_config());
        s.meetings.insert((), fixture_meetings()).await;

        let listed = s.resolve_race("ASCOT", "14:05").await.expect("Should resolve");
        assert_eq!(listed.venue, "Ascot");
        assert!(listed.race.url.ends_with("/ascot/14:05/winner"));
        assert_eq!(listed.to_string(), "Ascot 14:05");

        let err = s.resolve_race("Ascot", "19:00").await.unwrap_err();
        assert!(matches!(err, ScraperError::RaceNotFound { .. }));

        let err = s.resolve_race("Kempton", "13:30").await.unwrap_err();
        assert!(matches!(err, ScraperError::VenueNotFound(_)));
    }

    #[tokio::test]
    async fn test_meetings_served_from_cache_until_expiry() {
        let s = scraper(offline_config().with_meetings_ttl(Duration::from_millis(100)));
        s.meetings.insert((), fixture_meetings()).await;

        let cached = s.fetch_meetings().await.expect("Should hit the cache");
        assert_eq!(cached.len(), 3);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(s.meetings.get(&()).await.is_none());
        assert!(matches!(
            s.fetch_meetings().await,
            Err(ScraperError::RetriesExhausted { .. })
        ));
    }

    #[tokio::test]
    async fn test_meetings_fetched_once_within_ttl() {
        let html = std::fs::read_to_string("fixtures/race_meets.html").expect("Failed to read fixture");
        let (base_url, hits) = serve(vec![(200, html)]).await;
        let s = scraper(FetchConfig::default().with_base_url(base_url));

        let first = s.fetch_meetings().await.expect("Should fetch meetings");
        let second = s.fetch_meetings().await.expect("Should hit the cache");
        assert_eq!(first, second);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_after_server_error() {
        let html = std::fs::read_to_string("fixtures/race_odds.html").expect("Failed to read fixture");
        let (base_url, hits) = serve(vec![(503, "busy".to_string()), (200, html)]).await;
        let s = scraper(
            FetchConfig::default()
                .with_base_url(base_url)
                .with_retry_delay(Duration::from_millis(10)),
        );

        let runners = s
            .fetch_race_odds("/horse-racing/ascot/13:30/winner")
            .await
            .expect("Second attempt should succeed");
        assert_eq!(runners.len(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_error_status_counts_as_failed_attempt() {
        let (base_url, hits) =
            serve(vec![(503, "busy".to_string()), (503, "busy".to_string())]).await;
        let s = scraper(
            FetchConfig::default()
                .with_base_url(base_url)
                .with_max_retries(2)
                .with_retry_delay(Duration::from_millis(10)),
        );

        match s.fetch_race_odds("/horse-racing/ascot/13:30/winner").await {
            Err(ScraperError::RetriesExhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 2);
                assert_eq!(last.status().map(|s| s.as_u16()), Some(503));
            }
            other => panic!("Expected RetriesExhausted, got {:?}", other.map(|r| r.len())),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted_on_unreachable_host() {
        let s = scraper(
            offline_config()
                .with_max_retries(2)
                .with_retry_delay(Duration::from_millis(10)),
        );

        match s.fetch_meetings().await {
            Err(ScraperError::RetriesExhausted { attempts, url, .. }) => {
                assert_eq!(attempts, 2);
                assert_eq!(url, "http://127.0.0.1:9");
            }
            other => panic!("Expected RetriesExhausted, got {:?}", other.map(|m| m.len())),
        }
    }
}
