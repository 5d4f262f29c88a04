use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::time::MissedTickBehavior;

use crate::diff::{OddsTable, TableDiff};
use crate::scraper::{ScraperError, WebScraper};
use crate::types::{Race, RunnerOdds};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error(transparent)]
    Scraper(#[from] ScraperError),
    #[error("Failed to output frame: {0}")]
    Output(#[from] std::io::Error),
}

/// The race to watch: picked from today's meetings, or a race page given directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceTarget {
    Listed { venue: String, time: String },
    Url(String),
}

impl RaceTarget {
    /// Finds the race page, returning it with a title for display.
    pub async fn resolve(&self, scraper: &WebScraper) -> Result<(String, Race), ScraperError> {
        match self {
            RaceTarget::Listed { venue, time } => {
                let listed = scraper.resolve_race(venue, time).await?;
                Ok((listed.to_string(), listed.race))
            }
            RaceTarget::Url(url) => Ok((
                url.clone(),
                Race {
                    time: String::new(),
                    off_time: None,
                    url: url.clone(),
                },
            )),
        }
    }
}

/// What a single poll of the race produced.
#[derive(Debug)]
pub enum TickOutcome {
    Frame(Frame),
    /// The odds could not be fetched; the previous snapshot is kept.
    Skipped(ScraperError),
    /// The race is no longer listed, usually because it has been run.
    RaceOver(ScraperError),
}

/// One rendered state of the watched race.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub title: String,
    pub sequence: u64,
    pub updated_at: DateTime<Local>,
    pub table: OddsTable,
    pub diff: TableDiff,
}

/// Keeps the last snapshot of a race so each new one can be diffed against it.
#[derive(Debug, Default)]
pub struct Watcher {
    title: String,
    previous: Option<OddsTable>,
    sequence: u64,
}

impl Watcher {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn previous(&self) -> Option<&OddsTable> {
        self.previous.as_ref()
    }

    pub fn tick(&mut self, runners: &[RunnerOdds], now: DateTime<Local>) -> Frame {
        let table = OddsTable::from_runners(runners);
        let diff = table.diff(self.previous.as_ref());
        self.sequence += 1;

        // An empty page is usually a blocked or half-loaded response; keep diffing
        // against the last real snapshot.
        if table.is_empty() {
            log::warn!("Empty odds snapshot for {}, keeping previous", self.title);
        } else {
            self.previous = Some(table.clone());
        }

        Frame {
            title: self.title.clone(),
            sequence: self.sequence,
            updated_at: now,
            table,
            diff,
        }
    }
}

/// Polls `race` once: checks it is still listed, fetches its odds and diffs
/// them against the watcher's last snapshot.
pub async fn poll_once(
    scraper: &WebScraper,
    target: &RaceTarget,
    race: &Race,
    watcher: &mut Watcher,
) -> TickOutcome {
    if let RaceTarget::Listed { .. } = target {
        match target.resolve(scraper).await {
            Err(e @ (ScraperError::VenueNotFound(_) | ScraperError::RaceNotFound { .. })) => {
                return TickOutcome::RaceOver(e);
            }
            Err(e) => log::warn!("Could not refresh meetings: {}", e),
            Ok(_) => {}
        }
    }

    match scraper.fetch_race_odds(&race.url).await {
        Ok(runners) => TickOutcome::Frame(watcher.tick(&runners, Local::now())),
        Err(e) => TickOutcome::Skipped(e),
    }
}

/// Polls the race every `interval` (first poll immediately), handing each frame
/// to `on_frame`. Returns the number of frames produced.
///
/// Stops after `count` frames, when the race drops off the meetings list, or
/// as soon as `shutdown` completes, including part-way through a fetch.
pub async fn run<F>(
    scraper: &WebScraper,
    target: &RaceTarget,
    interval: Duration,
    count: Option<u64>,
    shutdown: impl Future<Output = ()>,
    mut on_frame: F,
) -> Result<u64, WatchError>
where
    F: FnMut(&Frame) -> std::io::Result<()>,
{
    tokio::pin!(shutdown);

    let (title, race) = tokio::select! {
        _ = &mut shutdown => return Ok(0),
        resolved = target.resolve(scraper) => resolved?,
    };
    log::info!("Watching {} every {:?}", title, interval);

    let mut watcher = Watcher::new(title);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut frames = 0;

    loop {
        let outcome = tokio::select! {
            _ = &mut shutdown => break,
            outcome = async {
                ticker.tick().await;
                poll_once(scraper, target, &race, &mut watcher).await
            } => outcome,
        };

        match outcome {
            TickOutcome::Frame(frame) => {
                on_frame(&frame)?;
                frames += 1;
            }
            TickOutcome::Skipped(e) => {
                log::warn!("Odds refresh failed, keeping last snapshot: {}", e)
            }
            TickOutcome::RaceOver(e) => {
                log::info!("{}; stopping", e);
                break;
            }
        }

        if count.is_some_and(|c| frames >= c) {
            break;
        }
    }

    log::info!("Stopped after {} frame(s)", frames);
    Ok(frames)
}
