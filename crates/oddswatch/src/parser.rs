use std::sync::LazyLock;

use chrono::NaiveTime;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::types::{Meeting, Price, Race, RunnerOdds};

pub(crate) const UNKNOWN_VENUE: &str = "Unknown Venue";

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to parse URL: {0}")]
    UrlParse(String),
    #[error("Missing required element: {0}")]
    MissingField(String),
}

static RE_OFF_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b").expect("invalid regex: off time")
});

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_off_time(label: &str) -> Option<NaiveTime> {
    let caps = RE_OFF_TIME.captures(label)?;
    let hour = caps[1].parse::<u32>().ok()?;
    let minute = caps[2].parse::<u32>().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Parses the race meetings block of the home page into venues and their races.
pub fn parse_race_meets(html: &str, base_url: &str) -> Result<Vec<Meeting>, ParseError> {
    let base = Url::parse(base_url)
        .map_err(|e| ParseError::UrlParse(format!("{}: {}", base_url, e)))?;
    let document = Html::parse_document(html);

    let meets_sel = Selector::parse("div.race-meets").unwrap();
    let details_sel = Selector::parse("div.race-details").unwrap();
    let venue_sel = Selector::parse("a.venue").unwrap();
    let race_sel = Selector::parse("a.race-time").unwrap();

    let race_meets = document
        .select(&meets_sel)
        .next()
        .ok_or_else(|| ParseError::MissingField("div.race-meets".to_string()))?;

    let meetings = race_meets
        .select(&details_sel)
        .map(|details| {
            let venue = details
                .select(&venue_sel)
                .next()
                .map(|e| normalize_whitespace(&elem_text(e)))
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| UNKNOWN_VENUE.to_string());

            let races = details
                .select(&race_sel)
                .filter_map(|anchor| {
                    let attrs = anchor.value();
                    let (Some(time), Some(href)) =
                        (attrs.attr("data-event-name"), attrs.attr("href"))
                    else {
                        log::warn!("Skipping race link without time or href at {}", venue);
                        return None;
                    };

                    let url = match base.join(href) {
                        Ok(url) => url.to_string(),
                        Err(e) => {
                            log::warn!("Skipping race link '{}': {}", href, e);
                            return None;
                        }
                    };

                    let time = normalize_whitespace(time);
                    Some(Race {
                        off_time: parse_off_time(&time),
                        time,
                        url,
                    })
                })
                .collect();

            Meeting { venue, races }
        })
        .collect();

    Ok(meetings)
}

/// Parses the odds grid of a race page, one entry per runner row.
pub fn parse_race_odds(html: &str) -> Vec<RunnerOdds> {
    let document = Html::parse_document(html);
    let row_sel = Selector::parse("tr.diff-row, tr.evTabRow, tr.bc").unwrap();
    let cell_sel = Selector::parse("td.bc, td.bs").unwrap();

    document
        .select(&row_sel)
        .filter_map(|row| {
            let runner = row
                .value()
                .attr("data-bname")
                .map(normalize_whitespace)
                .filter(|n| !n.is_empty())?;

            let mut odds = RunnerOdds::new(runner);
            for cell in row.select(&cell_sel) {
                let Some(bookmaker) = cell.value().attr("data-bk").filter(|b| !b.is_empty())
                else {
                    continue;
                };
                let price = cell
                    .value()
                    .attr("data-odig")
                    .and_then(|raw| raw.parse::<Price>().ok());
                odds.set_price(bookmaker, price);
            }

            log::trace!("Parsed {} price(s) for {}", odds.prices.len(), odds.runner);
            Some(odds)
        })
        .collect()
}
