use std::{cmp::Ordering, fmt::Display, str::FromStr};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("Invalid price '{0}'. Expected decimal odds such as '5.5'")]
pub struct PriceParseError(String);

/// Decimal odds as published in a price cell, e.g. `5.5` for 9/2.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(f64);

impl Price {
    pub fn new(decimal: f64) -> Option<Self> {
        (decimal.is_finite() && decimal > 0.0).then_some(Price(decimal))
    }

    pub fn decimal(&self) -> f64 {
        self.0
    }
}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

impl FromStr for Price {
    type Err = PriceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<f64>()
            .ok()
            .and_then(Price::new)
            .ok_or_else(|| PriceParseError(s.to_string()))
    }
}

impl Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Exchange prices carry two decimals, bookmaker prices rarely more than one.
        if (self.0 * 10.0).fract().abs() < 1e-9 {
            write!(f, "{:.1}", self.0)
        } else {
            write!(f, "{:.2}", self.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Race {
    pub time: String,
    pub off_time: Option<NaiveTime>,
    pub url: String,
}

impl Race {
    pub fn matches(&self, time: &str) -> bool {
        let time = time.trim();
        if self.time.trim().eq_ignore_ascii_case(time) {
            return true;
        }
        match (self.off_time, NaiveTime::parse_from_str(time, "%H:%M")) {
            (Some(off), Ok(wanted)) => off == wanted,
            _ => false,
        }
    }
}

impl Display for Race {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}", self.time, self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub venue: String,
    pub races: Vec<Race>,
}

impl Meeting {
    pub fn find_race(&self, time: &str) -> Option<&Race> {
        self.races.iter().find(|r| r.matches(time))
    }
}

impl Display for Meeting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "┌─ {} ─ {} race(s)", self.venue, self.races.len())?;
        for race in &self.races {
            writeln!(f, "│  {}", race.time)?;
        }
        write!(f, "└─")
    }
}

/// A race together with the venue name as the site lists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedRace {
    pub venue: String,
    pub race: Race,
}

impl Display for ListedRace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.venue, self.race.time)
    }
}

pub fn find_meeting<'a>(meetings: &'a [Meeting], venue: &str) -> Option<&'a Meeting> {
    let venue = venue.trim();
    meetings
        .iter()
        .find(|m| m.venue.trim().eq_ignore_ascii_case(venue))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmakerPrice {
    pub bookmaker: String,
    pub price: Option<Price>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerOdds {
    pub runner: String,
    pub prices: Vec<BookmakerPrice>,
}

impl RunnerOdds {
    pub fn new(runner: impl Into<String>) -> Self {
        Self {
            runner: runner.into(),
            prices: Vec::new(),
        }
    }

    /// Records a price, overwriting an earlier one from the same bookmaker in place.
    pub fn set_price(&mut self, bookmaker: &str, price: Option<Price>) {
        match self.prices.iter_mut().find(|p| p.bookmaker == bookmaker) {
            Some(existing) => existing.price = price,
            None => self.prices.push(BookmakerPrice {
                bookmaker: bookmaker.to_string(),
                price,
            }),
        }
    }

    pub fn price(&self, bookmaker: &str) -> Option<Price> {
        self.prices
            .iter()
            .find(|p| p.bookmaker == bookmaker)
            .and_then(|p| p.price)
    }

    pub fn best_price(&self) -> Option<(&str, Price)> {
        self.prices
            .iter()
            .filter_map(|p| p.price.map(|price| (p.bookmaker.as_str(), price)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
    }
}

impl Display for RunnerOdds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.runner)?;
        if let Some((bookmaker, price)) = self.best_price() {
            write!(f, " (best {} @ {})", price, bookmaker)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn race(time: &str, off: Option<(u32, u32)>) -> Race {
        Race {
            time: time.to_string(),
            off_time: off.and_then(|(h, m)| NaiveTime::from_hms_opt(h, m, 0)),
            url: format!("https://www.oddschecker.com/horse-racing/ascot/{time}/winner"),
        }
    }

    #[test]
    fn test_price_from_str() {
        assert_eq!("5.5".parse::<Price>().unwrap().decimal(), 5.5);
        assert_eq!(" 2.62 ".parse::<Price>().unwrap().decimal(), 2.62);
        assert!("SP".parse::<Price>().is_err());
        assert!("0".parse::<Price>().is_err());
        assert!("".parse::<Price>().is_err());
    }

    #[test]
    fn test_price_display() {
        assert_eq!(Price::new(5.0).unwrap().to_string(), "5.0");
        assert_eq!(Price::new(5.5).unwrap().to_string(), "5.5");
        assert_eq!(Price::new(2.62).unwrap().to_string(), "2.62");
    }

    #[test]
    fn test_race_matches_label_and_off_time() {
        let r = race("13:30", Some((13, 30)));
        assert!(r.matches("13:30"));
        assert!(r.matches(" 13:30 "));
        assert!(!r.matches("14:05"));

        let labelled = race("1:30 Handicap", Some((13, 30)));
        assert!(labelled.matches("13:30"));
        assert!(labelled.matches("1:30 handicap"));
    }

    #[test]
    fn test_find_meeting_is_case_insensitive() {
        let meetings = vec![
            Meeting {
                venue: "Ascot".to_string(),
                races: vec![race("13:30", Some((13, 30)))],
            },
            Meeting {
                venue: "Leopardstown".to_string(),
                races: vec![],
            },
        ];

        let ascot = find_meeting(&meetings, "ascot").expect("Should find Ascot");
        assert_eq!(ascot.venue, "Ascot");
        assert!(ascot.find_race("13:30").is_some());
        assert!(find_meeting(&meetings, "Kempton").is_none());
    }

    #[test]
    fn test_race_display_is_plain() {
        let r = race("13:30", Some((13, 30)));
        assert_eq!(
            r.to_string(),
            "13:30 @ https://www.oddschecker.com/horse-racing/ascot/13:30/winner"
        );
        assert!(r.to_string().is_ascii());
    }

    #[test]
    fn test_set_price_overwrites_in_place() {
        let mut odds = RunnerOdds::new("Frankel");
        odds.set_price("B3", Price::new(3.0));
        odds.set_price("WH", Price::new(3.5));
        odds.set_price("B3", Price::new(2.75));

        assert_eq!(odds.prices.len(), 2);
        assert_eq!(odds.prices[0].bookmaker, "B3");
        assert_eq!(odds.price("B3"), Price::new(2.75));
        assert_eq!(odds.best_price(), Some(("WH", Price::new(3.5).unwrap())));
    }
}
