/// Bookmaker codes as they appear in the `data-bk` attribute of price cells.
pub const BOOKMAKERS: &[(&str, &str)] = &[
    ("B3", "Bet365"),
    ("SK", "Skybet"),
    ("PP", "Paddy Power"),
    ("WH", "William Hill"),
    ("EE", "Betfred"),
    ("FB", "Betfair"),
    ("VC", "Betvictor"),
    ("LD", "Ladbrokes"),
    ("UN", "Unibet"),
    ("SX", "Spredex"),
    ("FR", "BETFRED"),
    ("KN", "BETMGM"),
    ("BY", "Boylesports"),
    ("OE", "10Bet"),
    ("S6", "StarSports"),
    ("DP", "BetUK"),
    ("SI", "SportingIndex"),
    ("LS", "Livescore Bet"),
    ("QN", "Quinnbet"),
    ("WA", "Betway"),
    ("CE", "Coral"),
    ("N4", "Midnite"),
    ("G5", "Bet Goodwin"),
    ("VT", "Vbet"),
    ("AKB", "AK Bets"),
    ("BF", "Betfair Exchange"),
    ("MA", "Matchbook Exchange"),
];

pub fn bookmaker_name(code: &str) -> Option<&'static str> {
    BOOKMAKERS
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
}

/// Display name for a code, falling back to the raw code when unknown.
pub fn display_name(code: &str) -> &str {
    bookmaker_name(code).unwrap_or(code)
}
