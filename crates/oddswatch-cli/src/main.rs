use std::io::{IsTerminal, Write};
use std::process;
use std::time::Duration;

use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use crossterm::{cursor, execute, terminal};
use log::LevelFilter;
use oddswatch::bookmakers::BOOKMAKERS;
use oddswatch::render::{RenderOptions, render_bookmakers, render_frame};
use oddswatch::watch::{self, Frame, Watcher};
use oddswatch::{FetchConfig, ProxyConfig, RaceTarget, WebScraper};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "oddswatch")]
#[command(about = "Live UK & IRE horse racing odds from oddschecker.com", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[command(flatten)]
    fetch: FetchArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Args)]
struct FetchArgs {
    #[arg(
        long,
        env = "NARF_API_KEY",
        hide_env_values = true,
        global = true,
        help = "API key for the scraping proxy"
    )]
    api_key: Option<String>,

    #[arg(
        long,
        global = true,
        help = "Fetch pages directly instead of through the scraping proxy"
    )]
    no_proxy: bool,

    #[arg(long, global = true, help = "Ask the proxy to render JavaScript")]
    render_js: bool,

    #[arg(
        long,
        global = true,
        default_value = "https://www.oddschecker.com",
        help = "Site to scrape"
    )]
    base_url: String,

    #[arg(
        long,
        global = true,
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Attempts per page before giving up"
    )]
    retries: u32,

    #[arg(
        long,
        global = true,
        value_name = "SECONDS",
        default_value_t = 5,
        help = "Delay between attempts"
    )]
    retry_delay: u64,
}

impl FetchArgs {
    fn into_config(self) -> Result<FetchConfig, String> {
        let proxy = match (self.api_key, self.no_proxy) {
            (_, true) => None,
            (Some(key), false) => Some(ProxyConfig::new(key).with_render_js(self.render_js)),
            (None, false) => {
                return Err(
                    "No proxy API key: pass --api-key, set NARF_API_KEY, or use --no-proxy"
                        .to_string(),
                );
            }
        };

        Ok(FetchConfig::default()
            .with_base_url(self.base_url)
            .with_proxy(proxy)
            .with_max_retries(self.retries)
            .with_retry_delay(Duration::from_secs(self.retry_delay)))
    }
}

#[derive(Debug, Args)]
struct RaceArgs {
    #[arg(long, requires = "time", required_unless_present = "url", help = "Venue name")]
    venue: Option<String>,

    #[arg(
        long,
        value_name = "HH:MM",
        requires = "venue",
        help = "Race time at the venue"
    )]
    time: Option<String>,

    #[arg(long, conflicts_with_all = ["venue", "time"], help = "Race page URL")]
    url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List today's meetings and their race times
    Meetings {
        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Fetch one snapshot of a race's odds
    Odds {
        #[command(flatten)]
        race: RaceArgs,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,

        #[arg(long, help = "Show bookmaker names instead of codes")]
        names: bool,
    },
    /// Poll a race and redraw its odds table, highlighting price movements
    Watch {
        #[command(flatten)]
        race: RaceArgs,

        #[arg(
            long,
            value_name = "SECONDS",
            default_value_t = 11,
            value_parser = clap::value_parser!(u64).range(1..),
            help = "Seconds between refreshes"
        )]
        interval: u64,

        #[arg(long, help = "Stop after this many frames")]
        count: Option<u64>,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format (json prints one frame per line)"
        )]
        format: OutputFormat,

        #[arg(long, help = "Show bookmaker names instead of codes")]
        names: bool,

        #[arg(long, help = "Disable coloured price movements")]
        no_color: bool,
    },
    /// Show the bookmaker code legend
    Bookmakers {
        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
}

impl RaceArgs {
    fn into_target(self) -> RaceTarget {
        match (self.url, self.venue, self.time) {
            (Some(url), _, _) => RaceTarget::Url(url),
            (None, Some(venue), Some(time)) => RaceTarget::Listed { venue, time },
            // clap enforces one of the two forms
            _ => unreachable!("race arguments validated by clap"),
        }
    }
}

#[derive(Serialize)]
struct BookmakerEntry {
    code: &'static str,
    name: &'static str,
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn draw(frame: &Frame, format: OutputFormat, opts: RenderOptions) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    match format {
        OutputFormat::Json => {
            let line = serde_json::to_string(frame).map_err(std::io::Error::other)?;
            writeln!(stdout, "{}", line)?;
        }
        OutputFormat::Text => {
            if stdout.is_terminal() {
                execute!(
                    stdout,
                    terminal::Clear(terminal::ClearType::All),
                    cursor::MoveTo(0, 0)
                )?;
            }
            write!(stdout, "{}", render_frame(frame, opts))?;
        }
    }
    stdout.flush()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    if let Commands::Bookmakers { format } = cli.command {
        match format {
            OutputFormat::Json => serialize_json(
                &BOOKMAKERS
                    .iter()
                    .map(|&(code, name)| BookmakerEntry { code, name })
                    .collect::<Vec<_>>(),
            ),
            OutputFormat::Text => print!("{}", render_bookmakers()),
        }
        return;
    }

    let config = cli.fetch.into_config().unwrap_or_else(|e| {
        log::error!("Invalid args: {e}");
        process::exit(1);
    });

    let scraper = WebScraper::new(config).unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    });

    match cli.command {
        Commands::Meetings { format } => {
            let meetings = scraper.fetch_meetings().await.unwrap_or_else(|e| {
                log::error!("Error fetching meetings: {}", e);
                process::exit(1);
            });

            match format {
                OutputFormat::Json => serialize_json(&meetings),
                OutputFormat::Text => {
                    if meetings.is_empty() {
                        println!("No meetings to display.");
                    }
                    for meeting in &meetings {
                        println!("{}", meeting);
                    }
                }
            }
        }

        Commands::Odds {
            race,
            format,
            names,
        } => {
            let (title, race) = race
                .into_target()
                .resolve(&scraper)
                .await
                .unwrap_or_else(|e| {
                    log::error!("Error resolving race: {}", e);
                    process::exit(1);
                });

            let runners = scraper.fetch_race_odds(&race.url).await.unwrap_or_else(|e| {
                log::error!("Error fetching odds: {}", e);
                process::exit(1);
            });

            match format {
                OutputFormat::Json => serialize_json(&runners),
                OutputFormat::Text => {
                    let frame = Watcher::new(title).tick(&runners, Local::now());
                    let opts = RenderOptions {
                        color: false,
                        names,
                    };
                    print!("{}", render_frame(&frame, opts));
                }
            }
        }

        Commands::Watch {
            race,
            interval,
            count,
            format,
            names,
            no_color,
        } => {
            let opts = RenderOptions {
                color: !no_color && std::io::stdout().is_terminal(),
                names,
            };

            let ctrl_c = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            if let Err(e) = watch::run(
                &scraper,
                &race.into_target(),
                Duration::from_secs(interval),
                count,
                ctrl_c,
                |frame| draw(frame, format, opts),
            )
            .await
            {
                log::error!("Error watching race: {}", e);
                process::exit(1);
            }
        }

        Commands::Bookmakers { .. } => unreachable!("handled before building the scraper"),
    }
}
