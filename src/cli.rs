use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::time::Duration;

pub struct CliOptions {
    pub log_level: Option<String>,
    pub version: bool,
    pub max_concurrent: Option<usize>,
    pub threshold: Option<i64>,
    pub timeout: Option<Duration>,
    pub paths: Vec<String>,
}

impl CliOptions {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            log_level: matches.get_one::<String>("log-level").cloned(),
            version: matches.get_flag("version"),
            max_concurrent: matches.get_one::<usize>("max-concurrent").copied(),
            threshold: matches.get_one::<i64>("threshold").copied(),
            timeout: matches
                .get_one::<u64>("timeout-ms")
                .map(|ms| Duration::from_millis(*ms)),
            paths: matches
                .get_many::<String>("paths")
                .map(|v| v.cloned().collect())
                .unwrap_or_default(),
        }
    }
}

pub fn build_cli() -> Command {
    Command::new("gh-ratelimit")
        .about("Fetch GitHub API paths concurrently under both GitHub rate limits")
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .num_args(1)
                .help("Override RUST_LOG level (e.g., info, debug)"),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .help("Print version and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("max-concurrent")
                .long("max-concurrent")
                .num_args(1)
                .value_parser(value_parser!(usize))
                .help("Requests allowed in flight at once (overrides GITHUB_MAX_CONCURRENT)"),
        )
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .num_args(1)
                .value_parser(value_parser!(i64))
                .help("Pause all requests when remaining quota drops to this (overrides GITHUB_RATE_THRESHOLD)"),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .num_args(1)
                .value_parser(value_parser!(u64))
                .help("Give up on requests not admitted within this many milliseconds"),
        )
        .arg(
            Arg::new("paths")
                .value_name("PATH")
                .num_args(1..)
                .default_value("/rate_limit")
                .help("API paths to GET, relative to GITHUB_API_URL"),
        )
}

pub fn init_logging(level: Option<&str>) {
    // Explicit level wins, else RUST_LOG, else info. Logs go to stderr; stdout carries reports.
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(lvl) = level {
        builder.parse_filters(lvl);
    }
    builder.init();
}
