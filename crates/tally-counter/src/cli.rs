#![forbid(unsafe_code)]

//! Command-line argument parsing for the counter.
//!
//! Parses args by hand and applies `TALLY_*` environment overrides first;
//! explicit flags win over the environment.

use std::env;
use std::process;
use std::str::FromStr;
use std::time::Duration;

use tally_runtime::{NotifyPolicy, RuntimeConfig};

use crate::counter::{COUNTER_TEMPLATE, CounterOptions};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
Tally Counter: a counter that increments on a timer and re-renders a template

USAGE:
    tally-counter [OPTIONS]

Press Enter to start the timer (or pass --autostart). Ctrl+C quits.

OPTIONS:
    --interval-ms=N      Timer interval in milliseconds (default: 200)
    --ticks=N            Exit after N ticks, 0 runs forever (default: 0)
    --start=N            Initial counter value (default: 0)
    --autostart          Start the timer without waiting for Enter
    --template=TEXT      Handlebars template for the view
                         (default: <span class=\"counter-value\">{{value}}</span>)
    --target=NAME        Display target name (default: counter-container)
    --isolate-failures   Keep notifying remaining views when one fails
    --no-escape          Do not HTML-escape interpolated values
    --log-level=LEVEL    trace|debug|info|warn|error (default: warn)
    --log-json           Emit logs as JSON lines on stderr
    --help, -h           Show this help message
    --version, -V        Show version

ENVIRONMENT VARIABLES:
    TALLY_INTERVAL_MS        Override --interval-ms
    TALLY_TICKS              Override --ticks
    TALLY_START              Override --start
    TALLY_AUTOSTART          Override --autostart (1/true to enable)
    TALLY_TEMPLATE           Override --template
    TALLY_TARGET             Override --target
    TALLY_ISOLATE_FAILURES   Override --isolate-failures (1/true to enable)
    TALLY_NO_ESCAPE          Override --no-escape (1/true to enable)
    TALLY_LOG_LEVEL          Override --log-level
    TALLY_LOG_JSON           Override --log-json (1/true to enable)
    RUST_LOG                 Full tracing filter; takes precedence over --log-level";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    /// Timer interval in milliseconds.
    pub interval_ms: u64,
    /// Exit after this many ticks (0 = run forever).
    pub ticks: u64,
    /// Initial counter value.
    pub start_value: u32,
    /// Start the timer immediately instead of waiting for Enter.
    pub autostart: bool,
    /// Template source (None = the stock counter template).
    pub template: Option<String>,
    /// Display target name.
    pub target: String,
    /// Isolate view failures during notification.
    pub isolate_failures: bool,
    /// HTML-escape interpolated values.
    pub escape_html: bool,
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,
    /// JSON log output.
    pub log_json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParseError {
    Help,
    Version,
    InvalidValue { flag: &'static str, value: String },
    UnknownArg(String),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Default for Opts {
    fn default() -> Self {
        Self {
            interval_ms: 200,
            ticks: 0,
            start_value: 0,
            autostart: false,
            template: None,
            target: tally_runtime::DEFAULT_DISPLAY_TARGET.into(),
            isolate_failures: false,
            escape_html: true,
            log_level: "warn".into(),
            log_json: false,
        }
    }
}

fn truthy(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

fn parse_value<T: FromStr>(flag: &'static str, val: &str) -> Result<T, ParseError> {
    val.parse().map_err(|_| ParseError::InvalidValue {
        flag,
        value: val.to_string(),
    })
}

fn parse_level(flag: &'static str, val: &str) -> Result<String, ParseError> {
    let lower = val.trim().to_ascii_lowercase();
    if LOG_LEVELS.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        Err(ParseError::InvalidValue {
            flag,
            value: val.to_string(),
        })
    }
}

impl Opts {
    /// Parse command-line arguments and environment variables.
    ///
    /// Environment variables take precedence over defaults but are overridden
    /// by explicit command-line flags.
    pub fn parse() -> Self {
        match Self::parse_from_env_and_args(env::args().skip(1), |key| env::var(key).ok()) {
            Ok(opts) => opts,
            Err(ParseError::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Err(ParseError::Version) => {
                println!("tally-counter {VERSION}");
                process::exit(0);
            }
            Err(ParseError::InvalidValue { flag, value }) => {
                eprintln!("Invalid {flag} value: {value}");
                process::exit(1);
            }
            Err(ParseError::UnknownArg(arg)) => {
                eprintln!("Unknown argument: {arg}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    fn parse_from_env_and_args<I, S, F>(args: I, get_env: F) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();

        // Environment first; malformed numbers are ignored like unset ones.
        if let Some(val) = get_env("TALLY_INTERVAL_MS")
            && let Ok(n) = val.parse()
        {
            opts.interval_ms = n;
        }
        if let Some(val) = get_env("TALLY_TICKS")
            && let Ok(n) = val.parse()
        {
            opts.ticks = n;
        }
        if let Some(val) = get_env("TALLY_START")
            && let Ok(n) = val.parse()
        {
            opts.start_value = n;
        }
        if let Some(val) = get_env("TALLY_AUTOSTART") {
            opts.autostart = truthy(&val);
        }
        if let Some(val) = get_env("TALLY_TEMPLATE")
            && !val.is_empty()
        {
            opts.template = Some(val);
        }
        if let Some(val) = get_env("TALLY_TARGET")
            && !val.trim().is_empty()
        {
            opts.target = val;
        }
        if let Some(val) = get_env("TALLY_ISOLATE_FAILURES") {
            opts.isolate_failures = truthy(&val);
        }
        if let Some(val) = get_env("TALLY_NO_ESCAPE") {
            opts.escape_html = !truthy(&val);
        }
        if let Some(val) = get_env("TALLY_LOG_LEVEL")
            && let Ok(level) = parse_level("TALLY_LOG_LEVEL", &val)
        {
            opts.log_level = level;
        }
        if let Some(val) = get_env("TALLY_LOG_JSON") {
            opts.log_json = truthy(&val);
        }

        for arg in args {
            let arg = arg.as_ref();
            match arg {
                "--help" | "-h" => return Err(ParseError::Help),
                "--version" | "-V" => return Err(ParseError::Version),
                "--autostart" => opts.autostart = true,
                "--isolate-failures" => opts.isolate_failures = true,
                "--no-escape" => opts.escape_html = false,
                "--log-json" => opts.log_json = true,
                other => {
                    if let Some(val) = other.strip_prefix("--interval-ms=") {
                        opts.interval_ms = parse_value("--interval-ms", val)?;
                    } else if let Some(val) = other.strip_prefix("--ticks=") {
                        opts.ticks = parse_value("--ticks", val)?;
                    } else if let Some(val) = other.strip_prefix("--start=") {
                        opts.start_value = parse_value("--start", val)?;
                    } else if let Some(val) = other.strip_prefix("--template=") {
                        opts.template = Some(val.to_string());
                    } else if let Some(val) = other.strip_prefix("--target=") {
                        if val.trim().is_empty() {
                            return Err(ParseError::InvalidValue {
                                flag: "--target",
                                value: val.to_string(),
                            });
                        }
                        opts.target = val.to_string();
                    } else if let Some(val) = other.strip_prefix("--log-level=") {
                        opts.log_level = parse_level("--log-level", val)?;
                    } else {
                        return Err(ParseError::UnknownArg(other.to_string()));
                    }
                }
            }
        }

        Ok(opts)
    }

    /// Runtime configuration derived from these options.
    #[must_use]
    pub fn runtime_config(&self) -> RuntimeConfig {
        let policy = if self.isolate_failures {
            NotifyPolicy::Isolate
        } else {
            NotifyPolicy::FailFast
        };
        RuntimeConfig::default()
            .with_tick_interval(Duration::from_millis(self.interval_ms))
            .with_notify_policy(policy)
            .with_display_target(self.target.clone())
    }

    /// Counter build options derived from these options.
    #[must_use]
    pub fn counter_options(&self) -> CounterOptions {
        CounterOptions {
            config: self.runtime_config(),
            template: self
                .template
                .clone()
                .unwrap_or_else(|| COUNTER_TEMPLATE.to_owned()),
            escape_html: self.escape_html,
            start_value: self.start_value,
        }
    }
}
