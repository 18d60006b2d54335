use clap::{ArgAction, Parser, ValueEnum};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};
use url::Url;

use crate::tunnel::TunnelOptions;

pub const DEFAULT_PORT: u16 = 8000;

/// Values shipped in `.env.example` style templates. A secret still set to
/// one of these was never filled in.
const PLACEHOLDERS: &[&str] = &[
    "your_webhook_auth_token_here",
    "your_ngrok_auth_token_here",
    "your-secret-token",
    "changeme",
    "<token>",
];

#[derive(Parser, Debug)]
#[command(
    name = "popdesk",
    version,
    about = "Relay authenticated webhooks to desktop notifications"
)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifierKind {
    /// Native desktop notification for the current platform
    #[default]
    Desktop,
    /// Publish to an ntfy topic
    Ntfy,
}

/// Raw configuration, as read from flags and the environment.
#[derive(Parser, Debug, Clone)]
pub struct Config {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease verbosity (-q, -qq, -qqq)
    #[arg(short = 'q', action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Port to listen on (takes precedence over PORT)
    #[arg(long = "port", env = "WEBHOOK_PORT")]
    pub webhook_port: Option<String>,

    /// Fallback port variable used by most hosting setups
    #[arg(long = "fallback-port", env = "PORT", hide = true)]
    pub port: Option<String>,

    /// Address to bind the HTTP server to
    #[arg(long, env = "POPDESK_BIND_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind_host: IpAddr,

    /// Shared secret expected in `Authorization: Bearer <token>`
    #[arg(long, env = "WEBHOOK_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// ngrok authtoken (required unless the tunnel is disabled)
    #[arg(long, env = "NGROK_AUTH_TOKEN", hide_env_values = true)]
    pub ngrok_auth_token: Option<String>,

    /// Reserved ngrok domain to publish on
    #[arg(long, env = "NGROK_DOMAIN")]
    pub ngrok_domain: Option<String>,

    /// Path to the ngrok agent binary
    #[arg(long, env = "POPDESK_NGROK_BIN", default_value = "ngrok")]
    pub ngrok_bin: PathBuf,

    /// Serve locally only, without opening a tunnel
    #[arg(long, env = "POPDESK_NO_TUNNEL")]
    pub no_tunnel: bool,

    /// Where notifications are delivered
    #[arg(long, env = "POPDESK_NOTIFIER", value_enum, default_value_t = NotifierKind::Desktop)]
    pub notifier: NotifierKind,

    /// ntfy topic URL (e.g., <https://ntfy.sh/my-topic>)
    #[arg(long, env = "POPDESK_NTFY_URL")]
    pub ntfy_url: Option<Url>,

    /// Optional log file path (logs are written to stdout + this file)
    #[arg(long, env = "POPDESK_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Config {
    #[must_use]
    pub fn verbosity_delta(&self) -> i16 {
        i16::from(self.verbose) - i16::from(self.quiet)
    }

    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity_delta() {
            d if d <= -2 => "error",
            -1 => "warn",
            0 => "info,popdesk=info,axum=info,tower_http=info",
            1 => "debug,popdesk=debug,axum=info,tower_http=info,reqwest=info",
            2 => "trace,popdesk=trace,axum=debug,tower_http=trace,hyper=info",
            _ => "trace,popdesk=trace,axum=trace,tower_http=trace,hyper=debug",
        }
    }

    /// Checks every variable and returns the settings the server runs with.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] listing every offending variable.
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let mut problems = Vec::new();

        let port = match (&self.webhook_port, &self.port) {
            (Some(raw), _) => parse_port("WEBHOOK_PORT", raw, &mut problems),
            (None, Some(raw)) => parse_port("PORT", raw, &mut problems),
            (None, None) => Some(DEFAULT_PORT),
        };

        let auth_token = required_secret(
            "WEBHOOK_AUTH_TOKEN",
            self.auth_token.as_deref(),
            &mut problems,
        );

        let ngrok_token = if self.no_tunnel {
            None
        } else {
            required_secret(
                "NGROK_AUTH_TOKEN",
                self.ngrok_auth_token.as_deref(),
                &mut problems,
            )
        };

        let ntfy_url = match (self.notifier, &self.ntfy_url) {
            (NotifierKind::Ntfy, None) => {
                problems.push(ConfigProblem::new(
                    "POPDESK_NTFY_URL",
                    "must be set when POPDESK_NOTIFIER=ntfy",
                ));
                None
            }
            (_, url) => url.clone(),
        };

        let (Some(port), Some(auth_token)) = (port, auth_token) else {
            return Err(ConfigError { problems });
        };
        if !problems.is_empty() {
            return Err(ConfigError { problems });
        }

        let tunnel = ngrok_token.map(|authtoken| TunnelOptions {
            binary: self.ngrok_bin.clone(),
            authtoken,
            domain: self
                .ngrok_domain
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(ToOwned::to_owned),
            port,
            startup_timeout: Duration::from_secs(15),
        });

        let notifier = match (self.notifier, ntfy_url) {
            (NotifierKind::Ntfy, Some(url)) => NotifierSettings::Ntfy(url),
            _ => NotifierSettings::Desktop,
        };

        Ok(Settings {
            bind: SocketAddr::new(self.bind_host, port),
            auth_token,
            tunnel,
            notifier,
        })
    }
}

fn parse_port(var: &'static str, raw: &str, problems: &mut Vec<ConfigProblem>) -> Option<u16> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => {
            problems.push(ConfigProblem::new(
                var,
                format!("must be an integer between 1 and 65535, got {raw:?}"),
            ));
            None
        }
        Ok(port) => Some(port),
    }
}

fn required_secret(
    var: &'static str,
    value: Option<&str>,
    problems: &mut Vec<ConfigProblem>,
) -> Option<String> {
    match value {
        None => {
            problems.push(ConfigProblem::new(var, "is not set"));
            None
        }
        Some(v) if v.trim().is_empty() => {
            problems.push(ConfigProblem::new(var, "is empty"));
            None
        }
        Some(v) if is_placeholder(v) => {
            problems.push(ConfigProblem::new(var, "is still set to a placeholder value"));
            None
        }
        Some(v) => Some(v.to_owned()),
    }
}

#[must_use]
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    PLACEHOLDERS.iter().any(|p| p.eq_ignore_ascii_case(value))
}

/// Validated, immutable configuration the server runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: SocketAddr,
    pub auth_token: String,
    /// `None` when the tunnel is disabled.
    pub tunnel: Option<TunnelOptions>,
    pub notifier: NotifierSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierSettings {
    Desktop,
    Ntfy(Url),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigProblem {
    pub variable: &'static str,
    pub reason: String,
}

impl ConfigProblem {
    fn new(variable: &'static str, reason: impl Into<String>) -> Self {
        Self {
            variable,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid configuration:{}", list_problems(.problems))]
pub struct ConfigError {
    pub problems: Vec<ConfigProblem>,
}

fn list_problems(problems: &[ConfigProblem]) -> String {
    problems
        .iter()
        .map(|p| format!("\n  {}: {}", p.variable, p.reason))
        .collect()
}
