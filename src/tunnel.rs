//! Publishes the local listener through the `ngrok` agent.
//!
//! The agent is started as a child process with JSON logging on stdout; the
//! public URL is taken from its `started tunnel` log line.

use serde::Deserialize;
use std::{path::PathBuf, process::Stdio, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines},
    process::{Child, ChildStdout, Command},
};

#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("failed to start ngrok agent `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ngrok agent reported an error: {0}")]
    Agent(String),

    #[error("ngrok agent exited before the tunnel was ready ({0})")]
    Exited(String),

    #[error("no public URL from ngrok after {0:?}")]
    Timeout(Duration),

    #[error("i/o error talking to ngrok agent: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct TunnelOptions {
    pub binary: PathBuf,
    pub authtoken: String,
    /// Reserved hostname, e.g. `example.ngrok.app`.
    pub domain: Option<String>,
    pub port: u16,
    pub startup_timeout: Duration,
}

impl TunnelOptions {
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "http".to_owned(),
            self.port.to_string(),
            "--log".to_owned(),
            "stdout".to_owned(),
            "--log-format".to_owned(),
            "json".to_owned(),
        ];
        if let Some(domain) = &self.domain {
            args.push("--domain".to_owned());
            args.push(domain.clone());
        }
        args
    }
}

/// One line of `ngrok --log-format json` output. Only the fields we act on.
#[derive(Debug, Deserialize)]
struct LogLine {
    #[serde(default)]
    lvl: String,
    #[serde(default)]
    msg: String,
    url: Option<String>,
    err: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    Started { url: String },
    Failed { reason: String },
    Other,
}

/// Classifies a single agent log line. Non-JSON lines are ignored.
#[must_use]
pub fn parse_log_line(line: &str) -> AgentEvent {
    let Ok(entry) = serde_json::from_str::<LogLine>(line) else {
        return AgentEvent::Other;
    };

    if entry.msg == "started tunnel" {
        if let Some(url) = entry.url.filter(|u| !u.is_empty()) {
            return AgentEvent::Started { url };
        }
    }

    match (entry.lvl.as_str(), entry.err) {
        ("crit" | "eror", Some(err)) if !err.is_empty() && err != "<nil>" => {
            AgentEvent::Failed { reason: err }
        }
        ("crit", None) => AgentEvent::Failed { reason: entry.msg },
        _ => AgentEvent::Other,
    }
}

pub struct NgrokTunnel {
    child: Child,
    public_url: String,
}

impl NgrokTunnel {
    /// Starts the agent and waits until it reports a public URL.
    ///
    /// # Errors
    /// Fails if the agent cannot be spawned, reports an error, exits, or stays
    /// silent past `startup_timeout`. The child is killed in every case.
    pub async fn open(options: &TunnelOptions) -> Result<Self, TunnelError> {
        let mut child = Command::new(&options.binary)
            .args(options.args())
            .env("NGROK_AUTHTOKEN", &options.authtoken)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TunnelError::Spawn {
                binary: options.binary.display().to_string(),
                source,
            })?;

        let Some(stdout) = child.stdout.take() else {
            return Err(TunnelError::Exited("stdout not captured".into()));
        };
        let mut lines = BufReader::new(stdout).lines();

        let waited = tokio::time::timeout(options.startup_timeout, wait_for_url(&mut lines)).await;
        let public_url = match waited {
            Ok(Ok(Some(url))) => url,
            Ok(Ok(None)) => {
                let status = child.wait().await?;
                return Err(TunnelError::Exited(status.to_string()));
            }
            Ok(Err(e)) => {
                child.kill().await.ok();
                return Err(e);
            }
            Err(_) => {
                child.kill().await.ok();
                return Err(TunnelError::Timeout(options.startup_timeout));
            }
        };

        // Keep reading so the agent never blocks on a full pipe.
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(target: "popdesk::ngrok", "{line}");
            }
        });

        tracing::info!(url = %public_url, "tunnel established");
        Ok(Self { child, public_url })
    }

    #[must_use]
    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    /// Stops the agent, which takes the public endpoint down with it.
    ///
    /// # Errors
    /// Returns an error if the agent could not be killed or reaped.
    pub async fn close(mut self) -> Result<(), TunnelError> {
        tracing::info!(url = %self.public_url, "closing tunnel");
        self.child.kill().await?;
        Ok(())
    }
}

async fn wait_for_url(
    lines: &mut Lines<BufReader<ChildStdout>>,
) -> Result<Option<String>, TunnelError> {
    while let Some(line) = lines.next_line().await? {
        match parse_log_line(&line) {
            AgentEvent::Started { url } => return Ok(Some(url)),
            AgentEvent::Failed { reason } => return Err(TunnelError::Agent(reason)),
            AgentEvent::Other => tracing::trace!(target: "popdesk::ngrok", "{line}"),
        }
    }
    Ok(None)
}
