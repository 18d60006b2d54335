use async_trait::async_trait;
use std::{fmt, process::Stdio, time::Duration};
use tokio::process::Command;

use super::{Notifier, NotifierError};

const APP_NAME: &str = "PopDesk";
const EXPIRE_MS: u32 = 10_000;
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// App id Windows uses for toasts raised from PowerShell. Unregistered ids
/// are silently dropped by the toast manager.
const POWERSHELL_APP_ID: &str =
    r"{1AC14E77-02E7-4E5D-B744-2EB1AE5198B7}\WindowsPowerShell\v1.0\powershell.exe";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Linux and BSDs, through `notify-send`.
    FreeDesktop,
    MacOs,
    Windows,
    Unsupported(&'static str),
}

impl Platform {
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(windows) {
            Self::Windows
        } else if cfg!(all(unix, not(target_os = "android"), not(target_os = "ios"))) {
            Self::FreeDesktop
        } else {
            Self::Unsupported(std::env::consts::OS)
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FreeDesktop => f.write_str("freedesktop"),
            Self::MacOs => f.write_str("macos"),
            Self::Windows => f.write_str("windows"),
            Self::Unsupported(os) => f.write_str(os),
        }
    }
}

/// Program and arguments that raise one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationCommand {
    pub program: &'static str,
    pub args: Vec<String>,
}

/// Builds the command for `platform`. No shell is involved; only the
/// scripting languages embedded in the arguments need escaping.
///
/// # Errors
/// Returns [`NotifierError::Unsupported`] for platforms without a notifier.
pub fn notification_command(
    platform: Platform,
    title: &str,
    message: &str,
) -> Result<NotificationCommand, NotifierError> {
    let cmd = match platform {
        Platform::FreeDesktop => NotificationCommand {
            program: "notify-send",
            args: vec![
                format!("--app-name={APP_NAME}"),
                format!("--expire-time={EXPIRE_MS}"),
                "--".to_owned(),
                title.to_owned(),
                message.to_owned(),
            ],
        },
        Platform::MacOs => NotificationCommand {
            program: "osascript",
            args: vec![
                "-e".to_owned(),
                format!(
                    r#"display notification "{}" with title "{}""#,
                    escape_applescript(message),
                    escape_applescript(title)
                ),
            ],
        },
        Platform::Windows => NotificationCommand {
            program: "powershell",
            args: vec![
                "-NoProfile".to_owned(),
                "-NonInteractive".to_owned(),
                "-Command".to_owned(),
                toast_script(title, message),
            ],
        },
        Platform::Unsupported(os) => {
            return Err(NotifierError::Unsupported {
                platform: os.to_owned(),
            });
        }
    };
    Ok(cmd)
}

/// Escapes text for an AppleScript double-quoted string literal.
#[must_use]
pub fn escape_applescript(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\\"),
            '"' => out.push_str(r#"\""#),
            '\r' | '\n' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

#[must_use]
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn toast_script(title: &str, message: &str) -> String {
    let xml = format!(
        r#"<toast><visual><binding template="ToastGeneric"><text>{}</text><text>{}</text></binding></visual></toast>"#,
        escape_xml(title),
        escape_xml(message)
    );
    // PowerShell single-quoted literal: only `'` is special, doubled.
    let xml = xml.replace('\'', "''");
    let app_id = POWERSHELL_APP_ID.replace('\'', "''");
    format!(
        "[Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] | Out-Null; \
         [Windows.Data.Xml.Dom.XmlDocument, Windows.Data.Xml.Dom.XmlDocument, ContentType = WindowsRuntime] | Out-Null; \
         $xml = New-Object Windows.Data.Xml.Dom.XmlDocument; \
         $xml.LoadXml('{xml}'); \
         $toast = New-Object Windows.UI.Notifications.ToastNotification $xml; \
         [Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier('{app_id}').Show($toast)"
    )
}

/// Raises native notifications by running the platform's notification tool.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    platform: Platform,
}

impl DesktopNotifier {
    #[must_use]
    pub const fn new(platform: Platform) -> Self {
        Self { platform }
    }

    #[must_use]
    pub const fn for_current_platform() -> Self {
        Self::new(Platform::current())
    }

    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn display(&self, title: &str, message: &str) -> Result<(), NotifierError> {
        let NotificationCommand { program, args } =
            notification_command(self.platform, title, message)?;

        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| NotifierError::Spawn {
                program: program.to_owned(),
                source,
            })?;

        let output = tokio::time::timeout(COMMAND_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| NotifierError::TimedOut {
                program: program.to_owned(),
                seconds: COMMAND_TIMEOUT.as_secs(),
            })?
            .map_err(|source| NotifierError::Spawn {
                program: program.to_owned(),
                source,
            })?;

        if output.status.success() {
            tracing::debug!(program, "notification displayed");
            Ok(())
        } else {
            Err(NotifierError::CommandFailed {
                program: program.to_owned(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }
}
