// src/exec/notification.rs

//! Best-effort desktop notifications.

use std::future::Future;
use std::io;
use std::pin::Pin;

use tokio::process::Command;

use crate::types::NotificationKind;

pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>>;

const TITLE: &str = "Nix configuration";

/// Delivery of a success/failure toast.
///
/// Implementations report delivery problems; callers are expected to drop
/// them, since a missing toast must never affect the daemon.
pub trait Notifier: Send + Sync {
    fn send(&self, kind: NotificationKind) -> NotifyFuture<'_>;
}

/// `osascript` on macOS, `notify-send` on Linux when a display is available,
/// nothing elsewhere.
#[derive(Debug, Clone, Default)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn send(&self, kind: NotificationKind) -> NotifyFuture<'_> {
        Box::pin(async move {
            let Some(mut cmd) = notification_command(std::env::consts::OS, kind) else {
                return Ok(());
            };
            let output = cmd.output().await?;
            if output.status.success() {
                Ok(())
            } else {
                Err(io::Error::other(format!(
                    "notification command exited with {}",
                    output.status
                )))
            }
        })
    }
}

fn message(os: &str, kind: NotificationKind) -> String {
    let platform = if os == "macos" { "Darwin" } else { "NixOS" };
    match kind {
        NotificationKind::Success => format!("🟢 {platform} rebuild successful!"),
        NotificationKind::Failure => format!("🔴 {platform} rebuild failed!"),
    }
}

fn notification_command(os: &str, kind: NotificationKind) -> Option<Command> {
    match os {
        "macos" => {
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(format!(
                "display notification \"{}\" with title \"{TITLE}\"",
                message(os, kind)
            ));
            Some(cmd)
        }
        "linux" if std::env::var_os("DISPLAY").is_some() => {
            let mut cmd = Command::new("notify-send");
            cmd.arg(message(os, kind)).arg(TITLE);
            Some(cmd)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_platform() {
        assert_eq!(
            message("macos", NotificationKind::Success),
            "🟢 Darwin rebuild successful!"
        );
        assert_eq!(
            message("linux", NotificationKind::Failure),
            "🔴 NixOS rebuild failed!"
        );
    }

    #[test]
    fn unsupported_platforms_send_nothing() {
        assert!(notification_command("freebsd", NotificationKind::Success).is_none());
    }

    #[test]
    fn macos_uses_osascript() {
        let cmd = notification_command("macos", NotificationKind::Failure).unwrap();
        let std_cmd = cmd.as_std();
        assert_eq!(std_cmd.get_program(), "osascript");
        let args: Vec<_> = std_cmd.get_args().collect();
        assert_eq!(args[0], "-e");
        assert!(args[1].to_string_lossy().contains("rebuild failed"));
    }
}
