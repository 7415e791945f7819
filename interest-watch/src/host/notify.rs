//! Desktop notifications through `notify-send` or a compatible command.

use async_trait::async_trait;
use process_utils::{command_from_argv, run_to_completion};
use tracing::debug;

use crate::alert::{ChannelError, Notifier, VisualNotification};

/// Runs `<command> [-i <icon>] <title> <body>`.
pub struct CommandNotifier {
    command: Vec<String>,
}

impl CommandNotifier {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    fn arguments(notification: &VisualNotification) -> Vec<&str> {
        let mut args = Vec::with_capacity(4);
        if !notification.icon.is_empty() {
            args.push("-i");
            args.push(notification.icon.as_str());
        }
        args.push(notification.title.as_str());
        args.push(notification.body.as_str());
        args
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn show(&self, notification: &VisualNotification) -> Result<(), ChannelError> {
        let mut cmd = command_from_argv(&self.command, &[])?;
        cmd.args(Self::arguments(notification));
        run_to_completion(cmd, "notifier").await?;
        debug!(title = %notification.title, "Desktop notification shown");
        Ok(())
    }
}
