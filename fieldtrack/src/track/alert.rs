//! User-facing failure notices.
//!
//! The logger never talks to a UI directly. It reports through an
//! [`Alerter`], which the front end implements (terminal bell, dialog,
//! notification sound).
//!
//! Three escalation levels exist:
//! - `notice` - ephemeral message, nothing to confirm
//! - `prompt` - message the user must acknowledge
//! - alarm - looping sound started after a prompt, silenced only by the
//!   acknowledgement

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Delay between a write failure and the intrusive alert.
pub const DEFAULT_ALARM_DELAY: Duration = Duration::from_secs(3);

/// Handle through which the user confirms a prompt.
#[derive(Debug, Clone, Default)]
pub struct Acknowledgement {
    token: CancellationToken,
}

impl Acknowledgement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Confirm the prompt. Idempotent.
    pub fn acknowledge(&self) {
        self.token.cancel();
    }

    pub fn is_acknowledged(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the prompt is confirmed.
    pub async fn acknowledged(&self) {
        self.token.cancelled().await
    }
}

/// Front-end hooks for failure notices.
pub trait Alerter: Send + Sync {
    /// Show a short-lived message.
    fn notice(&self, message: &str);

    /// Show a message that stays until `ack` is acknowledged.
    ///
    /// Must not block the caller; the front end acknowledges later.
    fn prompt(&self, message: &str, ack: Acknowledgement);

    /// Start a looping alarm.
    fn start_alarm(&self);

    /// Silence the alarm.
    fn stop_alarm(&self);
}

/// Alerter that only writes to the log.
///
/// There is nobody to confirm a prompt, so prompts are acknowledged as soon
/// as they are logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlerter;

impl Alerter for LogAlerter {
    fn notice(&self, message: &str) {
        info!(message, "Notice");
    }

    fn prompt(&self, message: &str, ack: Acknowledgement) {
        warn!(message, "Prompt");
        ack.acknowledge();
    }

    fn start_alarm(&self) {
        error!("Track logging alarm raised");
    }

    fn stop_alarm(&self) {
        info!("Track logging alarm silenced");
    }
}

/// Raise the delayed prompt-then-alarm sequence on a background task.
///
/// After `delay` the prompt is shown and the alarm starts looping. The alarm
/// stops once the returned acknowledgement fires. Acknowledging before the
/// delay elapses cancels the whole sequence.
pub fn raise_alarm(
    alerter: Arc<dyn Alerter>,
    message: String,
    delay: Duration,
) -> Acknowledgement {
    let ack = Acknowledgement::new();
    let task_ack = ack.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = task_ack.acknowledged() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        alerter.prompt(&message, task_ack.clone());
        alerter.start_alarm();
        task_ack.acknowledged().await;
        alerter.stop_alarm();
    });

    ack
}
