//! Terminal front end for track logging alerts.
//!
//! Prompts are `dialoguer` confirmations on their own thread so the logger
//! never blocks on the user. The alarm is the terminal bell, rung once per
//! second until the prompt is confirmed.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use dialoguer::Confirm;
use fieldtrack::track::{Acknowledgement, Alerter};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const BELL_INTERVAL: Duration = Duration::from_secs(1);

/// Alerter writing to the controlling terminal.
#[derive(Default)]
pub struct TerminalAlerter {
    alarm: Mutex<Option<CancellationToken>>,
    /// Fires once any prompt has been confirmed.
    confirmed: CancellationToken,
}

impl TerminalAlerter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wait until the user confirmed a prompt.
    pub async fn confirmed(&self) {
        self.confirmed.cancelled().await;
    }
}

impl Alerter for TerminalAlerter {
    fn notice(&self, message: &str) {
        eprintln!("Note: {}", message);
    }

    fn prompt(&self, message: &str, ack: Acknowledgement) {
        let message = message.to_string();
        let confirmed = self.confirmed.clone();

        let spawned = std::thread::Builder::new()
            .name("alert-prompt".to_string())
            .spawn(move || {
                eprintln!();
                let answer = Confirm::new()
                    .with_prompt(format!("{} Acknowledge?", message))
                    .default(true)
                    .show_default(false)
                    .interact();
                if let Err(e) = answer {
                    // No terminal to ask; treat as seen.
                    debug!(error = %e, "Prompt could not be shown");
                }
                ack.acknowledge();
                confirmed.cancel();
            });

        if let Err(e) = spawned {
            warn!(error = %e, "Failed to spawn prompt thread");
            self.confirmed.cancel();
        }
    }

    fn start_alarm(&self) {
        let token = CancellationToken::new();
        if let Some(previous) = self.alarm.lock().replace(token.clone()) {
            previous.cancel();
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            ring_bell();
            return;
        };
        runtime.spawn(async move {
            loop {
                ring_bell();
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(BELL_INTERVAL) => {}
                }
            }
        });
    }

    fn stop_alarm(&self) {
        if let Some(token) = self.alarm.lock().take() {
            token.cancel();
        }
    }
}

fn ring_bell() {
    let mut stderr = std::io::stderr();
    let _ = stderr.write_all(b"\x07");
    let _ = stderr.flush();
}
