use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use json::object;
use log::{info, warn};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);
const SUBJECT: &str = "Chicken gate alert";

/// Sink for latched fault messages.
///
/// Returns whether the message was accepted. Delivery failures never reach the
/// gate logic; the diagnostic log remains the durable record.
pub trait Notifier: Send {
    fn notify(&self, message: &str) -> bool;
}

/// Writes notifications to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) -> bool {
        info!("notification: {}", message);
        true
    }
}

/// Posts notifications as JSON to a webhook from a dedicated thread so a slow
/// or unreachable endpoint cannot stall the control loop.
pub struct WebhookNotifier {
    tx: Sender<String>,
}

impl WebhookNotifier {
    /// The worker exits once the notifier is dropped.
    pub fn spawn(url: String) -> (WebhookNotifier, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel::<String>();
        let thread = thread::spawn(move || {
            for message in rx {
                let body = object! {
                    title: SUBJECT,
                    message: message.as_str(),
                };
                let result = ureq::post(&url)
                    .timeout(SEND_TIMEOUT)
                    .set("Content-Type", "application/json")
                    .send_string(&json::stringify(body));
                match result {
                    Ok(_) => info!("notification sent: {}", message),
                    Err(err) => warn!("failed to send notification: {}", err),
                }
            }
            eprintln!("notification thread exiting");
        });
        (WebhookNotifier { tx }, thread)
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, message: &str) -> bool {
        self.tx.send(message.to_string()).is_ok()
    }
}
