//! Background notification delivery.
//!
//! Handlers enqueue notifications onto a bounded channel and return
//! immediately; a small pool of workers drains the channel and hands each
//! message to the configured [`Mailer`]. A full queue drops the notification
//! with a warning rather than blocking the request.

use bindery_core::config::NotifyConfig;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// A notification awaiting delivery.
///
/// Token plaintexts travel only through this path; they are never persisted
/// and never echoed back through the API.
#[derive(Clone, Debug)]
pub enum Notification {
    /// Sent after registration, carrying the activation token.
    Welcome {
        email: String,
        name: String,
        activation_token: String,
    },
    /// Sent on request, carrying the password reset token.
    PasswordReset { email: String, reset_token: String },
}

impl Notification {
    /// Short kind label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::PasswordReset { .. } => "password_reset",
        }
    }

    /// The recipient address.
    pub fn recipient(&self) -> &str {
        match self {
            Self::Welcome { email, .. } => email,
            Self::PasswordReset { email, .. } => email,
        }
    }
}

/// Notification delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Delivery backend for notifications.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Mailer that logs deliveries instead of sending them. The default backend
/// until an SMTP integration is configured.
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            kind = notification.kind(),
            recipient = notification.recipient(),
            "notification delivered to log"
        );
        Ok(())
    }
}

/// Handle for enqueueing notifications.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Notification>,
}

impl Notifier {
    /// Spawn the delivery workers and return the enqueue handle.
    ///
    /// Workers share a single receiver behind a mutex; each message is
    /// delivered inside its own spawned task so a panicking mailer takes
    /// down one delivery, not the worker.
    pub fn spawn(mailer: Arc<dyn Mailer>, config: &NotifyConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Notification>(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..config.workers.max(1) {
            let rx = rx.clone();
            let mailer = mailer.clone();
            tokio::spawn(async move {
                loop {
                    let notification = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(notification) = notification else {
                        // Channel closed: every Notifier handle is gone.
                        tracing::debug!(worker = worker, "notification worker shutting down");
                        break;
                    };

                    let kind = notification.kind();
                    let mailer = mailer.clone();
                    let handle =
                        tokio::spawn(async move { mailer.send(&notification).await });
                    match handle.await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            tracing::error!(kind = kind, error = %e, "notification delivery failed");
                        }
                        Err(join_err) if join_err.is_panic() => {
                            tracing::error!(
                                kind = kind,
                                panic = ?join_err,
                                "notification delivery panicked"
                            );
                        }
                        Err(join_err) => {
                            tracing::error!(kind = kind, error = ?join_err, "notification task failed");
                        }
                    }
                }
            });
        }

        Self { tx }
    }

    /// Enqueue a notification for background delivery.
    ///
    /// Never blocks: when the queue is full the notification is dropped and
    /// the drop is logged.
    pub fn enqueue(&self, notification: Notification) {
        let kind = notification.kind();
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(kind = kind, "notification queue full, dropping notification");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(kind = kind, "notification workers gone, dropping notification");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Mailer that records every delivery.
    struct RecordingMailer {
        sent: Mutex<Vec<Notification>>,
    }

    impl RecordingMailer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent.lock().await.push(notification.clone());
            Ok(())
        }
    }

    /// Mailer that panics on the first delivery, then records.
    struct FlakyMailer {
        calls: AtomicUsize,
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Mailer for FlakyMailer {
        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("mailer exploded");
            }
            self.delivered
                .lock()
                .await
                .push(notification.recipient().to_string());
            Ok(())
        }
    }

    fn welcome(email: &str) -> Notification {
        Notification::Welcome {
            email: email.to_string(),
            name: "Alice".to_string(),
            activation_token: "QWERTYUIOPASDFGHJKLZXCVBN2".to_string(),
        }
    }

    #[tokio::test]
    async fn test_notifications_are_delivered() {
        let mailer = RecordingMailer::new();
        let notifier = Notifier::spawn(mailer.clone(), &NotifyConfig::default());

        notifier.enqueue(welcome("a@example.com"));
        notifier.enqueue(Notification::PasswordReset {
            email: "b@example.com".to_string(),
            reset_token: "QWERTYUIOPASDFGHJKLZXCVBN2".to_string(),
        });

        for _ in 0..100 {
            if mailer.sent.lock().await.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 2);
        let mut kinds: Vec<&str> = sent.iter().map(|n| n.kind()).collect();
        kinds.sort();
        assert_eq!(kinds, ["password_reset", "welcome"]);
    }

    #[tokio::test]
    async fn test_worker_survives_panicking_mailer() {
        let mailer = Arc::new(FlakyMailer {
            calls: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        });
        let config = NotifyConfig {
            workers: 1,
            queue_capacity: 16,
        };
        let notifier = Notifier::spawn(mailer.clone(), &config);

        // First delivery panics inside the mailer; the second must still be
        // processed by the same lone worker.
        notifier.enqueue(welcome("first@example.com"));
        notifier.enqueue(welcome("second@example.com"));

        for _ in 0..100 {
            if !mailer.delivered.lock().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let delivered = mailer.delivered.lock().await;
        assert_eq!(delivered.as_slice(), ["second@example.com"]);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        // No workers draining: build the channel with capacity 1 and a
        // mailer we never let run by filling the queue synchronously.
        let mailer = RecordingMailer::new();
        let config = NotifyConfig {
            workers: 1,
            queue_capacity: 1,
        };
        let notifier = Notifier::spawn(mailer, &config);

        // Flood; enqueue must never block regardless of queue state.
        for _ in 0..50 {
            notifier.enqueue(welcome("flood@example.com"));
        }
    }
}
