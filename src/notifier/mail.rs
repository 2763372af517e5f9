use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

use crate::config::{Config, MailRetry};
use crate::error::{AppError, Result};
use crate::logging::critical;

/// Something that can open authenticated mail sessions.
#[async_trait]
pub trait MailRelay: Send + Sync {
    type Session: MailSession;

    /// Connect and authenticate. One attempt, no retry.
    async fn open(&self) -> Result<Self::Session>;
}

/// An authenticated connection. Held for a single batch, then closed.
#[async_trait]
pub trait MailSession: Send {
    /// Send one plain-text body from the configured sender to the recipient.
    async fn send(&mut self, body: &str) -> Result<()>;

    async fn close(self);
}

/// Acquire a session, retrying failed logins. Returns `None` once every
/// attempt failed; callers must treat that as fatal.
pub async fn init_session<R: MailRelay>(relay: &R, retry: MailRetry) -> Option<R::Session> {
    for attempt in 1..=retry.attempts {
        match relay.open().await {
            Ok(session) => {
                debug!(attempt, "Mail session opened");
                return Some(session);
            }
            Err(e) => {
                warn!(attempt, "Unable to log into email ({e}). Trying again # {attempt}.");
                if attempt < retry.attempts {
                    tokio::time::sleep(retry.retry_delay).await;
                }
            }
        }
    }

    critical!(attempts = retry.attempts, "Unable to log in to email. Aborting.");
    None
}

// ---------------------------------------------------------------------------
// SMTP
// ---------------------------------------------------------------------------

/// STARTTLS relay with LOGIN/PLAIN authentication.
pub struct SmtpRelay {
    host: String,
    port: u16,
    credentials: Credentials,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpRelay {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let from: Mailbox = cfg.sender_address.parse()?;
        Ok(Self {
            host: cfg.smtp_host.clone(),
            port: cfg.smtp_port,
            // the login is the bare address, without any display name
            credentials: Credentials::new(from.email.to_string(), cfg.sender_password.clone()),
            from,
            to: cfg.recipient_address.parse()?,
        })
    }
}

#[async_trait]
impl MailRelay for SmtpRelay {
    type Session = SmtpSession;

    async fn open(&self) -> Result<SmtpSession> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)?
            .port(self.port)
            .credentials(self.credentials.clone())
            .build();

        // Connects, upgrades to TLS and authenticates; the pooled connection
        // is then reused by every send in the batch.
        if !transport.test_connection().await? {
            return Err(AppError::Mail(format!(
                "{}:{} accepted the login but the connection did not respond",
                self.host, self.port
            )));
        }

        info!(host = %self.host, port = self.port, "Logged in to mail relay");
        Ok(SmtpSession {
            transport,
            from: self.from.clone(),
            to: self.to.clone(),
        })
    }
}

pub struct SmtpSession {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

#[async_trait]
impl MailSession for SmtpSession {
    async fn send(&mut self, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;
        self.transport.send(message).await?;
        Ok(())
    }

    async fn close(self) {
        // Dropping the transport closes its pooled connections.
        drop(self.transport);
        debug!("Mail session closed");
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory relay shared by the notifier and watcher tests.

    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    pub struct Outbox {
        pub sent: Vec<String>,
        pub opened: u32,
        pub closed: u32,
        pub login_attempts: u32,
    }

    /// Fails the first `failed_logins` opens, and any send whose body
    /// contains one of `reject`.
    #[derive(Clone, Default)]
    pub struct FakeRelay {
        pub outbox: Arc<Mutex<Outbox>>,
        pub failed_logins: u32,
        pub reject: HashSet<String>,
    }

    impl FakeRelay {
        pub fn outbox(&self) -> std::sync::MutexGuard<'_, Outbox> {
            self.outbox.lock().unwrap()
        }
    }

    pub struct FakeSession {
        outbox: Arc<Mutex<Outbox>>,
        reject: HashSet<String>,
    }

    #[async_trait]
    impl MailRelay for FakeRelay {
        type Session = FakeSession;

        async fn open(&self) -> Result<FakeSession> {
            let mut outbox = self.outbox.lock().unwrap();
            outbox.login_attempts += 1;
            if outbox.login_attempts <= self.failed_logins {
                return Err(AppError::Mail("535 authentication failed".to_string()));
            }
            outbox.opened += 1;
            Ok(FakeSession {
                outbox: Arc::clone(&self.outbox),
                reject: self.reject.clone(),
            })
        }
    }

    #[async_trait]
    impl MailSession for FakeSession {
        async fn send(&mut self, body: &str) -> Result<()> {
            if self.reject.iter().any(|r| body.contains(r.as_str())) {
                return Err(AppError::Mail("554 message rejected".to_string()));
            }
            self.outbox.lock().unwrap().sent.push(body.to_string());
            Ok(())
        }

        async fn close(self) {
            self.outbox.lock().unwrap().closed += 1;
        }
    }
}
