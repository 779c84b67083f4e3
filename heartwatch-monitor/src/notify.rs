/*!
 * RESTART NOTIFICATIONS - plain-text mail when a restart is confirmed
 *
 * The sink only hands a [`RestartNotice`] to a [`RestartNotifier`]. The SMTP
 * implementation queues it to a background task, so a slow or unreachable
 * mail server never holds up heartbeat handling. Send failures are logged
 * with the `[EMAIL]` tag and dropped.
 */

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::EmailConf;

const SMTP_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("email build error: {0}")]
    Build(String),

    #[error("email enabled without {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestartNotice {
    pub topic: String,
    pub mac: String,
    pub d1: f64,
    pub d2: f64,
    /// Display-formatted T1, T2, T3.
    pub timestamps: [String; 3],
}

impl RestartNotice {
    pub const SUBJECT_SUFFIX: &'static str = "[DEVICE RESTART Confirmed]";

    pub fn subject(&self, prefix: &str) -> String {
        format!("{prefix} {}", Self::SUBJECT_SUFFIX)
    }

    pub fn body(&self) -> String {
        let [t1, t2, t3] = &self.timestamps;
        format!(
            "Heartwatch Alert\n\
             ================\n\n\
             Topic: {}\n\
             Problem        : Device Restart Confirmed\n\
             MAC            : {}\n\
             duration1      : {:.1}\n\
             duration2      : {:.1}\n\
             T1             : {t1}\n\
             T2             : {t2}\n\
             T3             : {t3}\n\n",
            self.topic, self.mac, self.d1, self.d2
        )
    }
}

pub trait RestartNotifier: Send + Sync {
    /// Must not block; delivery happens elsewhere.
    fn notify_restart(&self, notice: RestartNotice);
}

/// SMTP delivery through a queue drained by one tokio task.
pub struct EmailNotifier {
    queue: mpsc::UnboundedSender<RestartNotice>,
}

struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    subject_prefix: String,
}

impl Mailer {
    fn from_conf(conf: &EmailConf) -> Result<Self, EmailError> {
        if conf.smtp_host.is_empty() {
            return Err(EmailError::Missing("smtp_host"));
        }
        if conf.recipients.is_empty() {
            return Err(EmailError::Missing("recipients"));
        }

        let from = conf
            .from
            .as_ref()
            .or(conf.username.as_ref())
            .ok_or(EmailError::Missing("from"))?
            .parse::<Mailbox>()?;
        let to = conf
            .recipients
            .iter()
            .map(|r| r.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = if conf.implicit_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&conf.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&conf.smtp_host)?
        }
        .port(conf.smtp_port)
        .timeout(Some(SMTP_TIMEOUT));

        if let (Some(user), Some(pass)) = (&conf.username, conf.password()) {
            builder = builder.credentials(Credentials::new(user.clone(), pass));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
            subject_prefix: conf.subject_prefix.clone(),
        })
    }

    async fn send(&self, notice: &RestartNotice) -> Result<(), EmailError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(notice.subject(&self.subject_prefix))
            .header(ContentType::TEXT_PLAIN);
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        let email = builder
            .body(notice.body())
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.transport.send(email).await?;
        Ok(())
    }
}

impl EmailNotifier {
    /// Validate the settings and start the delivery task. Must be called
    /// inside a tokio runtime.
    pub fn spawn(conf: &EmailConf) -> Result<Self, EmailError> {
        let mailer = Mailer::from_conf(conf)?;
        let (queue, mut rx) = mpsc::unbounded_channel::<RestartNotice>();

        tokio::spawn(async move {
            while let Some(notice) = rx.recv().await {
                match mailer.send(&notice).await {
                    Ok(()) => info!("[EMAIL] restart notice sent mac={}", notice.mac),
                    Err(e) => error!("[EMAIL] send failed: {e}"),
                }
            }
        });

        Ok(Self { queue })
    }
}

impl RestartNotifier for EmailNotifier {
    fn notify_restart(&self, notice: RestartNotice) {
        if self.queue.send(notice).is_err() {
            error!("[EMAIL] delivery task is gone, notice dropped");
        }
    }
}
