// # SMTP Mailer
//
// Production `Mailer` for the redirect service. Notifications are plain-text
// templates (see `template`) sent over SMTP with lettre.
//
// ## Behavior
//
// - Every notification goes to the account owner, with a blind copy to the
//   support address when one is configured
// - Templates are re-read per message
// - ❌ NO retry (the reconcilers decide what a failed send means)
//
// ## Security
//
// The SMTP password NEVER appears in logs or `Debug` output.

pub mod template;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use redirect_core::{Error, Mailer, Result};

use template::{Rendered, Templates};

/// SMTP connection and message settings
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// STARTTLS with credentials; plain unauthenticated SMTP otherwise
    pub tls: bool,
    pub login: String,
    /// ⚠️ NEVER log this value
    pub password: String,
    pub from: String,
    /// Blind copy of every notification
    pub support_address: Option<String>,
    pub template_dir: String,
    /// Substituted as `{main_domain}`
    pub main_domain: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("login", &self.login)
            .field("password", &"<REDACTED>")
            .field("from", &self.from)
            .field("support_address", &self.support_address)
            .field("template_dir", &self.template_dir)
            .field("main_domain", &self.main_domain)
            .finish()
    }
}

fn mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|_| Error::mail(format!("invalid email address: {}", address)))
}

/// Notification mailer over SMTP
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    templates: Templates,
    from: Mailbox,
    support: Option<Mailbox>,
    main_domain: String,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("templates", &self.templates)
            .field("from", &self.from)
            .field("support", &self.support)
            .field("main_domain", &self.main_domain)
            .finish()
    }
}

impl SmtpMailer {
    /// Build the transport and check that every template exists
    ///
    /// No connection is opened until the first message is sent.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let transport = if config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| Error::config(format!("invalid SMTP relay: {}", e)))?
                .port(config.port)
                .credentials(Credentials::new(
                    config.login.clone(),
                    config.password.clone(),
                ))
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .build()
        };

        let templates = Templates::new(&config.template_dir);
        templates.check()?;

        let from = mailbox(&config.from).map_err(|e| Error::config(e.to_string()))?;
        let support = config
            .support_address
            .as_deref()
            .filter(|address| !address.is_empty())
            .map(mailbox)
            .transpose()
            .map_err(|e| Error::config(e.to_string()))?;

        Ok(Self {
            transport,
            templates,
            from,
            support,
            main_domain: config.main_domain.clone(),
        })
    }

    fn message(&self, to: &str, rendered: Rendered) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(mailbox(to)?)
            .subject(rendered.subject)
            .header(ContentType::TEXT_PLAIN);
        if let Some(support) = &self.support {
            builder = builder.bcc(support.clone());
        }
        builder
            .body(rendered.body)
            .map_err(|e| Error::mail(format!("failed to build message: {}", e)))
    }

    async fn send_notification(
        &self,
        template: &str,
        to: &str,
        user_domain: Option<&str>,
    ) -> Result<()> {
        tracing::info!(template = %template, to = %to, "Sending email notification");

        let mut substitutions = vec![("main_domain", self.main_domain.as_str())];
        if let Some(user_domain) = user_domain {
            substitutions.push(("user_domain", user_domain));
        }

        let rendered = self.templates.render(template, &substitutions).await?;
        let message = self.message(to, rendered)?;
        self.transport.send(message).await.map_err(|e| {
            tracing::error!(to = %to, "Unable to send email: {}", e);
            Error::mail(format!("SMTP error: {}", e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_dns_clean_notification(&self, to: &str, domain: &str) -> Result<()> {
        self.send_notification(template::DNS_CLEAN, to, Some(domain))
            .await
    }

    async fn send_trial(&self, to: &str) -> Result<()> {
        self.send_notification(template::SUBSCRIPTION_TRIAL, to, None)
            .await
    }

    async fn send_account_lock_soon(&self, to: &str) -> Result<()> {
        self.send_notification(template::ACCOUNT_LOCK_SOON, to, None)
            .await
    }

    async fn send_account_locked(&self, to: &str) -> Result<()> {
        self.send_notification(template::ACCOUNT_LOCKED, to, None)
            .await
    }
}
