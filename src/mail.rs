use crate::errors::*;
use crate::render::{self, HtmlReport, TextReport};
use crate::report::ReportContext;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

pub const DEFAULT_SENDER: &str = "notifications@sysdig.com";
pub const DEFAULT_SMTP_PORT: u16 = 25;
/// Port that gets implicit TLS instead of opportunistic STARTTLS
pub const SMTPS_PORT: u16 = 465;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub recipients: Vec<String>,
    pub sender: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub credentials: Option<(String, String)>,
}

fn mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .with_context(|| anyhow!("Invalid email address: {:?}", address))
}

/// Notification with a plain text and an html alternative
pub fn build_message(ctx: &ReportContext, config: &MailConfig) -> Result<Message> {
    if config.recipients.is_empty() {
        bail!("No email recipients configured");
    }

    let mut builder = Message::builder()
        .from(mailbox(&config.sender)?)
        .subject(render::subject(ctx));
    for recipient in &config.recipients {
        builder = builder.to(mailbox(recipient)?);
    }

    let text = TextReport(ctx).to_string();
    let html = HtmlReport(ctx).to_string();
    let message = builder
        .multipart(MultiPart::alternative_plain_html(text, html))
        .context("Failed to build email")?;
    Ok(message)
}

fn transport(config: &MailConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    let builder = if config.smtp_port == SMTPS_PORT {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
    } else {
        let tls = TlsParameters::new(config.smtp_host.clone())?;
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            .tls(Tls::Opportunistic(tls))
    };
    let mut builder = builder.port(config.smtp_port);

    if let Some((user, pass)) = &config.credentials {
        builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
    }

    Ok(builder.build())
}

pub async fn send(ctx: &ReportContext, config: &MailConfig) -> Result<()> {
    let message = build_message(ctx, config)?;
    let transport = transport(config)?;

    info!(
        "Sending email to {:?} via {}:{}",
        config.recipients, config.smtp_host, config.smtp_port
    );
    let response = transport
        .send(message)
        .await
        .context("Failed to send email")?;
    info!("Message sent: {}", response.code());

    Ok(())
}
