//! Email service for order confirmations and contact-form messages.
//!
//! Delivery tries the Mailgun HTTP API first, then an SMTP relay via lettre.
//! Provider failures are logged and never propagate to the caller; the
//! result says which provider (if any) accepted the message.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use atelier_core::{CurrencyCode, Email};

use crate::config::{EmailConfig, MailgunConfig};
use crate::models::order::Order;

struct EmailLine {
    name: String,
    variant: String,
    quantity: i32,
    line_total: String,
}

/// HTML template for order confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    name: &'a str,
    order_number: &'a str,
    lines: &'a [EmailLine],
    subtotal: &'a str,
    shipping: &'a str,
    total: &'a str,
    address: &'a [String],
}

/// Plain text template for order confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    name: &'a str,
    order_number: &'a str,
    lines: &'a [EmailLine],
    subtotal: &'a str,
    shipping: &'a str,
    total: &'a str,
    address: &'a [String],
}

/// HTML template for contact-form messages.
#[derive(Template)]
#[template(path = "email/contact.html")]
struct ContactHtml<'a> {
    message: &'a ContactMessage,
}

/// Plain text template for contact-form messages.
#[derive(Template)]
#[template(path = "email/contact.txt")]
struct ContactText<'a> {
    message: &'a ContactMessage,
}

/// A message submitted through the public contact form.
#[derive(Debug, Clone)]
pub struct ContactMessage {
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Mailgun HTTP error.
    #[error("Mailgun error: {0}")]
    Mailgun(#[from] reqwest::Error),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A provider that accepted a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailProvider {
    Mailgun,
    Smtp,
}

/// What happened to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "provider", rename_all = "snake_case")]
pub enum EmailOutcome {
    Sent(EmailProvider),
    /// No provider is configured (or no recipient).
    Skipped,
    /// Every configured provider refused the message.
    Failed,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    http: reqwest::Client,
    mailgun: Option<MailgunConfig>,
    smtp: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: String,
    contact_inbox: Option<String>,
    currency: CurrencyCode,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay host is invalid.
    pub fn new(config: &EmailConfig, currency: CurrencyCode) -> Result<Self, EmailError> {
        let smtp = config
            .smtp
            .as_ref()
            .map(|smtp| {
                let credentials = Credentials::new(
                    smtp.username.clone(),
                    smtp.password.expose_secret().to_string(),
                );
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host).map(|builder| {
                    builder.port(smtp.port).credentials(credentials).build()
                })
            })
            .transpose()?;

        Ok(Self {
            http: reqwest::Client::new(),
            mailgun: config.mailgun.clone(),
            smtp,
            from_address: config.from_address.clone(),
            contact_inbox: config.contact_inbox.clone(),
            currency,
        })
    }

    /// Whether any provider is configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.mailgun.is_some() || self.smtp.is_some()
    }

    /// Send the order confirmation to the customer.
    ///
    /// # Errors
    ///
    /// Returns error only if the templates fail to render.
    #[instrument(skip(self, order, to, name), fields(order_number = %order.order_number))]
    pub async fn send_order_confirmation(
        &self,
        order: &Order,
        to: &Email,
        name: &str,
    ) -> Result<EmailOutcome, EmailError> {
        let money = |amount| self.currency.display(amount);
        let lines: Vec<EmailLine> = order
            .items
            .iter()
            .map(|item| EmailLine {
                name: item.name.clone(),
                variant: format!("{} / {}", item.color, item.size),
                quantity: item.quantity,
                line_total: money(item.line_total),
            })
            .collect();
        let address = address_lines(order);
        let subtotal = money(order.subtotal);
        let shipping = money(order.shipping_cost);
        let total = money(order.total);

        let html = OrderConfirmationHtml {
            name,
            order_number: &order.order_number,
            lines: &lines,
            subtotal: &subtotal,
            shipping: &shipping,
            total: &total,
            address: &address,
        }
        .render()?;
        let text = OrderConfirmationText {
            name,
            order_number: &order.order_number,
            lines: &lines,
            subtotal: &subtotal,
            shipping: &shipping,
            total: &total,
            address: &address,
        }
        .render()?;

        let subject = format!("Your Atelier order {}", order.order_number);
        Ok(self.send(to.as_str(), &subject, &text, &html, None).await)
    }

    /// Forward a contact-form message to the store inbox.
    ///
    /// # Errors
    ///
    /// Returns error only if the templates fail to render.
    #[instrument(skip(self, message))]
    pub async fn send_contact_message(
        &self,
        message: &ContactMessage,
    ) -> Result<EmailOutcome, EmailError> {
        let Some(inbox) = self.contact_inbox.as_deref() else {
            info!("No contact inbox configured, message not forwarded");
            return Ok(EmailOutcome::Skipped);
        };

        let html = ContactHtml { message }.render()?;
        let text = ContactText { message }.render()?;
        let subject = format!("[Contact] {}", message.subject);

        Ok(self
            .send(inbox, &subject, &text, &html, Some(message.email.as_str()))
            .await)
    }

    /// Try each configured provider in turn.
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
        reply_to: Option<&str>,
    ) -> EmailOutcome {
        if !self.is_configured() {
            info!(to = %to, subject = %subject, "No email provider configured, skipping");
            return EmailOutcome::Skipped;
        }

        if let Some(mailgun) = &self.mailgun {
            match self
                .send_mailgun(mailgun, to, subject, text_body, html_body, reply_to)
                .await
            {
                Ok(()) => {
                    info!(to = %to, subject = %subject, "Email sent via Mailgun");
                    return EmailOutcome::Sent(EmailProvider::Mailgun);
                }
                Err(e) => warn!(error = %e, "Mailgun delivery failed"),
            }
        }

        if let Some(mailer) = &self.smtp {
            match self
                .send_smtp(mailer, to, subject, text_body, html_body, reply_to)
                .await
            {
                Ok(()) => {
                    info!(to = %to, subject = %subject, "Email sent via SMTP");
                    return EmailOutcome::Sent(EmailProvider::Smtp);
                }
                Err(e) => warn!(error = %e, "SMTP delivery failed"),
            }
        }

        warn!(to = %to, subject = %subject, "Email could not be delivered");
        EmailOutcome::Failed
    }

    async fn send_mailgun(
        &self,
        mailgun: &MailgunConfig,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
        reply_to: Option<&str>,
    ) -> Result<(), EmailError> {
        let url = format!("{}/v3/{}/messages", mailgun.base_url, mailgun.domain);

        let mut form = vec![
            ("from", self.from_address.as_str()),
            ("to", to),
            ("subject", subject),
            ("text", text_body),
            ("html", html_body),
        ];
        if let Some(reply_to) = reply_to {
            form.push(("h:Reply-To", reply_to));
        }

        self.http
            .post(url)
            .basic_auth("api", Some(mailgun.api_key.expose_secret()))
            .form(&form)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_smtp(
        &self,
        mailer: &AsyncSmtpTransport<Tokio1Executor>,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
        reply_to: Option<&str>,
    ) -> Result<(), EmailError> {
        let mut builder = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject);
        if let Some(reply_to) = reply_to {
            builder = builder.reply_to(
                reply_to
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(reply_to.to_string()))?,
            );
        }

        let email = builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(text_body.to_string()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html_body.to_string()),
                ),
        )?;

        mailer.send(email).await?;
        Ok(())
    }
}

fn address_lines(order: &Order) -> Vec<String> {
    let a = &order.shipping_address;
    [
        Some(a.full_name.clone()),
        Some(a.line1.clone()),
        a.line2.clone().filter(|l| !l.trim().is_empty()),
        Some(format!("{}, {} {}", a.city, a.state, a.postal_code)),
        Some(a.country.clone()),
        Some(a.phone.clone()),
    ]
    .into_iter()
    .flatten()
    .collect()
}
