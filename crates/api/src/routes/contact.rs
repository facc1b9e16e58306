//! Public contact form.

use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use atelier_core::Email;

use crate::error::{AppError, Result};
use crate::response::{ApiJson, ApiResponse};
use crate::services::email::{ContactMessage, EmailOutcome};
use crate::state::AppState;

const MAX_MESSAGE_CHARS: usize = 5000;
const MAX_FIELD_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
pub struct ContactInput {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ContactReceipt {
    pub message: &'static str,
    pub delivery: EmailOutcome,
}

fn bounded(field: &str, value: &str, max: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(AppError::BadRequest(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(value.to_string())
}

impl TryFrom<ContactInput> for ContactMessage {
    type Error = AppError;

    fn try_from(input: ContactInput) -> Result<Self> {
        let email = Email::parse(&input.email)
            .map_err(|e| AppError::BadRequest(format!("email: {e}")))?;
        let subject = match input.subject.trim() {
            "" => "Website enquiry".to_string(),
            _ => bounded("subject", &input.subject, MAX_FIELD_CHARS)?,
        };
        Ok(Self {
            name: bounded("name", &input.name, MAX_FIELD_CHARS)?,
            email,
            phone: input
                .phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            subject,
            message: bounded("message", &input.message, MAX_MESSAGE_CHARS)?,
        })
    }
}

/// POST /api/contact
#[instrument(skip(state, input))]
pub async fn submit(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ContactInput>,
) -> Result<ApiResponse<ContactReceipt>> {
    let message = ContactMessage::try_from(input)?;

    let delivery = match state.email().send_contact_message(&message).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "Contact message could not be sent");
            EmailOutcome::Failed
        }
    };
    if delivery == EmailOutcome::Failed {
        warn!("Contact message delivery failed on every provider");
    }

    Ok(ApiResponse::ok(ContactReceipt {
        message: "Thanks for getting in touch",
        delivery,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> ContactInput {
        ContactInput {
            name: " Asha ".to_string(),
            email: "Asha@Example.com".to_string(),
            phone: Some(" ".to_string()),
            subject: String::new(),
            message: "Do you ship to Pune?".to_string(),
        }
    }

    #[test]
    fn test_contact_message_normalised() {
        let message = ContactMessage::try_from(input()).unwrap();
        assert_eq!(message.name, "Asha");
        assert_eq!(message.email.as_str(), "asha@example.com");
        assert_eq!(message.phone, None);
        assert_eq!(message.subject, "Website enquiry");
    }

    #[test]
    fn test_contact_message_rejects_bad_input() {
        let mut bad = input();
        bad.email = "not-an-email".to_string();
        assert!(ContactMessage::try_from(bad).is_err());

        let mut bad = input();
        bad.message = "x".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(ContactMessage::try_from(bad).is_err());

        let mut bad = input();
        bad.name = String::new();
        assert!(ContactMessage::try_from(bad).is_err());
    }
}
