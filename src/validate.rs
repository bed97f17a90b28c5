//! Presence checks on inbound bodies. Anything that fails here is a 400, never a 5xx.

use crate::error::ApiError;
use crate::models::api::LeadRequest;
use crate::models::chat::ChatMessage;

/// Returns the trimmed value when present and non-blank.
pub fn require_field<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str, ApiError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{} is required", name)))
}

pub fn require_messages(messages: &[ChatMessage]) -> Result<(), ApiError> {
    if messages.iter().any(|m| !m.content.trim().is_empty()) {
        Ok(())
    } else {
        Err(ApiError::BadRequest("messages must contain at least one non-empty message".into()))
    }
}

pub fn require_text<'a>(name: &str, value: Option<&'a str>, max_chars: usize) -> Result<&'a str, ApiError> {
    let text = require_field(name, value)?;
    if text.chars().count() > max_chars {
        return Err(ApiError::BadRequest(format!("{} must be at most {} characters", name, max_chars)));
    }
    Ok(text)
}

pub fn require_number(name: &str, value: Option<f64>) -> Result<f64, ApiError> {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        Some(_) => Err(ApiError::BadRequest(format!("{} must be a non-negative number", name))),
        None => Err(ApiError::BadRequest(format!("{} is required", name))),
    }
}

/// Shape check only: text on both sides of a single `@`, no whitespace.
pub fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) =>
            !local.is_empty() &&
                !domain.is_empty() &&
                !domain.contains('@') &&
                !value.contains(char::is_whitespace),
        None => false,
    }
}

/// Email is checked before name so an empty body reports `email`.
pub fn validate_lead(req: &LeadRequest) -> Result<(), ApiError> {
    let email = require_field("email", req.email.as_deref())?;
    if !looks_like_email(email) {
        return Err(ApiError::BadRequest("email must be a valid email address".into()));
    }
    require_field("name", req.name.as_deref())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_of(err: ApiError) -> String {
        match err {
            ApiError::BadRequest(msg) => msg,
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn empty_lead_names_email() {
        let msg = message_of(validate_lead(&LeadRequest::default()).unwrap_err());
        assert_eq!(msg, "email is required");
    }

    #[test]
    fn lead_without_name_names_name() {
        let req = LeadRequest { email: Some("ada@example.com".into()), ..Default::default() };
        assert_eq!(message_of(validate_lead(&req).unwrap_err()), "name is required");
    }

    #[test]
    fn blank_messages_are_rejected() {
        let messages = vec![ChatMessage::user("   ")];
        assert!(require_messages(&messages).is_err());
        assert!(require_messages(&[]).is_err());
        assert!(require_messages(&[ChatMessage::user("Hi")]).is_ok());
    }

    #[test]
    fn email_shape() {
        assert!(looks_like_email("ada@example.com"));
        assert!(looks_like_email("ada@localhost"));
        assert!(!looks_like_email("ada@"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("ada @example.com"));
        assert!(!looks_like_email("ada@@example.com"));
    }

    #[test]
    fn text_length_is_bounded() {
        assert!(require_text("text", Some("hello"), 5).is_ok());
        assert!(require_text("text", Some("hello!"), 5).is_err());
    }

    #[test]
    fn numbers_must_be_finite_and_non_negative() {
        assert_eq!(require_number("employees", Some(3.0)).unwrap(), 3.0);
        assert!(require_number("employees", Some(-1.0)).is_err());
        assert!(require_number("employees", Some(f64::NAN)).is_err());
        assert!(require_number("employees", None).is_err());
    }
}
