//! Best-effort lead detection in free-form chat text.
//!
//! This is a heuristic, not a validator. Known false positives: figures of speech that
//! look like introductions ("I am Groot", "This is Tuesday") and digit runs that happen
//! to be 10-15 digits long (order numbers). Known false negatives: names typed in
//! lowercase, single-letter names, names after phrases not listed below, and phone
//! numbers shorter than ten digits. Only user-authored turns are scanned so the
//! assistant's own contact details never produce a lead.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::chat::{ user_text, ChatMessage, Role };
use crate::models::lead::Lead;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap()
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| { Regex::new(r"\+?\(?\d[\d \t().\-]{8,}\d").unwrap() });

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?i:my name is|my name's|i['’]m|i am|this is|call me)\s+([A-Z][A-Za-z'\-]+)(?:\s+([A-Z][A-Za-z'\-]+))?"
    ).unwrap()
});

/// Words that follow "I'm"/"this is" far more often than a name does.
const NOT_A_NAME: &[&str] = &[
    "a", "an", "also", "calling", "curious", "fine", "from", "good", "happy", "here", "in",
    "interested", "just", "looking", "new", "not", "on", "ready", "still", "sure", "the",
    "thinking", "trying", "wondering", "with", "working",
];

const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 15;
const TRANSCRIPT_TURNS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contact {
    Email(String),
    Phone(String),
}

impl Contact {
    pub fn as_str(&self) -> &str {
        match self {
            Contact::Email(s) | Contact::Phone(s) => s,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadCandidate {
    pub name: Option<String>,
    pub contact: Option<Contact>,
}

impl LeadCandidate {
    /// A notification is only worth sending with both a name and a way to reach them.
    pub fn is_actionable(&self) -> bool {
        self.name.is_some() && self.contact.is_some()
    }

    /// Builds the `Lead` forwarded to the notifier, with a short transcript as the message.
    pub fn into_lead(self, source: &str, messages: &[ChatMessage]) -> Lead {
        let mut lead = Lead::new(source);
        lead.name = self.name;
        match self.contact {
            Some(Contact::Email(email)) => {
                lead.email = Some(email);
            }
            Some(Contact::Phone(phone)) => {
                lead.phone = Some(phone);
            }
            None => {}
        }
        lead.message = Some(transcript_tail(messages, TRANSCRIPT_TURNS));
        lead
    }
}

pub fn find_email(text: &str) -> Option<String> {
    EMAIL_RE.find(text).map(|m| m.as_str().trim_end_matches('.').to_string())
}

pub fn find_phone(text: &str) -> Option<String> {
    PHONE_RE.find_iter(text)
        .map(|m| m.as_str().trim())
        .find(|candidate| {
            let digits = candidate.chars().filter(char::is_ascii_digit).count();
            (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits)
        })
        .map(str::to_string)
}

pub fn find_name(text: &str) -> Option<String> {
    for caps in NAME_RE.captures_iter(text) {
        let Some(first) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        if NOT_A_NAME.contains(&first.to_lowercase().as_str()) {
            continue;
        }
        let last = caps
            .get(2)
            .map(|m| m.as_str())
            .filter(|w| !NOT_A_NAME.contains(&w.to_lowercase().as_str()));
        return Some(match last {
            Some(last) => format!("{} {}", first, last),
            None => first.to_string(),
        });
    }
    None
}

/// Scans the user's side of a conversation for a name and a contact method.
/// Email wins over phone when both appear.
pub fn extract_lead(messages: &[ChatMessage]) -> LeadCandidate {
    let text = user_text(messages);
    let contact = find_email(&text)
        .map(Contact::Email)
        .or_else(|| find_phone(&text).map(Contact::Phone));
    LeadCandidate { name: find_name(&text), contact }
}

/// The lead completed by the newest user turn, if any. A conversation that was already
/// actionable before that turn yields `None`, so each lead is forwarded once.
pub fn newly_actionable_lead(messages: &[ChatMessage]) -> Option<LeadCandidate> {
    let last_user = messages.iter().rposition(|m| m.role == Role::User)?;
    let candidate = extract_lead(messages);
    if !candidate.is_actionable() || extract_lead(&messages[..last_user]).is_actionable() {
        return None;
    }
    Some(candidate)
}

fn transcript_tail(messages: &[ChatMessage], turns: usize) -> String {
    let start = messages.len().saturating_sub(turns);
    messages[start..]
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_name_and_email_from_introduction() {
        let messages = vec![
            ChatMessage::assistant("Hi! How can I help?"),
            ChatMessage::user("My name is Ada, reach me at ada@example.com")
        ];
        let lead = extract_lead(&messages);
        assert_eq!(lead.name.as_deref(), Some("Ada"));
        assert_eq!(lead.contact, Some(Contact::Email("ada@example.com".into())));
        assert!(lead.is_actionable());
    }

    #[test]
    fn no_contact_means_not_actionable() {
        let messages = vec![ChatMessage::user("Hi, I'm Grace and I want to automate invoicing")];
        let lead = extract_lead(&messages);
        assert_eq!(lead.name.as_deref(), Some("Grace"));
        assert!(lead.contact.is_none());
        assert!(!lead.is_actionable());
    }

    #[test]
    fn assistant_contact_details_are_ignored() {
        let messages = vec![
            ChatMessage::user("This is Alan Turing"),
            ChatMessage::assistant("You can email us at hello@northwind.example")
        ];
        let lead = extract_lead(&messages);
        assert_eq!(lead.name.as_deref(), Some("Alan Turing"));
        assert!(lead.contact.is_none());
    }

    #[test]
    fn phone_used_when_no_email() {
        let messages = vec![ChatMessage::user("call me Linus, my cell is (555) 010-4477")];
        let lead = extract_lead(&messages);
        assert_eq!(lead.name.as_deref(), Some("Linus"));
        assert_eq!(lead.contact, Some(Contact::Phone("(555) 010-4477".into())));
    }

    #[test]
    fn short_digit_runs_are_not_phones() {
        assert_eq!(find_phone("we have 120 staff and 3 offices, budget 25000"), None);
        assert_eq!(find_phone("+44 20 7946 0958").as_deref(), Some("+44 20 7946 0958"));
    }

    #[test]
    fn phone_does_not_span_turns() {
        let messages = vec![
            ChatMessage::user("I'm Linus, office ext 0100 4477"),
            ChatMessage::user("20 staff, 3 sites")
        ];
        assert_eq!(find_phone(&user_text(&messages)), None);
    }

    #[test]
    fn lead_is_new_only_on_the_completing_turn() {
        let mut messages = vec![ChatMessage::user("My name is Ada")];
        assert!(newly_actionable_lead(&messages).is_none());

        messages.push(ChatMessage::assistant("How can we reach you?"));
        messages.push(ChatMessage::user("ada@example.com"));
        let lead = newly_actionable_lead(&messages).unwrap();
        assert_eq!(lead.name.as_deref(), Some("Ada"));

        messages.push(ChatMessage::assistant("Thanks!"));
        messages.push(ChatMessage::user("What do you charge?"));
        assert!(newly_actionable_lead(&messages).is_none());
    }

    #[test]
    fn filler_words_are_not_names() {
        assert_eq!(find_name("I'm Interested in a demo"), None);
        assert_eq!(find_name("I am Looking for help"), None);
        assert_eq!(find_name("i'm Margaret Hamilton"), Some("Margaret Hamilton".into()));
    }

    #[test]
    fn lowercase_names_are_a_known_miss() {
        assert_eq!(find_name("my name is ada"), None);
    }

    #[test]
    fn trailing_period_is_stripped_from_email() {
        assert_eq!(find_email("write to ada@example.com."), Some("ada@example.com".into()));
    }

    #[test]
    fn into_lead_carries_contact_and_transcript() {
        let messages = vec![
            ChatMessage::system("ignored"),
            ChatMessage::user("My name is Ada, reach me at ada@example.com"),
        ];
        let lead = extract_lead(&messages).into_lead("chat", &messages);
        assert_eq!(lead.email.as_deref(), Some("ada@example.com"));
        assert_eq!(lead.source, "chat");
        assert_eq!(
            lead.message.as_deref(),
            Some("user: My name is Ada, reach me at ada@example.com")
        );
    }
}
