//! Inbound email threading.
//!
//! A message joins an existing ticket when its `In-Reply-To` / `References`
//! ids match the ticket's origin message or one of its comments, or when the
//! subject carries a `[TKT-nnnnnn]` tag. Anything else opens a new ticket.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TICKET_TAG_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\[(TKT-\d{6,})\]").ok());
static REPLY_PREFIX_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*((re|fw|fwd|aw|wg)\s*:\s*)+").ok());
static QUOTE_HEADER_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^On .+ wrote:\s*$").ok());

/// Parsed message as handed over by the mail gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEmail {
    pub message_id: String,
    pub in_reply_to: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
    pub from_address: String,
    pub from_name: Option<String>,
    /// Recipient address, matched against the helpdesk's email configs.
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum InboundOutcome {
    Commented { ticket_id: uuid::Uuid, comment_id: uuid::Uuid },
    Created { ticket_id: uuid::Uuid, ticket_number: String },
}

/// Strips angle brackets and surrounding whitespace from a message id.
pub fn normalize_message_id(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
        .to_string()
}

impl InboundEmail {
    pub fn normalized_message_id(&self) -> String {
        normalize_message_id(&self.message_id)
    }

    /// Message ids this email may be replying to, most specific first.
    pub fn thread_candidates(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        let direct = self.in_reply_to.iter();
        let refs = self.references.iter().rev();
        for id in direct.chain(refs).map(|s| normalize_message_id(s)) {
            if !id.is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    pub fn ticket_tag(&self) -> Option<String> {
        extract_ticket_number(&self.subject)
    }

    pub fn ticket_title(&self) -> String {
        let title = strip_reply_prefixes(&self.subject);
        if title.is_empty() {
            format!("Email from {}", self.from_address)
        } else {
            title.to_string()
        }
    }

    pub fn author_label(&self) -> String {
        match &self.from_name {
            Some(name) if !name.trim().is_empty() => format!("{} <{}>", name.trim(), self.from_address),
            _ => self.from_address.clone(),
        }
    }
}

pub fn extract_ticket_number(subject: &str) -> Option<String> {
    let re = TICKET_TAG_REGEX.as_ref()?;
    re.captures(subject)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
}

pub fn strip_reply_prefixes(subject: &str) -> &str {
    match REPLY_PREFIX_REGEX.as_ref().and_then(|re| re.find(subject)) {
        Some(m) => subject[m.end()..].trim(),
        None => subject.trim(),
    }
}

/// Drops the quoted previous message from a reply body.
pub fn strip_quoted_reply(body: &str) -> String {
    let cut = QUOTE_HEADER_REGEX
        .as_ref()
        .and_then(|re| re.find(body))
        .map(|m| m.start())
        .unwrap_or(body.len());
    body[..cut]
        .lines()
        .filter(|line| !line.trim_start().starts_with('>'))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Subject line for outgoing replies so answers thread back by tag.
pub fn tagged_subject(ticket_number: &str, title: &str) -> String {
    format!("[{ticket_number}] {title}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(subject: &str) -> InboundEmail {
        InboundEmail {
            message_id: "<abc@mail.example.com>".to_string(),
            in_reply_to: None,
            references: Vec::new(),
            from_address: "ana@example.com".to_string(),
            from_name: Some("Ana".to_string()),
            to: "it@example.com".to_string(),
            subject: subject.to_string(),
            body: String::new(),
        }
    }

    #[test]
    fn test_ticket_tag_from_subject() {
        assert_eq!(extract_ticket_number("Re: [TKT-000042] Printer"), Some("TKT-000042".to_string()));
        assert_eq!(extract_ticket_number("re: [tkt-1234567] x"), Some("TKT-1234567".to_string()));
        assert_eq!(extract_ticket_number("TKT-000042 without brackets"), None);
        assert_eq!(extract_ticket_number("[TKT-42] too short"), None);
    }

    #[test]
    fn test_thread_candidates_order_and_dedup() {
        let mut e = email("hello");
        e.in_reply_to = Some(" <b@x> ".to_string());
        e.references = vec!["<a@x>".to_string(), "<b@x>".to_string()];
        assert_eq!(e.thread_candidates(), vec!["b@x".to_string(), "a@x".to_string()]);
        assert_eq!(e.normalized_message_id(), "abc@mail.example.com");
    }

    #[test]
    fn test_title_and_author() {
        assert_eq!(email("RE: Fwd: VPN broken").ticket_title(), "VPN broken");
        assert_eq!(email("  ").ticket_title(), "Email from ana@example.com");
        assert_eq!(email("x").author_label(), "Ana <ana@example.com>");
    }

    #[test]
    fn test_strip_quoted_reply() {
        let body = "Still broken.\n\nOn Mon, 3 Jun 2024 Support wrote:\n> did you restart?\n";
        assert_eq!(strip_quoted_reply(body), "Still broken.");
        assert_eq!(strip_quoted_reply("thanks\n> old"), "thanks");
    }
}
