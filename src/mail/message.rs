use std::time::SystemTime;

use chrono::{DateTime, Utc};
use lettre::message::header::ContentType;
use lettre::message::{Attachment as AttachmentPart, Mailbox, MultiPart, SinglePart};
use serde::{Deserialize, Serialize};

use crate::error::{MailError, Result};

/// Plain, unvalidated message fields as a caller (or a JSON body) provides them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageFields {
    pub subject: String,
    pub recipients: Vec<String>,
    pub body: Option<String>,
    pub html: Option<String>,
    pub sender: Option<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub reply_to: Option<String>,
}

impl MessageFields {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn recipient(mut self, address: impl Into<String>) -> Self {
        self.recipients.push(address.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn sender(mut self, address: impl Into<String>) -> Self {
        self.sender = Some(address.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: ContentType,
    pub data: Vec<u8>,
}

/// A validated email message. Addresses are parsed on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    subject: String,
    recipients: Vec<Mailbox>,
    body: Option<String>,
    html: Option<String>,
    sender: Option<Mailbox>,
    cc: Vec<Mailbox>,
    bcc: Vec<Mailbox>,
    reply_to: Option<Mailbox>,
    date: Option<DateTime<Utc>>,
    attachments: Vec<Attachment>,
}

impl Message {
    pub fn new(fields: MessageFields) -> Result<Self> {
        if has_line_break(&fields.subject) {
            return Err(MailError::BadHeader);
        }

        Ok(Self {
            subject: fields.subject,
            recipients: parse_all(&fields.recipients)?,
            body: fields.body,
            html: fields.html,
            sender: fields.sender.as_deref().map(parse_mailbox).transpose()?,
            cc: parse_all(&fields.cc)?,
            bcc: parse_all(&fields.bcc)?,
            reply_to: fields.reply_to.as_deref().map(parse_mailbox).transpose()?,
            date: None,
            attachments: Vec::new(),
        })
    }

    pub fn add_recipient(&mut self, address: &str) -> Result<()> {
        self.recipients.push(parse_mailbox(address)?);
        Ok(())
    }

    pub fn attach(
        &mut self,
        filename: impl Into<String>,
        content_type: &str,
        data: impl Into<Vec<u8>>,
    ) -> Result<()> {
        let filename = filename.into();
        if has_line_break(&filename) {
            return Err(MailError::BadHeader);
        }
        let content_type = ContentType::parse(content_type)
            .map_err(|e| MailError::Build(format!("{content_type}: {e}")))?;

        self.attachments.push(Attachment {
            filename,
            content_type,
            data: data.into(),
        });
        Ok(())
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn recipients(&self) -> &[Mailbox] {
        &self.recipients
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn html(&self) -> Option<&str> {
        self.html.as_deref()
    }

    pub fn sender(&self) -> Option<&Mailbox> {
        self.sender.as_ref()
    }

    pub fn cc(&self) -> &[Mailbox] {
        &self.cc
    }

    pub fn bcc(&self) -> &[Mailbox] {
        &self.bcc
    }

    pub fn reply_to(&self) -> Option<&Mailbox> {
        self.reply_to.as_ref()
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Every envelope recipient (to, cc, bcc), first occurrence wins.
    pub fn send_to(&self) -> Vec<&Mailbox> {
        let mut seen: Vec<&Mailbox> = Vec::new();
        for mailbox in self.recipients.iter().chain(&self.cc).chain(&self.bcc) {
            if !seen.iter().any(|m| m.email == mailbox.email) {
                seen.push(mailbox);
            }
        }
        seen
    }

    /// Build the transport representation. A missing date is stamped with now.
    pub fn to_wire(&self, default_sender: Option<&Mailbox>) -> Result<lettre::Message> {
        let sender = self
            .sender
            .as_ref()
            .or(default_sender)
            .ok_or(MailError::MissingSender)?;

        let mut builder = lettre::Message::builder()
            .from(sender.clone())
            .subject(self.subject.clone())
            .date(SystemTime::from(self.date.unwrap_or_else(Utc::now)));

        for to in &self.recipients {
            builder = builder.to(to.clone());
        }
        for cc in &self.cc {
            builder = builder.cc(cc.clone());
        }
        for bcc in &self.bcc {
            builder = builder.bcc(bcc.clone());
        }
        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(reply_to.clone());
        }

        let message = if self.attachments.is_empty() {
            match self.content() {
                Content::Single(part) => builder.singlepart(part)?,
                Content::Alternative(parts) => builder.multipart(parts)?,
            }
        } else {
            let mut mixed = match self.content() {
                Content::Single(part) => MultiPart::mixed().singlepart(part),
                Content::Alternative(parts) => MultiPart::mixed().multipart(parts),
            };
            for attachment in &self.attachments {
                mixed = mixed.singlepart(
                    AttachmentPart::new(attachment.filename.clone())
                        .body(attachment.data.clone(), attachment.content_type.clone()),
                );
            }
            builder.multipart(mixed)?
        };

        Ok(message)
    }

    fn content(&self) -> Content {
        match (&self.body, &self.html) {
            (Some(text), Some(html)) => {
                Content::Alternative(MultiPart::alternative_plain_html(text.clone(), html.clone()))
            }
            (None, Some(html)) => Content::Single(SinglePart::html(html.clone())),
            (text, None) => Content::Single(SinglePart::plain(text.clone().unwrap_or_default())),
        }
    }
}

enum Content {
    Single(SinglePart),
    Alternative(MultiPart),
}

fn has_line_break(value: &str) -> bool {
    value.contains('\r') || value.contains('\n')
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    if has_line_break(address) {
        return Err(MailError::BadHeader);
    }
    address
        .parse()
        .map_err(|_| MailError::InvalidAddress(address.to_string()))
}

fn parse_all(addresses: &[String]) -> Result<Vec<Mailbox>> {
    addresses.iter().map(|a| parse_mailbox(a)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fields() -> MessageFields {
        MessageFields::new("testing")
            .recipient("to@example.com")
            .body("hello")
    }

    #[test]
    fn test_new_parses_addresses() {
        let message = Message::new(fields().sender("Ops <ops@example.com>")).unwrap();

        assert_eq!(message.subject(), "testing");
        assert_eq!(message.recipients()[0].email.to_string(), "to@example.com");
        assert_eq!(
            message.sender().map(|m| m.name.clone()),
            Some(Some("Ops".to_string()))
        );
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let result = Message::new(MessageFields::new("hi").recipient("not an address"));

        assert!(matches!(result, Err(MailError::InvalidAddress(a)) if a == "not an address"));
    }

    #[test]
    fn test_header_injection_is_rejected() {
        let result = Message::new(MessageFields::new("hi\r\nBcc: evil@example.com"));
        assert!(matches!(result, Err(MailError::BadHeader)));

        let mut message = Message::new(fields()).unwrap();
        let result = message.add_recipient("a@example.com\nBcc: evil@example.com");
        assert!(matches!(result, Err(MailError::BadHeader)));
    }

    #[test]
    fn test_send_to_merges_without_duplicates() {
        let mut f = fields();
        f.cc = vec!["cc@example.com".to_string(), "to@example.com".to_string()];
        f.bcc = vec!["bcc@example.com".to_string()];
        let message = Message::new(f).unwrap();

        let emails: Vec<String> = message
            .send_to()
            .iter()
            .map(|m| m.email.to_string())
            .collect();
        assert_eq!(
            emails,
            vec!["to@example.com", "cc@example.com", "bcc@example.com"]
        );
    }

    #[test]
    fn test_to_wire_uses_default_sender() {
        let message = Message::new(fields()).unwrap();

        assert!(matches!(
            message.to_wire(None),
            Err(MailError::MissingSender)
        ));

        let default: Mailbox = "noreply@example.com".parse().unwrap();
        let wire = message.to_wire(Some(&default)).unwrap();
        let raw = String::from_utf8(wire.formatted()).unwrap();
        assert!(raw.contains("From: noreply@example.com"));
        assert!(raw.contains("Subject: testing"));
        assert!(raw.contains("hello"));
    }

    #[test]
    fn test_to_wire_with_attachment() {
        let mut message = Message::new(fields().html("<p>hello</p>").sender("a@example.com")).unwrap();
        message
            .attach("report.txt", "text/plain", b"quarterly numbers".to_vec())
            .unwrap();

        let raw = String::from_utf8(message.to_wire(None).unwrap().formatted()).unwrap();
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("report.txt"));
    }

    #[test]
    fn test_fields_deserialize_with_defaults() {
        let parsed: MessageFields =
            serde_json::from_str(r#"{"subject":"hi","recipients":["a@example.com"]}"#).unwrap();

        assert_eq!(parsed, MessageFields::new("hi").recipient("a@example.com"));
    }
}
