//! Channel-neutral digest content.
//!
//! Providers receive the same `DigestContent` and render it for their own
//! medium; the helpers here cover the common text and HTML shapes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::notification::{Notification, NotificationKind};

/// One notification as it appears in a digest
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestItem {
    pub notification_id: String,
    pub kind: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_ref: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for DigestItem {
    fn from(n: &Notification) -> Self {
        Self {
            notification_id: n.id.clone(),
            kind: n.kind,
            subject_ref: n.subject_ref.clone(),
            message: n.message.clone(),
            created_at: n.created_at,
        }
    }
}

impl DigestItem {
    /// "Insurance expiring (vehicle-1): message"
    pub fn headline(&self) -> String {
        match &self.subject_ref {
            Some(subject) => format!("{} ({}): {}", self.kind.label(), subject, self.message),
            None => format!("{}: {}", self.kind.label(), self.message),
        }
    }
}

/// A batch of pending notifications, ordered oldest first
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestContent {
    pub subject: String,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<DigestItem>,
}

impl DigestContent {
    /// Build a digest from notifications already sorted by `created_at`.
    pub fn from_notifications(notifications: &[Notification]) -> Self {
        let items: Vec<DigestItem> = notifications.iter().map(DigestItem::from).collect();
        Self {
            subject: subject_line(items.len()),
            generated_at: Utc::now(),
            items,
        }
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn notification_ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.notification_id.clone()).collect()
    }

    /// Plain-text rendering: subject, blank line, numbered items.
    pub fn render_text(&self) -> String {
        let mut out = String::with_capacity(64 + self.items.len() * 80);
        out.push_str(&self.subject);
        out.push_str("\n\n");
        for (i, item) in self.items.iter().enumerate() {
            out.push_str(&format!(
                "{}. {} [{}]\n",
                i + 1,
                item.headline(),
                item.created_at.format("%Y-%m-%d")
            ));
        }
        out
    }

    /// Compact single-paragraph rendering capped at `max_chars` characters.
    pub fn render_compact(&self, max_chars: usize) -> String {
        let mut out = self.subject.clone();
        for item in &self.items {
            out.push_str("; ");
            out.push_str(&item.headline());
        }

        if out.chars().count() <= max_chars {
            return out;
        }

        // Too short for an ellipsis: hard cut
        if max_chars < 3 {
            return out.chars().take(max_chars).collect();
        }

        let mut truncated: String = out.chars().take(max_chars - 3).collect();
        truncated.push_str("...");
        truncated
    }

    /// HTML rendering with escaped user text.
    pub fn render_html(&self) -> String {
        let mut out = String::new();
        out.push_str("<html><body>");
        out.push_str(&format!("<h2>{}</h2>", escape_html(&self.subject)));
        out.push_str("<ol>");
        for item in &self.items {
            out.push_str(&format!(
                "<li><strong>{}</strong>{}: {} <small>{}</small></li>",
                escape_html(item.kind.label()),
                item.subject_ref
                    .as_deref()
                    .map(|s| format!(" ({})", escape_html(s)))
                    .unwrap_or_default(),
                escape_html(&item.message),
                item.created_at.format("%Y-%m-%d")
            ));
        }
        out.push_str("</ol></body></html>");
        out
    }
}

fn subject_line(count: usize) -> String {
    if count == 1 {
        "Vehicle digest: 1 pending notification".to_string()
    } else {
        format!("Vehicle digest: {} pending notifications", count)
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
