use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::comment::resolve_document_url;

/// User-facing ticket reference. Either the backend's numeric id or an
/// opaque ticket number such as "TKT-2024-0042"; the two are distinct
/// identifier spaces and must not be mixed up at the API boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketRef(String);

impl TicketRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the reference is already a backend id (`^\d+$`).
    pub fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }

    /// First contiguous digit run, the degraded fallback id.
    pub fn first_digit_run(&self) -> Option<&str> {
        let start = self.0.find(|c: char| c.is_ascii_digit())?;
        let rest = &self.0[start..];
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        Some(&rest[..end])
    }
}

impl fmt::Display for TicketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TicketRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPair {
    pub bg: String,
    pub text: String,
}

/// A ticket as shown to the user. Built from a raw portal record with a
/// default for every optional field; rebuilt on every fetch, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketRef,
    pub title: String,
    pub description: String,
    pub status_name: String,
    pub status_colors: ColorPair,
    pub priority_name: String,
    pub priority_colors: ColorPair,
    pub requester_name: String,
    pub created_at: String,
    pub documents: Vec<String>,
}

impl Ticket {
    pub fn from_raw(raw: &Value, origin: &str) -> Self {
        let id = string_field(raw, "ticket_number")
            .or_else(|| string_field(raw, "id"))
            .unwrap_or_default();

        let documents = raw
            .get("documents")
            .and_then(Value::as_array)
            .map(|docs| {
                docs.iter()
                    .filter_map(Value::as_str)
                    .map(|path| resolve_document_url(origin, path))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: TicketRef::new(id),
            title: string_field(raw, "title").unwrap_or_else(|| "No title".to_string()),
            description: string_field(raw, "description")
                .unwrap_or_else(|| "No description".to_string()),
            status_name: string_field(raw, "status_name").unwrap_or_else(|| "Active".to_string()),
            status_colors: ColorPair {
                bg: string_field(raw, "status_bg_color")
                    .unwrap_or_else(|| "#e8eef3".to_string()),
                text: string_field(raw, "status_text_color")
                    .unwrap_or_else(|| "#1f2933".to_string()),
            },
            priority_name: string_field(raw, "priority_name")
                .unwrap_or_else(|| "Medium".to_string()),
            priority_colors: ColorPair {
                bg: string_field(raw, "priority_bg_color")
                    .unwrap_or_else(|| "#fdf3e0".to_string()),
                text: string_field(raw, "priority_text_color")
                    .unwrap_or_else(|| "#7a4d00".to_string()),
            },
            requester_name: string_field(raw, "user_name")
                .unwrap_or_else(|| "Unknown User".to_string()),
            created_at: string_field(raw, "created_at")
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
            documents,
        }
    }
}

/// The portal wraps ticket collections as `data: [...]` or, on some
/// deployments, doubly nested as `data: { data: [...] }`.
pub fn extract_ticket_array(data: &Value) -> Vec<Value> {
    if let Some(tickets) = data.as_array() {
        return tickets.clone();
    }
    if let Some(tickets) = data.get("data").and_then(Value::as_array) {
        return tickets.clone();
    }
    Vec::new()
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_ref_detection() {
        assert!(TicketRef::new("12345").is_numeric());
        assert!(!TicketRef::new("TKT-123").is_numeric());
        assert!(!TicketRef::new("123a").is_numeric());
        assert!(!TicketRef::new("").is_numeric());
    }

    #[test]
    fn test_first_digit_run() {
        assert_eq!(TicketRef::new("TKT-2024-0042").first_digit_run(), Some("2024"));
        assert_eq!(TicketRef::new("abc99def7").first_digit_run(), Some("99"));
        assert_eq!(TicketRef::new("77").first_digit_run(), Some("77"));
        assert_eq!(TicketRef::new("nodigits").first_digit_run(), None);
    }

    #[test]
    fn test_from_raw_prefers_ticket_number_over_id() {
        let raw = json!({"ticket_number": "TKT-9", "id": 9, "title": "Broken printer"});
        let ticket = Ticket::from_raw(&raw, "https://portal.example.com");
        assert_eq!(ticket.id.as_str(), "TKT-9");
        assert_eq!(ticket.title, "Broken printer");
    }

    #[test]
    fn test_from_raw_supplies_every_default() {
        let ticket = Ticket::from_raw(&json!({"id": 4}), "https://portal.example.com");
        assert_eq!(ticket.id.as_str(), "4");
        assert_eq!(ticket.title, "No title");
        assert_eq!(ticket.description, "No description");
        assert_eq!(ticket.status_name, "Active");
        assert_eq!(ticket.priority_name, "Medium");
        assert_eq!(ticket.requester_name, "Unknown User");
        assert!(!ticket.created_at.is_empty());
        assert!(!ticket.status_colors.bg.is_empty());
        assert!(!ticket.priority_colors.text.is_empty());
        assert!(ticket.documents.is_empty());
    }

    #[test]
    fn test_from_raw_resolves_document_paths() {
        let raw = json!({
            "id": 4,
            "documents": ["/uploads/a.pdf", "b.png", "https://cdn.example.com/c.txt"]
        });
        let ticket = Ticket::from_raw(&raw, "https://portal.example.com");
        assert_eq!(
            ticket.documents,
            vec![
                "https://portal.example.com/uploads/a.pdf",
                "https://portal.example.com/b.png",
                "https://cdn.example.com/c.txt",
            ]
        );
    }

    #[test]
    fn test_extract_ticket_array_flat_and_nested() {
        let flat = json!([{"id": 1}, {"id": 2}]);
        assert_eq!(extract_ticket_array(&flat).len(), 2);

        let nested = json!({"data": [{"id": 1}]});
        assert_eq!(extract_ticket_array(&nested).len(), 1);

        let neither = json!({"count": 3});
        assert!(extract_ticket_array(&neither).is_empty());
    }
}
