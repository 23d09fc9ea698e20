use chrono::{DateTime, NaiveDateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size_label: String,
    #[serde(default)]
    pub kind: String,
    /// Missing for attachments the portal never stored a link for;
    /// rendered as "no link available".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One entry of a ticket's conversation. Remote comments carry a
/// `note-` prefixed id derived from the backend note; local comments a
/// client-generated `comment-` id. Ids are unique within a merged list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub message: String,
    pub timestamp: String,
    #[serde(default)]
    pub is_agent: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Comment {
    /// Build the optimistic client-side record for a submission the portal
    /// did not (yet) accept. Attachments point at the local files.
    pub fn local(author: &str, message: &str, files: &[std::path::PathBuf]) -> Self {
        let now_ms = unix_millis();
        let attachments = files
            .iter()
            .enumerate()
            .map(|(index, path)| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                let size_label = std::fs::metadata(path)
                    .map(|meta| size_label(meta.len()))
                    .unwrap_or_default();
                Attachment {
                    id: format!("attachment-{}-{}", now_ms, index),
                    kind: extension_of(&name),
                    url: Some(format!("file://{}", path.display())),
                    name,
                    size_label,
                }
            })
            .collect();

        Self {
            id: local_comment_id(),
            author: author.to_string(),
            message: message.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            is_agent: false,
            attachments,
        }
    }

    /// Normalize a raw portal note record. Field presence is best-effort:
    /// the record carries `note`, `created_at`, optionally `user_name` and
    /// a `documents` array of path strings.
    pub fn from_remote(raw: &Value, origin: &str) -> Self {
        let note_id = string_field(raw, "id")
            .or_else(|| string_field(raw, "created_at"))
            .unwrap_or_else(|| "unknown".to_string());

        let message = string_field(raw, "note")
            .or_else(|| string_field(raw, "message"))
            .or_else(|| string_field(raw, "comment"))
            .unwrap_or_default();

        let author = string_field(raw, "user_name");
        let is_agent = author.is_none();

        let attachments = raw
            .get("documents")
            .and_then(Value::as_array)
            .map(|docs| {
                docs.iter()
                    .filter_map(Value::as_str)
                    .enumerate()
                    .map(|(index, path)| {
                        let name = path
                            .rsplit('/')
                            .next()
                            .unwrap_or(path)
                            .to_string();
                        Attachment {
                            id: format!("document-{}-{}", note_id, index),
                            kind: extension_of(&name),
                            url: Some(resolve_document_url(origin, path)),
                            name,
                            size_label: String::new(),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: format!("note-{}", note_id),
            author: author.unwrap_or_else(|| "Support Team".to_string()),
            message,
            timestamp: normalize_timestamp(raw.get("created_at").and_then(Value::as_str)),
            is_agent,
            attachments,
        }
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }
}

/// Client-side comment id: time plus a random token, unique enough for a
/// single user's store.
pub fn local_comment_id() -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("comment-{}-{}", unix_millis(), token)
}

/// Rebuild a fully-qualified URL from a document path, which the portal
/// returns as an absolute URL, a root-relative path, or a bare filename.
pub fn resolve_document_url(origin: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else if path.starts_with('/') {
        format!("{}{}", origin, path)
    } else {
        format!("{}/{}", origin, path)
    }
}

/// Scheme plus host of a base URL; `https://portal.example.com/apis`
/// becomes `https://portal.example.com`.
pub fn origin_of(base_url: &str) -> String {
    let Some(scheme_end) = base_url.find("://") else {
        return base_url.trim_end_matches('/').to_string();
    };
    let after_scheme = scheme_end + 3;
    match base_url[after_scheme..].find('/') {
        Some(host_end) => base_url[..after_scheme + host_end].to_string(),
        None => base_url.to_string(),
    }
}

fn normalize_timestamp(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return Utc::now().to_rfc3339();
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc).to_rfc3339();
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return naive.and_utc().to_rfc3339();
    }
    raw.to_string()
}

fn size_label(bytes: u64) -> String {
    format!("{:.1}KB", bytes as f64 / 1024.0)
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
