use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::cascade::{run_cascade, CascadeSuccess, OperationKind};
use super::portal::PortalClient;
use crate::errors::PortalError;

/// File contents read once up front so every cascade attempt can rebuild
/// its multipart payload from the same bytes.
struct LoadedFile {
    name: String,
    bytes: Vec<u8>,
}

/// Submit a ticket note, trying every candidate note endpoint with the
/// primary payload shape, then once more with the legacy shape before
/// giving up on the remote write.
pub async fn submit_note(
    portal: &PortalClient,
    database_id: &str,
    text: &str,
    files: &[PathBuf],
) -> Result<CascadeSuccess, PortalError> {
    let endpoints = portal.note_endpoint_urls();
    let timeout = portal.note_timeout();
    let loaded = load_files(files);

    let primary = run_cascade(OperationKind::SubmitNote, &endpoints, timeout, |url| {
        primary_note_request(portal, url, database_id, text, &loaded)
    })
    .await;

    match primary {
        Ok(success) => Ok(success),
        Err(PortalError::CascadeExhausted(_)) => {
            debug!("primary note payload rejected everywhere, retrying with legacy shape");
            run_cascade(OperationKind::SubmitNote, &endpoints, timeout, |url| {
                legacy_note_request(portal, url, database_id, text)
            })
            .await
        }
        Err(err) => Err(err),
    }
}

/// Upload files as a follow-up to an already-submitted note. A failure
/// here never undoes the note; the caller downgrades it to a warning.
pub async fn upload_attachments(
    portal: &PortalClient,
    database_id: &str,
    files: &[PathBuf],
) -> Result<CascadeSuccess, PortalError> {
    let loaded = load_files(files);
    if loaded.is_empty() {
        return Err(PortalError::Other("No files to upload".to_string()));
    }

    run_cascade(
        OperationKind::UploadAttachments,
        &portal.upload_endpoint_urls(),
        portal.upload_timeout(),
        |url| upload_request(portal, url, database_id, &loaded),
    )
    .await
}

fn load_files(files: &[PathBuf]) -> Vec<LoadedFile> {
    files
        .iter()
        .filter_map(|path| match std::fs::read(path) {
            Ok(bytes) => Some(LoadedFile {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
                bytes,
            }),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable attachment");
                None
            }
        })
        .collect()
}

/// The payload the portal's note endpoint is believed to expect, with
/// compatibility duplicates of the id and text under the other field names
/// seen in the wild.
fn primary_note_request(
    portal: &PortalClient,
    url: &str,
    database_id: &str,
    text: &str,
    files: &[LoadedFile],
) -> RequestBuilder {
    let request = portal.authorize(portal.http().post(url));

    if files.is_empty() {
        return request.form(&[
            ("support_tickets_id", database_id),
            ("note", text),
            ("user_name", portal.user_name()),
            ("ticket_id", database_id),
            ("comment", text),
            ("message", text),
        ]);
    }

    let mut form = Form::new()
        .text("support_tickets_id", database_id.to_string())
        .text("note", text.to_string())
        .text("user_name", portal.user_name().to_string())
        .text("ticket_id", database_id.to_string())
        .text("comment", text.to_string())
        .text("message", text.to_string());
    for (index, file) in files.iter().enumerate() {
        form = form.part(
            format!("attachment_{}", index),
            Part::bytes(file.bytes.clone()).file_name(file.name.clone()),
        );
    }
    request.multipart(form)
}

/// Older portal builds accepted a different field set; used as a one-shot
/// retry after the primary shape is exhausted.
fn legacy_note_request(
    portal: &PortalClient,
    url: &str,
    database_id: &str,
    text: &str,
) -> RequestBuilder {
    portal.authorize(portal.http().post(url)).form(&[
        ("id", database_id),
        ("message", text),
        ("author", portal.user_name()),
    ])
}

/// Upload payload: each file rides under several field names because the
/// accepting route's expected name is unknown. When the candidate is a
/// note endpoint, placeholder note fields keep it from rejecting a bare
/// file post.
fn upload_request(
    portal: &PortalClient,
    url: &str,
    database_id: &str,
    files: &[LoadedFile],
) -> RequestBuilder {
    let mut form = Form::new()
        .text("support_tickets_id", database_id.to_string())
        .text("ticket_id", database_id.to_string())
        .text("user_name", portal.user_name().to_string());

    for (index, file) in files.iter().enumerate() {
        for field in ["file", "attachment", "document", "upload"] {
            form = form.part(
                format!("{}_{}", field, index),
                Part::bytes(file.bytes.clone()).file_name(file.name.clone()),
            );
        }
    }

    if url.contains("note") {
        form = form
            .text("note", "File attachment")
            .text("comment", "File attachment")
            .text("message", "File attachment");
    }

    portal.authorize(portal.http().post(url)).multipart(form)
}
