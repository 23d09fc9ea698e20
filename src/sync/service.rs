use std::path::PathBuf;
use tracing::{debug, warn};

use super::reconcile::merge;
use crate::api::notes;
use crate::api::portal::PortalClient;
use crate::errors::{PortalError, Result};
use crate::models::comment::Comment;
use crate::models::ticket::TicketRef;
use crate::net;
use crate::store::LocalCommentStore;

/// Where a submission ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Remote { endpoint: String },
    Local,
}

/// What the caller renders after a submission or fetch: always a complete
/// comment list, plus a warning when something non-fatal went wrong.
#[derive(Debug)]
pub struct CommentOutcome {
    pub comments: Vec<Comment>,
    pub warning: Option<String>,
    pub delivery: Delivery,
}

/// Facade over the resolver, the endpoint cascades, the local store, and
/// the reconciler. Every path out of `submit_comment` produces a usable
/// comment list; the only hard failure is an empty submission.
pub struct CommentService {
    portal: PortalClient,
    store: LocalCommentStore,
}

impl CommentService {
    pub fn new(portal: PortalClient, store: LocalCommentStore) -> Self {
        Self { portal, store }
    }

    pub async fn submit_comment(
        &self,
        ticket: &TicketRef,
        text: &str,
        files: &[PathBuf],
    ) -> Result<CommentOutcome> {
        if text.trim().is_empty() && files.is_empty() {
            return Err(PortalError::EmptySubmission);
        }

        if let Err(err) = self.ensure_online().await {
            debug!(ticket = %ticket, error = %err, "portal unreachable, keeping comment locally");
            return Ok(self
                .local_fallback(
                    ticket,
                    None,
                    text,
                    files,
                    "No connection to the portal; comment saved locally",
                )
                .await);
        }

        let database_id = match self.portal.resolve_ticket_id(ticket).await {
            Ok(id) => id,
            Err(err) => {
                warn!(ticket = %ticket, error = %err, "identifier resolution failed, keeping comment locally");
                return Ok(self
                    .local_fallback(
                        ticket,
                        None,
                        text,
                        files,
                        "Ticket reference could not be resolved; comment saved locally",
                    )
                    .await);
            }
        };

        match notes::submit_note(&self.portal, &database_id, text, files).await {
            Ok(success) => {
                let mut warning = None;
                if !files.is_empty() {
                    if let Err(err) =
                        notes::upload_attachments(&self.portal, &database_id, files).await
                    {
                        warn!(ticket = %ticket, error = %err, "attachments failed after the note went through");
                        warning =
                            Some("Comment added but attachments failed to upload".to_string());
                    }
                }

                let remote = match self.portal.fetch_notes(&database_id).await {
                    Ok(remote) => remote,
                    Err(err) => {
                        debug!(ticket = %ticket, error = %err, "could not re-fetch notes after submit");
                        Vec::new()
                    }
                };
                let local = self.store.load(ticket);

                Ok(CommentOutcome {
                    comments: merge(remote, local),
                    warning,
                    delivery: Delivery::Remote {
                        endpoint: success.endpoint,
                    },
                })
            }
            Err(err) => {
                warn!(ticket = %ticket, error = %err, "remote submission failed, keeping comment locally");
                Ok(self
                    .local_fallback(
                        ticket,
                        Some(&database_id),
                        text,
                        files,
                        "The portal did not accept the comment; saved locally",
                    )
                    .await)
            }
        }
    }

    /// Remote comments merged with the local cache. Read failures of any
    /// kind degrade to cached data; this never errors.
    pub async fn load_comments(&self, ticket: &TicketRef) -> Vec<Comment> {
        let remote = match self.portal.resolve_ticket_id(ticket).await {
            Ok(database_id) => match self.portal.fetch_notes(&database_id).await {
                Ok(remote) => remote,
                Err(err) => {
                    debug!(ticket = %ticket, error = %err, "note fetch failed, showing local comments only");
                    Vec::new()
                }
            },
            Err(err) => {
                debug!(ticket = %ticket, error = %err, "unresolvable reference, showing local comments only");
                Vec::new()
            }
        };

        merge(remote, self.store.load(ticket))
    }

    /// Connectivity gate consulted before any cascade starts.
    async fn ensure_online(&self) -> Result<()> {
        if net::is_online(self.portal.base_url()).await {
            Ok(())
        } else {
            Err(PortalError::NoConnectivity)
        }
    }

    /// The optimistic write: record the comment locally and return the
    /// freshest view we can still assemble.
    async fn local_fallback(
        &self,
        ticket: &TicketRef,
        database_id: Option<&str>,
        text: &str,
        files: &[PathBuf],
        warning: &str,
    ) -> CommentOutcome {
        let comment = Comment::local(self.portal.user_name(), text, files);
        self.store.append(ticket, comment);

        let remote = match database_id {
            Some(id) => self.portal.fetch_notes(id).await.unwrap_or_default(),
            None => Vec::new(),
        };

        CommentOutcome {
            comments: merge(remote, self.store.load(ticket)),
            warning: Some(warning.to_string()),
            delivery: Delivery::Local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{EndpointConfig, PortalConfig, Preferences, Settings};

    fn test_settings(base_url: &str) -> Settings {
        Settings {
            portal: PortalConfig {
                base_url: base_url.to_string(),
                auth_token: String::new(),
                user_name: "Test User".to_string(),
            },
            endpoints: EndpointConfig {
                note_routes: vec!["add-ticket-note".to_string()],
                upload_routes: vec!["upload-ticket-attachments".to_string()],
                ..EndpointConfig::default()
            },
            preferences: Preferences::default(),
        }
    }

    fn service_at(base_url: &str, store_dir: &std::path::Path) -> CommentService {
        CommentService::new(
            PortalClient::new(test_settings(base_url)),
            LocalCommentStore::new(store_dir.join("local_comments.json")),
        )
    }

    #[tokio::test]
    async fn test_empty_submission_fails_fast_with_zero_calls() {
        let mut server = mockito::Server::new_async().await;
        let gets = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let posts = server
            .mock("POST", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let service = service_at(&server.url(), dir.path());

        let err = service
            .submit_comment(&TicketRef::new("42"), "   ", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, PortalError::EmptySubmission));
        gets.assert_async().await;
        posts.assert_async().await;
    }

    #[tokio::test]
    async fn test_successful_submit_returns_fresh_remote_view() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/add-ticket-note")
            .with_status(200)
            .with_body(r#"{"status":"1","data":{"id":9}}"#)
            .create_async()
            .await;
        let _m = server
            .mock("GET", "/get-ticket-notes")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"status":"1","data":[
                    {"id": 9, "note": "hello", "user_name": "Test User", "created_at": "2024-01-02 10:00:00"}
                ]}"#,
            )
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let service = service_at(&server.url(), dir.path());

        let outcome = service
            .submit_comment(&TicketRef::new("42"), "hello", &[])
            .await
            .unwrap();

        assert!(matches!(outcome.delivery, Delivery::Remote { .. }));
        assert!(outcome.warning.is_none());
        assert_eq!(outcome.comments.len(), 1);
        assert_eq!(outcome.comments[0].id, "note-9");
    }

    #[tokio::test]
    async fn test_exhausted_cascade_degrades_to_local_write() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/add-ticket-note")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;
        let _m = server
            .mock("GET", "/get-ticket-notes")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let service = service_at(&server.url(), dir.path());
        let ticket = TicketRef::new("42");

        let outcome = service
            .submit_comment(&ticket, "still here", &[])
            .await
            .unwrap();

        assert_eq!(outcome.delivery, Delivery::Local);
        assert!(outcome.warning.is_some());
        assert_eq!(outcome.comments.len(), 1);
        assert_eq!(outcome.comments[0].message, "still here");
        assert!(outcome.comments[0].id.starts_with("comment-"));

        // The optimistic write is durable.
        let reloaded = service.load_comments(&ticket).await;
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].message, "still here");
    }

    #[tokio::test]
    async fn test_attachment_failure_is_a_warning_not_a_failure() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/add-ticket-note")
            .with_status(200)
            .with_body(r#"{"status":"1"}"#)
            .create_async()
            .await;
        let _m = server
            .mock("POST", "/upload-ticket-attachments")
            .with_status(500)
            .create_async()
            .await;
        let _m = server
            .mock("GET", "/get-ticket-notes")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"1","data":[]}"#)
            .create_async()
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"diagnostic output").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let service = service_at(&server.url(), dir.path());

        let outcome = service
            .submit_comment(
                &TicketRef::new("42"),
                "see attached",
                &[file.path().to_path_buf()],
            )
            .await
            .unwrap();

        assert!(matches!(outcome.delivery, Delivery::Remote { .. }));
        assert_eq!(
            outcome.warning.as_deref(),
            Some("Comment added but attachments failed to upload")
        );
    }

    #[tokio::test]
    async fn test_offline_comment_survives_reconnection() {
        let dir = tempfile::tempdir().unwrap();
        let ticket = TicketRef::new("77");

        // Offline: nothing listens on port 1, the probe fails, the comment
        // goes to the local store.
        let offline = service_at("http://127.0.0.1:1", dir.path());
        let outcome = offline
            .submit_comment(&ticket, "written offline", &[])
            .await
            .unwrap();
        assert_eq!(outcome.delivery, Delivery::Local);

        // Back online: remote comments and the cached one merge without
        // duplication.
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/get-ticket-notes")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"status":"1","data":[
                    {"id": 3, "note": "from the agent", "created_at": "2024-01-03 12:00:00"}
                ]}"#,
            )
            .create_async()
            .await;

        let online = service_at(&server.url(), dir.path());
        let comments = online.load_comments(&ticket).await;

        assert_eq!(comments.len(), 2);
        let ids: std::collections::HashSet<&str> =
            comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(comments.iter().any(|c| c.message == "written offline"));
        assert!(comments.iter().any(|c| c.id == "note-3"));
    }

    #[tokio::test]
    async fn test_load_comments_degrades_to_local_on_read_failure() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/get-ticket-notes")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let service = service_at(&server.url(), dir.path());
        let ticket = TicketRef::new("42");

        // Seed the cache through the public path.
        let offline = service_at("http://127.0.0.1:1", dir.path());
        offline
            .submit_comment(&ticket, "cached", &[])
            .await
            .unwrap();

        let comments = service.load_comments(&ticket).await;
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].message, "cached");
    }
}
