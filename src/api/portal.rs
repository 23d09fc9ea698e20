use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::settings::Settings;
use crate::errors::PortalError;
use crate::models::comment::{origin_of, Comment};
use crate::models::ticket::{extract_ticket_array, Ticket, TicketRef};

pub struct PortalClient {
    client: Client,
    settings: Settings,
    origin: String,
}

impl PortalClient {
    pub fn new(settings: Settings) -> Self {
        let origin = origin_of(&settings.portal.base_url);
        Self {
            client: Client::new(),
            settings,
            origin,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.settings.portal.base_url
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn user_name(&self) -> &str {
        &self.settings.portal.user_name
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Attach the bearer token when one is configured. A missing token
    /// still attempts the call; the portal answers with an auth failure
    /// which the caller handles like any other rejection.
    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if self.settings.portal.auth_token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.settings.portal.auth_token)
        }
    }

    pub(crate) fn route_url(&self, route: &str) -> String {
        format!(
            "{}/{}",
            self.settings.portal.base_url.trim_end_matches('/'),
            route
        )
    }

    pub(crate) fn note_endpoint_urls(&self) -> Vec<String> {
        self.settings
            .endpoints
            .note_routes
            .iter()
            .map(|route| self.route_url(route))
            .collect()
    }

    pub(crate) fn upload_endpoint_urls(&self) -> Vec<String> {
        self.settings
            .endpoints
            .upload_routes
            .iter()
            .map(|route| self.route_url(route))
            .collect()
    }

    pub(crate) fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.preferences.lookup_timeout_secs)
    }

    pub(crate) fn note_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.preferences.note_timeout_secs)
    }

    pub(crate) fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.preferences.upload_timeout_secs)
    }

    /// The normalized ticket collection, one page large enough to hold
    /// everything.
    pub async fn fetch_tickets(&self) -> Result<Vec<Ticket>> {
        let raw = self.fetch_raw_tickets().await?;
        Ok(raw
            .iter()
            .map(|record| Ticket::from_raw(record, &self.origin))
            .collect())
    }

    async fn fetch_raw_tickets(&self) -> Result<Vec<Value>> {
        let url = format!(
            "{}?page=1&per_page={}",
            self.route_url(&self.settings.endpoints.tickets_route),
            self.settings.preferences.lookup_page_size
        );

        let response = self
            .authorize(self.client.get(&url))
            .timeout(self.lookup_timeout())
            .send()
            .await
            .context("Failed to fetch tickets from the portal")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "{}",
                PortalError::PortalApiError(status.as_u16(), text)
            );
        }

        let envelope = response
            .json::<Value>()
            .await
            .context("Failed to parse ticket response")?;

        if !envelope_ok(&envelope) {
            anyhow::bail!("Portal reported failure fetching tickets");
        }

        let data = envelope.get("data").cloned().unwrap_or(Value::Null);
        Ok(extract_ticket_array(&data))
    }

    /// Map a user-facing ticket reference to the backend's internal id.
    ///
    /// A purely numeric reference already is the id and resolves without a
    /// network call. Anything else is looked up in the ticket collection by
    /// `ticket_number` or `id`; if the lookup call fails or nothing matches,
    /// the first digit run of the reference is the degraded fallback. A
    /// reference with no digits at all cannot be resolved.
    pub async fn resolve_ticket_id(&self, ticket: &TicketRef) -> crate::errors::Result<String> {
        if ticket.is_numeric() {
            return Ok(ticket.as_str().to_string());
        }

        match self.lookup_ticket_id(ticket).await {
            Ok(Some(id)) => {
                debug!(ticket = %ticket, id = %id, "resolved ticket reference via lookup");
                return Ok(id);
            }
            Ok(None) => {
                debug!(ticket = %ticket, "no matching ticket, falling back to digit extraction");
            }
            Err(err) => {
                warn!(ticket = %ticket, error = %err, "ticket lookup failed, falling back to digit extraction");
            }
        }

        ticket
            .first_digit_run()
            .map(str::to_string)
            .ok_or_else(|| PortalError::IdentifierResolution(ticket.to_string()))
    }

    async fn lookup_ticket_id(&self, ticket: &TicketRef) -> Result<Option<String>> {
        let records = self.fetch_raw_tickets().await?;
        for record in &records {
            let ticket_number = record.get("ticket_number").map(value_as_string);
            let id = record.get("id").map(value_as_string);
            if ticket_number.as_deref() == Some(ticket.as_str())
                || id.as_deref() == Some(ticket.as_str())
            {
                return Ok(id);
            }
        }
        Ok(None)
    }

    /// Remote comments for a ticket, newest first. This is the single
    /// dedicated read endpoint; a failure here degrades to local-only data
    /// at the caller, so no cascade.
    pub async fn fetch_notes(&self, database_id: &str) -> Result<Vec<Comment>> {
        let url = format!(
            "{}?ticket_id={}",
            self.route_url(&self.settings.endpoints.notes_read_route),
            urlencoding::encode(database_id)
        );

        let response = self
            .authorize(self.client.get(&url))
            .timeout(self.lookup_timeout())
            .send()
            .await
            .context("Failed to fetch ticket notes")?;

        if !response.status().is_success() {
            let status = response.status();
            anyhow::bail!("Portal API error ({}) fetching notes", status);
        }

        let envelope = response
            .json::<Value>()
            .await
            .context("Failed to parse notes response")?;

        if !envelope_ok(&envelope) {
            anyhow::bail!("Portal reported failure fetching notes");
        }

        let mut comments: Vec<Comment> = envelope
            .get("data")
            .and_then(Value::as_array)
            .map(|notes| {
                notes
                    .iter()
                    .map(|note| Comment::from_remote(note, &self.origin))
                    .collect()
            })
            .unwrap_or_default();

        // The merge step expects remote comments newest-first, whatever
        // order the backend happened to return.
        comments.sort_by(|a, b| b.parsed_timestamp().cmp(&a.parsed_timestamp()));
        Ok(comments)
    }
}

/// The portal wraps every response as `{"status": "1", "data": ...}`;
/// some deployments send the status as a bare number.
fn envelope_ok(envelope: &Value) -> bool {
    match envelope.get("status") {
        Some(Value::String(s)) => s == "1",
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
