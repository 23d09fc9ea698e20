use reqwest::RequestBuilder;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::PortalError;

/// Logical operation a cascade is carrying; failures are tagged with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    SubmitNote,
    UploadAttachments,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::SubmitNote => write!(f, "note submission"),
            OperationKind::UploadAttachments => write!(f, "attachment upload"),
        }
    }
}

/// A 2xx response from one of the candidates, plus which endpoint
/// produced it.
#[derive(Debug)]
pub struct CascadeSuccess {
    pub body: Value,
    pub endpoint: String,
}

/// Try an ordered list of candidate endpoints until one accepts the
/// request. The portal's real route names are not reliably known, so a
/// network error, a non-2xx status, a timeout, or an unparseable body all
/// mean "try the next candidate". Candidates run strictly sequentially;
/// each attempt carries its own timeout and the next starts only after the
/// previous has settled. The payload builder is invoked fresh per endpoint
/// because payloads may differ by route.
pub async fn run_cascade<F>(
    kind: OperationKind,
    endpoints: &[String],
    timeout: Duration,
    build: F,
) -> Result<CascadeSuccess, PortalError>
where
    F: Fn(&str) -> RequestBuilder,
{
    for endpoint in endpoints {
        debug!(operation = %kind, endpoint = %endpoint, "trying endpoint");

        let request = build(endpoint).timeout(timeout);
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<Value>().await {
                    Ok(body) => {
                        info!(operation = %kind, endpoint = %endpoint, "endpoint accepted request");
                        return Ok(CascadeSuccess {
                            body,
                            endpoint: endpoint.clone(),
                        });
                    }
                    Err(err) => {
                        warn!(operation = %kind, endpoint = %endpoint, error = %err, "2xx with unparseable body, trying next");
                    }
                }
            }
            Ok(response) => {
                debug!(operation = %kind, endpoint = %endpoint, status = %response.status(), "endpoint rejected request, trying next");
            }
            Err(err) => {
                debug!(operation = %kind, endpoint = %endpoint, error = %err, "attempt failed, trying next");
            }
        }
    }

    warn!(operation = %kind, candidates = endpoints.len(), "all endpoints exhausted");
    Err(PortalError::CascadeExhausted(kind.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> reqwest::Client {
        reqwest::Client::new()
    }

    #[tokio::test]
    async fn test_first_success_stops_the_cascade() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/add-ticket-note")
            .with_status(200)
            .with_body(r#"{"status":"1"}"#)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/ticket-notes")
            .expect(0)
            .create_async()
            .await;

        let endpoints = vec![
            format!("{}/add-ticket-note", server.url()),
            format!("{}/ticket-notes", server.url()),
        ];
        let result = run_cascade(
            OperationKind::SubmitNote,
            &endpoints,
            Duration::from_secs(5),
            |url| client().post(url),
        )
        .await
        .unwrap();

        assert_eq!(result.endpoint, endpoints[0]);
        assert_eq!(result.body["status"], "1");
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_falls_through_500_to_later_candidate() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/add-ticket-note")
            .with_status(500)
            .create_async()
            .await;
        let _m = server
            .mock("POST", "/ticket-notes")
            .with_status(200)
            .with_body(r#"{"status":"1","data":{}}"#)
            .create_async()
            .await;

        let endpoints = vec![
            format!("{}/add-ticket-note", server.url()),
            format!("{}/ticket-notes", server.url()),
        ];
        let result = run_cascade(
            OperationKind::SubmitNote,
            &endpoints,
            Duration::from_secs(5),
            |url| client().post(url),
        )
        .await
        .unwrap();

        assert_eq!(result.endpoint, endpoints[1]);
    }

    #[tokio::test]
    async fn test_exhaustion_is_tagged_with_the_operation() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/add-ticket-note")
            .with_status(500)
            .create_async()
            .await;
        let _m = server
            .mock("POST", "/ticket-notes")
            .with_status(404)
            .create_async()
            .await;

        let endpoints = vec![
            format!("{}/add-ticket-note", server.url()),
            format!("{}/ticket-notes", server.url()),
        ];
        let err = run_cascade(
            OperationKind::UploadAttachments,
            &endpoints,
            Duration::from_secs(5),
            |url| client().post(url),
        )
        .await
        .unwrap_err();

        match err {
            PortalError::CascadeExhausted(operation) => {
                assert_eq!(operation, "attachment upload");
            }
            other => panic!("expected CascadeExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unparseable_body_counts_as_failure() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/add-ticket-note")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;
        let _m = server
            .mock("POST", "/ticket-notes")
            .with_status(200)
            .with_body(r#"{"status":"1"}"#)
            .create_async()
            .await;

        let endpoints = vec![
            format!("{}/add-ticket-note", server.url()),
            format!("{}/ticket-notes", server.url()),
        ];
        let result = run_cascade(
            OperationKind::SubmitNote,
            &endpoints,
            Duration::from_secs(5),
            |url| client().post(url),
        )
        .await
        .unwrap();

        assert_eq!(result.endpoint, endpoints[1]);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_through() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/ticket-notes")
            .with_status(200)
            .with_body(r#"{"status":"1"}"#)
            .create_async()
            .await;

        let endpoints = vec![
            // Nothing listens here; the connect error means "try next".
            "http://127.0.0.1:1/add-ticket-note".to_string(),
            format!("{}/ticket-notes", server.url()),
        ];
        let result = run_cascade(
            OperationKind::SubmitNote,
            &endpoints,
            Duration::from_secs(5),
            |url| client().post(url),
        )
        .await
        .unwrap();

        assert_eq!(result.endpoint, endpoints[1]);
    }
}
