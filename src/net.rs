use std::time::Duration;
use tokio::net::TcpStream;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Cheap reachability probe consulted before any endpoint cascade starts.
/// A closed socket or a slow handshake both count as offline.
pub async fn is_online(base_url: &str) -> bool {
    let Some((host, port)) = host_port(base_url) else {
        return false;
    };
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect((host.as_str(), port))).await,
        Ok(Ok(_))
    )
}

fn host_port(base_url: &str) -> Option<(String, u16)> {
    let (rest, default_port) = if let Some(rest) = base_url.strip_prefix("https://") {
        (rest, 443)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        (rest, 80)
    } else {
        return None;
    };

    let authority = rest.split('/').next()?;
    if authority.is_empty() {
        return None;
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => Some((host.to_string(), port.parse().ok()?)),
        None => Some((authority.to_string(), default_port)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_port_with_explicit_port() {
        assert_eq!(
            host_port("http://127.0.0.1:8080/apis"),
            Some(("127.0.0.1".to_string(), 8080))
        );
    }

    #[test]
    fn test_host_port_default_ports() {
        assert_eq!(
            host_port("https://portal.example.com/apis"),
            Some(("portal.example.com".to_string(), 443))
        );
        assert_eq!(
            host_port("http://portal.example.com"),
            Some(("portal.example.com".to_string(), 80))
        );
    }

    #[test]
    fn test_host_port_rejects_unsupported_schemes() {
        assert_eq!(host_port("ftp://example.com"), None);
        assert_eq!(host_port("portal.example.com"), None);
    }

    #[tokio::test]
    async fn test_is_online_false_for_closed_port() {
        // Port 1 is essentially never listening on loopback.
        assert!(!is_online("http://127.0.0.1:1").await);
    }
}
