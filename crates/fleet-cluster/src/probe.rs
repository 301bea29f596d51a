//! Engine reachability probe.
//!
//! Sends `GET /_ping` to an engine's API address and reports whether it
//! answered with a 2xx inside the timeout.

use std::time::Duration;

use tracing::debug;

use fleet_core::EngineHealth;

/// Default time allowed for a ping, connect included.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(1);

/// Reduce an engine address to `host:port`.
///
/// Accepts `tcp://`, `http://` or bare `host:port`. Returns `None` for
/// schemes the probe cannot reach (e.g. `unix://`, `mem://`).
pub fn normalize_addr(addr: &str) -> Option<&str> {
    let rest = if let Some(rest) = addr.strip_prefix("tcp://") {
        rest
    } else if let Some(rest) = addr.strip_prefix("http://") {
        rest
    } else if addr.contains("://") {
        return None;
    } else {
        addr
    };

    let rest = rest.trim_end_matches('/');
    if rest.is_empty() { None } else { Some(rest) }
}

/// Ping an engine API.
pub async fn ping(addr: &str, timeout: Duration) -> EngineHealth {
    let Some(host) = normalize_addr(addr) else {
        debug!(%addr, "engine address not probeable");
        return EngineHealth::Down;
    };
    let uri = format!("http://{host}/_ping");

    let result = tokio::time::timeout(timeout, async {
        let stream = match tokio::net::TcpStream::connect(host).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, %uri, "ping connection failed");
                return EngineHealth::Down;
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, %uri, "ping handshake failed");
                return EngineHealth::Down;
            }
        };

        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = match http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header("host", host)
            .header("user-agent", "fleet-cluster/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => {
                debug!(error = %e, %uri, "ping request invalid");
                return EngineHealth::Down;
            }
        };

        match sender.send_request(req).await {
            Ok(resp) if resp.status().is_success() => EngineHealth::Up,
            Ok(resp) => {
                debug!(status = %resp.status(), %uri, "ping non-2xx");
                EngineHealth::Down
            }
            Err(e) => {
                debug!(error = %e, %uri, "ping request failed");
                EngineHealth::Down
            }
        }
    })
    .await;

    result.unwrap_or_else(|_| {
        debug!(%uri, "ping timed out");
        EngineHealth::Down
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and return the listener address.
    async fn one_shot_server(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        addr.to_string()
    }

    #[test]
    fn normalizes_known_schemes() {
        assert_eq!(normalize_addr("tcp://10.0.0.1:2375"), Some("10.0.0.1:2375"));
        assert_eq!(normalize_addr("http://host:2375/"), Some("host:2375"));
        assert_eq!(normalize_addr("host:2375"), Some("host:2375"));
        assert_eq!(normalize_addr("unix:///var/run/docker.sock"), None);
        assert_eq!(normalize_addr("mem://a"), None);
        assert_eq!(normalize_addr("tcp://"), None);
    }

    #[tokio::test]
    async fn ok_response_is_up() {
        let addr = one_shot_server("HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nOK").await;
        assert_eq!(ping(&format!("tcp://{addr}"), DEFAULT_PING_TIMEOUT).await, EngineHealth::Up);
    }

    #[tokio::test]
    async fn server_error_is_down() {
        let addr = one_shot_server("HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\n\r\n").await;
        assert_eq!(ping(&addr, DEFAULT_PING_TIMEOUT).await, EngineHealth::Down);
    }

    #[tokio::test]
    async fn refused_connection_is_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert_eq!(ping(&addr.to_string(), DEFAULT_PING_TIMEOUT).await, EngineHealth::Down);
    }

    #[tokio::test]
    async fn unprobeable_scheme_is_down() {
        assert_eq!(ping("mem://engine-a", DEFAULT_PING_TIMEOUT).await, EngineHealth::Down);
    }
}
