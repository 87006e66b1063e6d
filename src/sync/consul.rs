use crate::config::SyncSettings;
use crate::error::{StoreError, StoreResult};
use crate::sync::store::KvStore;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Consul KV store reached over its HTTP API
#[derive(Debug, Clone)]
pub struct ConsulKvStore {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ConsulKvStore {
    pub fn new(settings: &SyncSettings) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.call_timeout)
            .user_agent(concat!("pipetopo/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.store_url.trim_end_matches('/').to_string(),
            timeout: settings.call_timeout,
        })
    }

    fn kv_url(&self, key: &str) -> String {
        format!("{}/v1/kv/{}", self.base_url, key.trim_start_matches('/'))
    }

    /// PUT `value` and return Consul's `true`/`false` verdict
    async fn write(&self, key: &str, value: &str, query: &[(&str, &str)]) -> StoreResult<bool> {
        let response = self
            .client
            .put(self.kv_url(key))
            .query(query)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(value.to_string())
            .send()
            .await
            .map_err(|e| self.transport_error(key, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                key: key.to_string(),
            });
        }

        let verdict = response
            .text()
            .await
            .map_err(|e| self.transport_error(key, e))?;
        Ok(verdict.trim() != "false")
    }

    fn transport_error(&self, key: &str, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout {
                key: key.to_string(),
                after: self.timeout,
            }
        } else {
            StoreError::from(err)
        }
    }
}

#[async_trait]
impl KvStore for ConsulKvStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        debug!("Consul GET {}", key);
        let response = self
            .client
            .get(self.kv_url(key))
            .query(&[("raw", "true")])
            .send()
            .await
            .map_err(|e| self.transport_error(key, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| self.transport_error(key, e))?;
                Ok(Some(body))
            }
            status => Err(StoreError::Status {
                status: status.as_u16(),
                key: key.to_string(),
            }),
        }
    }

    async fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        debug!("Consul PUT {} ({} bytes)", key, value.len());
        if !self.write(key, value, &[]).await? {
            return Err(StoreError::unavailable(format!(
                "Consul rejected write of key '{key}'"
            )));
        }
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: &str) -> StoreResult<bool> {
        debug!("Consul PUT {} if absent ({} bytes)", key, value.len());
        // `cas=0` only writes when the key does not exist yet
        self.write(key, value, &[("cas", "0")]).await
    }

    async fn keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        debug!("Consul list keys under {}", prefix);
        let response = self
            .client
            .get(self.kv_url(prefix))
            .query(&[("keys", "true")])
            .send()
            .await
            .map_err(|e| self.transport_error(prefix, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status if status.is_success() => response
                .json::<Vec<String>>()
                .await
                .map_err(|e| StoreError::decode(prefix, e.to_string())),
            status => Err(StoreError::Status {
                status: status.as_u16(),
                key: prefix.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Answer one request with `status` and `body`; the task yields the raw request
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });
        (url, task)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + length {
                break;
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn store_at(url: &str) -> ConsulKvStore {
        let settings = SyncSettings::default()
            .with_store_url(url)
            .with_call_timeout(Duration::from_millis(300));
        ConsulKvStore::new(&settings).unwrap()
    }

    #[test]
    fn test_kv_url() {
        let settings = SyncSettings::default().with_store_url("http://consul:8500/");
        let store = ConsulKvStore::new(&settings).unwrap();
        assert_eq!(
            store.kv_url("pipeline/configs/p1"),
            "http://consul:8500/v1/kv/pipeline/configs/p1"
        );
    }

    #[tokio::test]
    async fn test_get_raw_value() {
        let (url, server) = serve_once("200 OK", r#"{"name":"p1"}"#).await;
        let value = store_at(&url).get("pipeline/configs/p1").await.unwrap();
        assert_eq!(value.as_deref(), Some(r#"{"name":"p1"}"#));

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /v1/kv/pipeline/configs/p1?raw=true "));
    }

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let (url, _server) = serve_once("404 Not Found", "").await;
        let value = store_at(&url).get("pipeline/configs/p1").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_get_server_error_is_status() {
        let (url, _server) = serve_once("500 Internal Server Error", "boom").await;
        let err = store_at(&url).get("pipeline/configs/p1").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Status { status: 500, ref key } if key == "pipeline/configs/p1"
        ));
    }

    #[tokio::test]
    async fn test_put_sends_body() {
        let (url, server) = serve_once("200 OK", "true").await;
        store_at(&url)
            .put("pipeline/configs/p1", r#"{"name":"p1"}"#)
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("PUT /v1/kv/pipeline/configs/p1 "));
        assert!(request.ends_with(r#"{"name":"p1"}"#));
    }

    #[tokio::test]
    async fn test_put_rejected_is_unavailable() {
        let (url, _server) = serve_once("200 OK", "false").await;
        let err = store_at(&url)
            .put("pipeline/configs/p1", "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_put_if_absent_uses_cas_zero() {
        let (url, server) = serve_once("200 OK", "true").await;
        assert!(
            store_at(&url)
                .put_if_absent("pipeline/configs/p1", "{}")
                .await
                .unwrap()
        );
        let request = server.await.unwrap();
        assert!(request.starts_with("PUT /v1/kv/pipeline/configs/p1?cas=0 "));
    }

    #[tokio::test]
    async fn test_put_if_absent_on_existing_key() {
        let (url, _server) = serve_once("200 OK", "false").await;
        let written = store_at(&url)
            .put_if_absent("pipeline/configs/p1", "{}")
            .await
            .unwrap();
        assert!(!written);
    }

    #[tokio::test]
    async fn test_keys_listing() {
        let (url, server) = serve_once(
            "200 OK",
            r#"["pipeline/configs/p1","pipeline/configs/p2"]"#,
        )
        .await;
        let keys = store_at(&url).keys("pipeline/configs").await.unwrap();
        assert_eq!(keys, vec!["pipeline/configs/p1", "pipeline/configs/p2"]);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /v1/kv/pipeline/configs?keys=true "));
    }

    #[tokio::test]
    async fn test_keys_under_empty_prefix() {
        let (url, _server) = serve_once("404 Not Found", "").await;
        let keys = store_at(&url).keys("pipeline/configs").await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_keys_bad_body_is_decode_error() {
        let (url, _server) = serve_once("200 OK", "not json").await;
        let err = store_at(&url).keys("pipeline/configs").await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_silent_agent_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(socket);
        });

        let err = store_at(&url).get("pipeline/configs/p1").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Timeout { ref key, .. } if key == "pipeline/configs/p1"
        ));
    }

    #[tokio::test]
    async fn test_refused_connection_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = store_at(&url).get("pipeline/configs/p1").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
