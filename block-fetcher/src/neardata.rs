use crate::*;

use std::future::Future;

const MAX_REDIRECTS: usize = 5;

/// Source of raw blocks by height.
pub trait BlockSource {
    /// Returns `Ok(None)` while the block at `block_height` is not produced yet.
    fn fetch_block_at_height(
        &self,
        block_height: BlockHeight,
    ) -> impl Future<Output = Result<Option<RawBlock>, FetchError>> + Send;

    fn fetch_latest_final_block(&self) -> impl Future<Output = Result<RawBlock, FetchError>> + Send;
}

pub struct NeardataClient {
    client: reqwest::Client,
    base_url: String,
    auth_bearer_token: Option<String>,
}

impl NeardataClient {
    pub fn new(
        chain_id: ChainId,
        auth_bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        Self::with_base_url(
            format!("https://{chain_id}.neardata.xyz/v0"),
            auth_bearer_token,
            timeout,
        )
    }

    pub fn with_base_url(
        base_url: String,
        auth_bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        // Redirects are followed by hand, reqwest drops the bearer token across hosts
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_bearer_token,
        })
    }

    async fn get_block(&self, path: &str) -> Result<Option<RawBlock>, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let mut url = reqwest::Url::parse(&url)
            .map_err(|err| FetchError::Redirect(format!("invalid url {}: {}", url, err)))?;
        for _ in 0..=MAX_REDIRECTS {
            let mut request = self.client.get(url.clone());
            if let Some(token) = &self.auth_bearer_token {
                request = request.bearer_auth(token);
            }
            let response = request.send().await?;
            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|location| location.to_str().ok())
                    .ok_or_else(|| {
                        FetchError::Redirect(format!("{} without a location from {}", status, url))
                    })?;
                url = url.join(location).map_err(|err| {
                    FetchError::Redirect(format!("invalid location {:?}: {}", location, err))
                })?;
                tracing::debug!(target: BLOCK_FETCHER, "Following redirect to {}", url);
                continue;
            }
            if !status.is_success() {
                return Err(FetchError::Status(status));
            }
            let body = response.text().await?;
            return decode_block(&body);
        }
        Err(FetchError::Redirect(format!(
            "more than {} redirects for {}",
            MAX_REDIRECTS, path
        )))
    }
}

/// neardata answers `null` for heights that are not produced yet.
fn decode_block(body: &str) -> Result<Option<RawBlock>, FetchError> {
    Ok(serde_json::from_str::<Option<RawBlock>>(body)?)
}

impl BlockSource for NeardataClient {
    async fn fetch_block_at_height(
        &self,
        block_height: BlockHeight,
    ) -> Result<Option<RawBlock>, FetchError> {
        self.get_block(&format!("/block/{block_height}")).await
    }

    async fn fetch_latest_final_block(&self) -> Result<RawBlock, FetchError> {
        self.get_block("/last_block/final")
            .await?
            .ok_or_else(|| FetchError::Empty("/last_block/final".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers every connection with `respond(port, request_head)` and records the request heads.
    async fn serve(
        respond: impl Fn(u16, &str) -> String + Send + Sync + 'static,
    ) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(vec![]));
        let recorded = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&head).to_lowercase();
                let response = respond(addr.port(), &head);
                recorded.lock().unwrap().push(head);
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        (addr, requests)
    }

    fn http_response(status: &str, headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\n{headers}content-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn client(addr: SocketAddr, token: Option<&str>) -> NeardataClient {
        NeardataClient::with_base_url(
            format!("http://{addr}/v0/"),
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_decode_block() {
        assert!(decode_block("null").unwrap().is_none());
        let raw_block = decode_block(r#"{"block": {"header": {"height": 9}}, "shards": []}"#)
            .unwrap()
            .unwrap();
        assert_eq!(raw_block.height(), Some(9));
        assert!(matches!(decode_block("<html>"), Err(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_null_body_is_unavailable() {
        let (addr, requests) = serve(|_, _| http_response("200 OK", "", "null")).await;

        let block = client(addr, Some("SECRET")).fetch_block_at_height(100).await.unwrap();

        assert!(block.is_none());
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("get /v0/block/100 "));
        assert!(requests[0].contains("authorization: bearer secret"));
    }

    #[tokio::test]
    async fn test_error_status() {
        let (addr, _) = serve(|_, _| http_response("503 Service Unavailable", "", "")).await;

        let result = client(addr, None).fetch_block_at_height(100).await;

        match result {
            Err(FetchError::Status(status)) => assert_eq!(status.as_u16(), 503),
            other => panic!("Unexpected result: {:?}", other.map(|block| block.is_some())),
        }
    }

    #[tokio::test]
    async fn test_missing_latest_final_block() {
        let (addr, _) = serve(|_, _| http_response("200 OK", "", "null")).await;

        let result = client(addr, None).fetch_latest_final_block().await;

        assert!(matches!(result, Err(FetchError::Empty(_))));
    }

    #[tokio::test]
    async fn test_bearer_token_survives_cross_host_redirect() {
        let (archive, archive_requests) = serve(|_, _| http_response("200 OK", "", "null")).await;
        let location = format!("location: http://localhost:{}/v0/block/100\r\n", archive.port());
        let (front, front_requests) =
            serve(move |_, _| http_response("302 Found", &location, "")).await;

        let block = client(front, Some("SECRET")).fetch_block_at_height(100).await.unwrap();

        assert!(block.is_none());
        assert_eq!(front_requests.lock().unwrap().len(), 1);
        let archive_requests = archive_requests.lock().unwrap();
        assert_eq!(archive_requests.len(), 1);
        assert!(archive_requests[0].starts_with("get /v0/block/100 "));
        assert!(archive_requests[0].contains("authorization: bearer secret"));
    }

    #[tokio::test]
    async fn test_relative_redirect() {
        let (addr, requests) = serve(|_, head| {
            if head.starts_with("get /v0/block/100 ") {
                http_response("301 Moved Permanently", "location: /archive/block/100\r\n", "")
            } else {
                http_response("200 OK", "", r#"{"block": {"header": {"height": 100}}}"#)
            }
        })
        .await;

        let block = client(addr, None).fetch_block_at_height(100).await.unwrap();

        assert_eq!(block.and_then(|raw_block| raw_block.height()), Some(100));
        let requests = requests.lock().unwrap();
        assert!(requests[1].starts_with("get /archive/block/100 "));
    }

    #[tokio::test]
    async fn test_redirect_loop_is_bounded() {
        let (addr, requests) = serve(|port, _| {
            let location = format!("location: http://127.0.0.1:{port}/v0/block/100\r\n");
            http_response("307 Temporary Redirect", &location, "")
        })
        .await;

        let result = client(addr, None).fetch_block_at_height(100).await;

        assert!(matches!(result, Err(FetchError::Redirect(_))));
        assert_eq!(requests.lock().unwrap().len(), MAX_REDIRECTS + 1);
    }
}
