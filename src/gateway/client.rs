//! `reqwest` implementation of [`SpeechBackend`].
//!
//! Per call, [`HttpGateway`] resolves the language's endpoint
//! (`{endpoint_secret_prefix}_{LANG}`) and the shared API key from its
//! [`SecretStore`], sends a multipart form, and maps the outcome:
//!
//! | Outcome                 | Result                             | Retried |
//! |-------------------------|------------------------------------|---------|
//! | 2xx + valid JSON        | `Ok`                               | –       |
//! | 2xx + invalid JSON      | `MalformedResponse`                | no      |
//! | non-2xx                 | `Upstream { status, body }`        | no      |
//! | request timeout         | `Timeout`                          | no      |
//! | connect / send failure  | `Transport` (after retries)        | yes     |
//! | token cancelled         | `Cancelled`                        | no      |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::gateway::secrets::SecretStore;
use crate::gateway::wire::{AudioClip, GeneratedWord, GenerationRequest, RecognitionResponse};
use crate::gateway::{GatewayError, SpeechBackend};

// ---------------------------------------------------------------------------
// HttpGateway
// ---------------------------------------------------------------------------

/// Calls the speech service over HTTP.
///
/// # No hardcoded URLs
/// Endpoints and the API key come exclusively from the [`SecretStore`];
/// [`GatewayConfig`] only names the secrets and sets the call policy.
pub struct HttpGateway {
    client: reqwest::Client,
    config: GatewayConfig,
    secrets: Arc<dyn SecretStore>,
}

impl HttpGateway {
    /// Build an `HttpGateway` from application config.
    ///
    /// The HTTP client is pre-configured with the clamped per-request
    /// timeout.  A default client is used as a last-resort fallback if the
    /// builder fails.
    pub fn from_config(config: &GatewayConfig, secrets: Arc<dyn SecretStore>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            secrets,
        }
    }

    /// Secret name holding the endpoint for `language`.
    pub fn endpoint_secret_name(&self, language: &str) -> String {
        format!(
            "{}_{}",
            self.config.endpoint_secret_prefix,
            language.trim().to_ascii_uppercase()
        )
    }

    fn url(&self, language: &str, path: &str) -> Result<String, GatewayError> {
        let base = self.secrets.get_secret(&self.endpoint_secret_name(language))?;
        let base = base.trim().trim_end_matches('/');
        if path.is_empty() {
            return Ok(base.to_string());
        }
        Ok(format!("{}/{}", base, path.trim_start_matches('/')))
    }

    /// Send the request produced by `build`, retrying transport failures.
    ///
    /// `build` is called once per attempt because multipart bodies cannot be
    /// cloned.
    async fn execute<F>(
        &self,
        what: &str,
        build: F,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GatewayError>
    where
        F: Fn() -> Result<RequestBuilder, GatewayError>,
    {
        let retries = self.config.retries();
        let timeout = self.config.timeout();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let request = build()?;

            log::debug!("gateway: {} attempt {}", what, attempt);

            let sent = tokio::select! {
                _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                sent = request.send() => sent,
            };

            match sent {
                Ok(response) => return read_json(response, timeout, cancel).await,
                Err(e) if e.is_timeout() => return Err(GatewayError::Timeout(timeout)),
                Err(e) => {
                    if attempt <= retries {
                        log::warn!(
                            "gateway: {} transport failure (attempt {}), will retry: {}",
                            what,
                            attempt,
                            e
                        );
                        let backoff = self.config.retry_backoff() * attempt;
                        tokio::select! {
                            _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                            _ = tokio::time::sleep(backoff) => {}
                        }
                        continue;
                    }
                    log::error!("gateway: {} failed after {} attempts: {}", what, attempt, e);
                    return Err(GatewayError::Transport(e.to_string()));
                }
            }
        }
    }
}

/// Map a response to JSON, or to `Upstream` for non-success statuses.
async fn read_json(
    response: Response,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, GatewayError> {
    let status = response.status();

    let body = tokio::select! {
        _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
        body = response.text() => body,
    };
    let body = body.map_err(|e| {
        if e.is_timeout() {
            GatewayError::Timeout(timeout)
        } else {
            GatewayError::Transport(e.to_string())
        }
    })?;

    if !status.is_success() {
        log::warn!("gateway: upstream returned {}", status);
        return Err(GatewayError::Upstream {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| GatewayError::MalformedResponse(e.to_string()))
}

#[async_trait]
impl SpeechBackend for HttpGateway {
    async fn recognize(
        &self,
        audio: &AudioClip,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        audio.validate()?;
        // Reject a bad MIME type before any network activity.
        Part::bytes(Vec::new())
            .mime_str(&audio.mime_type)
            .map_err(|e| GatewayError::InvalidInput(format!("bad audio MIME type: {e}")))?;

        let url = self.url(language, &self.config.recognize_path)?;
        let key = self.secrets.get_secret(&self.config.api_key_secret)?;

        let raw = self
            .execute(
                "recognize",
                || {
                    let part = Part::bytes(audio.bytes.clone())
                        .file_name("attempt")
                        .mime_str(&audio.mime_type)
                        .map_err(|e| GatewayError::InvalidInput(e.to_string()))?;
                    let form = Form::new()
                        .part("audio", part)
                        .text("language", language.to_string());
                    Ok(self.client.post(&url).bearer_auth(&key).multipart(form))
                },
                cancel,
            )
            .await?;

        RecognitionResponse::parse(raw)
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GeneratedWord, GatewayError> {
        request.validate()?;

        let url = self.url(&request.language, &self.config.generate_path)?;
        let key = self.secrets.get_secret(&self.config.api_key_secret)?;

        let raw = self
            .execute(
                "generate",
                || {
                    let form = Form::new()
                        .text("phoneme", request.phoneme.clone())
                        .text("difficulty_level", request.difficulty_level.as_str())
                        .text("language", request.language.clone());
                    Ok(self.client.post(&url).bearer_auth(&key).multipart(form))
                },
                cancel,
            )
            .await?;

        GeneratedWord::parse(raw)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use crate::gateway::secrets::MapSecretStore;
    use crate::progression::DifficultyLevel;

    // -----------------------------------------------------------------------
    // Canned HTTP server
    // -----------------------------------------------------------------------

    /// Read one request (headers + body) so the client sees a clean exchange.
    async fn drain_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);
            let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
            let body = &buf[header_end + 4..];
            if let Some(len) = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
            {
                if body.len() >= len {
                    return;
                }
            } else if headers.contains("transfer-encoding: chunked") {
                if body.ends_with(b"0\r\n\r\n") {
                    return;
                }
            } else {
                return;
            }
        }
    }

    /// Serve `status` + `body` to every connection; returns base URL and hit count.
    async fn serve(status: u16, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drain_request(&mut stream).await;
                let reply = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    fn gateway(base_url: &str) -> HttpGateway {
        let secrets = MapSecretStore::new()
            .with("SPEECH_ENDPOINT_EN", base_url)
            .with("SPEECH_API_KEY", "test-key");
        let config = GatewayConfig {
            retry_backoff_ms: 10,
            ..GatewayConfig::default()
        };
        HttpGateway::from_config(&config, Arc::new(secrets))
    }

    fn clip() -> AudioClip {
        AudioClip::new(vec![1, 2, 3, 4], "audio/wav")
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn recognize_returns_transcription() {
        let (url, hits) = serve(200, r#"{"transcription":"sɪŋk"}"#).await;
        let gw = gateway(&url);
        let text = gw
            .recognize(&clip(), "en", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(text, "sɪŋk");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn generate_validates_payload() {
        let (url, _) = serve(200, r#"{"word":"think","phoneme_count":4,"ipa":["θɪŋk"]}"#).await;
        let gw = gateway(&url);
        let req = GenerationRequest::new("θ", DifficultyLevel::Beginner, "en");
        let word = gw.generate(&req, &CancellationToken::new()).await.unwrap();
        assert_eq!(word.word, "think");
        assert_eq!(word.raw["ipa"][0], "θɪŋk");
    }

    #[tokio::test]
    async fn error_status_is_upstream_error_and_not_retried() {
        let (url, hits) = serve(503, r#"{"error":"overloaded"}"#).await;
        let gw = gateway(&url);
        let err = gw
            .recognize(&clip(), "en", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::Upstream {
                status: 503,
                body: r#"{"error":"overloaded"}"#.into()
            }
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_success_body_is_not_retried() {
        let (url, hits) = serve(200, r#"{"word":"x"}"#).await;
        let gw = gateway(&url);
        let req = GenerationRequest::new("θ", DifficultyLevel::Beginner, "en");
        let err = gw.generate(&req, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let gw = gateway(&format!("http://{addr}"));
        let err = gw
            .recognize(&clip(), "en", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)), "{err:?}");
    }

    #[tokio::test]
    async fn dropped_connections_are_retried_up_to_the_limit() {
        // Accepts and immediately closes every connection.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        let gw = gateway(&format!("http://{addr}"));
        assert_eq!(gw.config.retries(), 2);
        let err = gw
            .recognize(&clip(), "en", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)), "{err:?}");
        // First attempt plus two retries.
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stalled_response_times_out_without_retry() {
        // Accepts connections but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(stream);
            }
        });

        // The configured timeout is clamped to at least 10 s; use a client
        // with a short one so the test stays quick.
        let base = gateway(&format!("http://{addr}"));
        let gw = HttpGateway {
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(200))
                .build()
                .unwrap(),
            config: base.config.clone(),
            secrets: base.secrets.clone(),
        };

        let req = GenerationRequest::new("θ", DifficultyLevel::Beginner, "en");
        let err = gw.generate(&req, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err, GatewayError::Timeout(gw.config.timeout()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_endpoint_secret_fails_before_sending() {
        let gw = HttpGateway::from_config(
            &GatewayConfig::default(),
            Arc::new(MapSecretStore::new().with("SPEECH_API_KEY", "k")),
        );
        let err = gw
            .recognize(&clip(), "th", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::SecretMissing("SPEECH_ENDPOINT_TH".into()));
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_sending() {
        let gw = HttpGateway::from_config(
            &GatewayConfig::default(),
            Arc::new(MapSecretStore::new().with("SPEECH_ENDPOINT_EN", "http://127.0.0.1:9")),
        );
        let err = gw
            .recognize(&clip(), "en", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::SecretMissing("SPEECH_API_KEY".into()));
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_hanging_call() {
        // Accepts connections but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let gw = gateway(&format!("http://{addr}"));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = gw.recognize(&clip(), "en", &cancel).await.unwrap_err();
        assert_eq!(err, GatewayError::Cancelled);
    }

    #[tokio::test]
    async fn empty_audio_is_rejected_locally() {
        let gw = gateway("http://127.0.0.1:9");
        let err = gw
            .recognize(&AudioClip::new(Vec::new(), "audio/wav"), "en", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

    #[test]
    fn endpoint_secret_is_language_qualified() {
        let gw = gateway("http://localhost");
        assert_eq!(gw.endpoint_secret_name("en"), "SPEECH_ENDPOINT_EN");
        assert_eq!(gw.endpoint_secret_name("pt-br"), "SPEECH_ENDPOINT_PT-BR");
    }

    #[test]
    fn url_joins_endpoint_and_path() {
        let gw = gateway("http://host/api/");
        assert_eq!(gw.url("en", "/recognize").unwrap(), "http://host/api/recognize");
    }
}
