//! Generation passthrough endpoint.
//!
//! Framework-agnostic: the caller decodes the HTTP request into a method and
//! form fields and writes the returned [`HttpReply`] back out.
//!
//! | Request                        | Reply                                  |
//! |--------------------------------|----------------------------------------|
//! | `OPTIONS`                      | 204, CORS headers                      |
//! | missing / bad field            | 400 `{"error": ..}`, nothing sent      |
//! | upstream success               | 200, upstream JSON unchanged           |
//! | any other failure              | 500 `{"error": ..}`                    |

use std::collections::HashMap;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::error::CoachError;
use crate::gateway::wire::GenerationRequest;
use crate::gateway::{GatewayError, SpeechBackend};

/// Headers attached to every reply.
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "POST, OPTIONS"),
    (
        "Access-Control-Allow-Headers",
        "authorization, x-client-info, apikey, content-type",
    ),
];

/// A transport-neutral HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpReply {
    fn new(status: u16, body: String) -> Self {
        let mut headers: Vec<(String, String)> = CORS_HEADERS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if !body.is_empty() {
            headers.push(("Content-Type".into(), "application/json".into()));
        }
        Self {
            status,
            headers,
            body,
        }
    }

    fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, &json!({ "error": message }))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Handle one request to the generation endpoint.
pub async fn handle_generate(
    backend: &dyn SpeechBackend,
    method: &str,
    form: &HashMap<String, String>,
    cancel: &CancellationToken,
) -> HttpReply {
    if method.eq_ignore_ascii_case("OPTIONS") {
        return HttpReply::new(204, String::new());
    }

    let request = match GenerationRequest::from_form(form) {
        Ok(request) => request,
        Err(GatewayError::InvalidInput(message)) => return HttpReply::error(400, &message),
        Err(other) => return HttpReply::error(400, &other.to_string()),
    };

    match backend.generate(&request, cancel).await {
        Ok(word) => HttpReply::json(200, &word.raw),
        Err(err) => {
            log::error!("generate endpoint: {}", err);
            HttpReply::error(500, CoachError::from(err).user_message())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
