// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Blocking HTTP adapter for the foundry [`Transport`] port.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::dbg_macro)]

use std::time::Duration;

use foundry_model::{ClientConfig, Guid, Transport, TransportError};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

/// [`Transport`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    target: String,
}

impl HttpTransport {
    /// Build a transport for `config.target` with `config.timeout_secs`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(http, &config.target))
    }

    /// Wrap an already configured `reqwest` client (auth headers, proxies).
    pub fn with_client(http: Client, target: &str) -> Self {
        Self {
            http,
            target: target.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL requests are sent to.
    pub fn target(&self) -> &str {
        &self.target
    }

    fn collection_url(&self, resource: &str) -> String {
        format!("{}/{}", self.target, resource.trim_matches('/'))
    }

    fn member_url(&self, resource: &str, guid: &Guid) -> String {
        format!("{}/{}", self.collection_url(resource), guid)
    }

    fn send(&self, method: Method, url: String, body: Option<&Value>) -> Result<Value, TransportError> {
        debug!(%method, %url, "sending request");
        let mut request: RequestBuilder = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        decode_response(status, &text)
    }
}

/// Map a status and body onto the transport contract: non-2xx is
/// [`TransportError::Status`], an empty body is `null`, anything else must be
/// JSON.
pub fn decode_response(status: u16, text: &str) -> Result<Value, TransportError> {
    if !(200..300).contains(&status) {
        return Err(TransportError::Status {
            status,
            body: text.to_string(),
        });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| TransportError::Decode(e.to_string()))
}

impl Transport for HttpTransport {
    fn get(&self, resource: &str, guid: &Guid) -> Result<Value, TransportError> {
        self.send(Method::GET, self.member_url(resource, guid), None)
    }

    fn post(&self, resource: &str, body: &Value) -> Result<Value, TransportError> {
        self.send(Method::POST, self.collection_url(resource), Some(body))
    }

    fn put(&self, resource: &str, guid: &Guid, body: &Value) -> Result<Value, TransportError> {
        self.send(Method::PUT, self.member_url(resource, guid), Some(body))
    }

    fn delete(&self, resource: &str, guid: &Guid) -> Result<(), TransportError> {
        self.send(Method::DELETE, self.member_url(resource, guid), None)
            .map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport(target: &str) -> HttpTransport {
        HttpTransport::with_client(Client::new(), target)
    }

    #[test]
    fn urls_join_without_doubled_slashes() {
        let t = transport("http://localhost:8181/");
        assert_eq!(t.target(), "http://localhost:8181");
        assert_eq!(t.collection_url("/v2/apps/"), "http://localhost:8181/v2/apps");
        assert_eq!(
            t.member_url("v2/apps", &Guid::new("g1")),
            "http://localhost:8181/v2/apps/g1"
        );
    }

    #[test]
    fn from_config_uses_target() {
        let config = ClientConfig {
            target: "https://api.example.test".into(),
            ..ClientConfig::default()
        };
        let t = HttpTransport::from_config(&config).unwrap();
        assert_eq!(t.collection_url("v2/spaces"), "https://api.example.test/v2/spaces");
    }

    #[test]
    fn non_success_status_keeps_body() {
        let err = decode_response(404, "{\"code\":10000}").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            err,
            TransportError::Status {
                status: 404,
                body: "{\"code\":10000}".into()
            }
        );
    }

    #[test]
    fn empty_body_is_null_and_json_is_parsed() {
        assert_eq!(decode_response(204, "").unwrap(), Value::Null);
        assert_eq!(
            decode_response(201, r#"{"metadata":{"guid":"g"}}"#).unwrap(),
            json!({ "metadata": { "guid": "g" } })
        );
    }

    #[test]
    fn garbage_body_is_a_decode_error() {
        assert!(matches!(
            decode_response(200, "<html>"),
            Err(TransportError::Decode(_))
        ));
    }
}
