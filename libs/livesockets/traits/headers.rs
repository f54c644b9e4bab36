use async_trait::async_trait;
use std::collections::HashMap;

/// HTTP headers to send with the WebSocket handshake
pub type Headers = HashMap<String, String>;

/// Trait for providing handshake headers dynamically
///
/// Called on every connection attempt, including automatic retries, so
/// short-lived credentials can be refreshed between attempts.
///
/// # Example
/// ```ignore
/// struct BearerHeaders {
///     token: String,
/// }
///
/// #[async_trait::async_trait]
/// impl HeaderProvider for BearerHeaders {
///     async fn get_headers(&self) -> Headers {
///         let mut headers = Headers::new();
///         headers.insert("Authorization".to_string(), format!("Bearer {}", self.token));
///         headers
///     }
/// }
/// ```
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    async fn get_headers(&self) -> Headers;
}

/// A header provider that doesn't add any headers
pub struct NoHeaders;

#[async_trait]
impl HeaderProvider for NoHeaders {
    async fn get_headers(&self) -> Headers {
        HashMap::new()
    }
}
