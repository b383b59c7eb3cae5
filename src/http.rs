//! HTTP client construction.
//!
//! One `reqwest::Client` is built per [`OllamaClient`](crate::OllamaClient)
//! and shared by every call; each call draws its own connection from the
//! pool.

use reqwest::{Client, RequestBuilder};
use std::collections::HashMap;

use crate::options::ClientOptions;

/// Build a configured HTTP client from client options.
///
/// The overall request timeout is not set here: buffered calls apply it per
/// request and streaming calls only bound the wait for headers.
///
/// # Example
/// ```ignore
/// let client = build_http_client(&options)?;
/// ```
pub fn build_http_client(options: &ClientOptions) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();

    if let Some(connect_timeout) = options.connect_timeout {
        builder = builder.connect_timeout(connect_timeout);
    }

    if let Some(proxy_url) = &options.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
    }

    builder.build()
}

/// Add extra headers to a request if specified in client options.
///
/// # Example
/// ```ignore
/// let mut req = client.post(url);
/// req = add_extra_headers(req, &options.extra_headers);
/// ```
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_build_http_client() {
        let options = ClientOptions::default()
            .with_timeout(Duration::from_secs(30))
            .with_connect_timeout(Duration::from_secs(5));

        let client = build_http_client(&options);
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let options = ClientOptions::default().with_proxy("http://proxy.example.com:8080");

        let client = build_http_client(&options);
        assert!(client.is_ok());
    }

    #[test]
    fn test_extra_headers_are_applied() {
        let options = ClientOptions::default().with_header("X-Request-Source", "tests");
        let request = add_extra_headers(
            Client::new().get("http://localhost:11434/api/tags"),
            &options.extra_headers,
        )
        .build()
        .unwrap();

        assert_eq!(request.headers()["x-request-source"], "tests");
    }
}
