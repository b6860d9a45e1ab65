//! Shared HTTP GET client with retry/backoff for the price adapters.

use super::DataSourceError;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;

/// JSON-over-HTTPS client shared by all adapters.
///
/// Transient failures (network, 429, 5xx) are retried with exponential
/// backoff until `budget` has elapsed; 4xx and malformed bodies fail at once.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    budget: Duration,
}

impl HttpClient {
    /// Fails when the TLS backend cannot be initialized.
    pub fn new(budget: Duration) -> Result<Self, DataSourceError> {
        let client = Client::builder()
            .timeout(budget)
            .user_agent(concat!("portfolio-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataSourceError::Other(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self { client, budget })
    }

    /// GET `url` with query parameters and extra headers, decoding a JSON body.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<serde_json::Value, DataSourceError> {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(250),
            max_elapsed_time: Some(self.budget),
            ..Default::default()
        };

        retry(backoff, || async {
            let mut request = self.client.get(url).query(query);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }

            let response = request.send().await.map_err(|e| {
                backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
            })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(DataSourceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_builds_client_with_budget() {
        let http = HttpClient::new(Duration::from_millis(750)).unwrap();
        assert_eq!(http.budget, Duration::from_millis(750));
    }
}
