use reqwest::Client;
use tracing::debug;

use crate::{
    error::{self, checked},
    model,
};

/// Google Books volumes search.
#[derive(Clone)]
pub struct CatalogClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CatalogClient {
    pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/books/v1";
    pub const MAX_RESULTS: usize = 10;

    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.map(str::to_owned),
        }
    }

    pub async fn search(&self, query_text: &str) -> error::Result<Vec<model::SearchCandidate>> {
        let api_key = self.api_key.as_deref().ok_or(error::Error::MissingApiKey)?;
        let max_results = Self::MAX_RESULTS.to_string();

        debug!(query_text, "searching volumes");
        let request = self
            .http_client
            .get(format!("{}/volumes", self.base_url))
            .query(&[
                ("q", query_text),
                ("key", api_key),
                ("maxResults", max_results.as_str()),
            ])
            .build()?;
        let response = checked(self.http_client.execute(request).await?).await?;
        let volumes: model::VolumesResponse = serde_json::from_slice(&response.bytes().await?)?;

        Ok(volumes
            .items
            .into_iter()
            .take(Self::MAX_RESULTS)
            .map(model::SearchCandidate::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        // Unroutable on purpose, the call must not get that far
        let client = CatalogClient::new("http://0.0.0.0:1", None);
        let result = client.search("Dune").await;
        assert!(matches!(result, Err(error::Error::MissingApiKey)));
    }
}
