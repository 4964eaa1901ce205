use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{Backend, BackendError, BoxFuture};
use crate::protocol::{Dataset, IndexStatus, QueryRequest, QueryResults, Row};

/// [`Backend`] over the service's REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::Client)?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(
        &self,
        url: String,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BackendError> {
        debug!(%url, "backend request");
        let resp = req.send().await.map_err(|source| BackendError::Network {
            url: url.clone(),
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "backend returned error status");
            return Err(BackendError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: String) -> Result<T, BackendError> {
        let url = self.url(&path);
        let resp = self.send(url.clone(), self.client.get(&url)).await?;
        resp.json()
            .await
            .map_err(|source| BackendError::Decode { url, source })
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: String,
        body: &B,
    ) -> Result<T, BackendError> {
        let url = self.url(&path);
        let resp = self.send(url.clone(), self.client.post(&url).json(body)).await?;
        resp.json()
            .await
            .map_err(|source| BackendError::Decode { url, source })
    }
}

impl Backend for HttpBackend {
    fn dataset(&self, id: &str) -> BoxFuture<'_, Result<Dataset, BackendError>> {
        let path = format!("datasets/{id}");
        let id = id.to_string();
        Box::pin(async move {
            match self.get_json(path).await {
                Err(BackendError::Status { status: 404, .. }) => Err(BackendError::NotFound(id)),
                other => other,
            }
        })
    }

    fn datasets(&self) -> BoxFuture<'_, Result<Vec<Dataset>, BackendError>> {
        Box::pin(async move { self.get_json("datasets/".to_string()).await })
    }

    fn index_status(&self, id: &str) -> BoxFuture<'_, Result<IndexStatus, BackendError>> {
        let path = format!("datasets/{id}/status");
        Box::pin(async move { self.get_json(path).await })
    }

    fn reset_index(&self, id: &str) -> BoxFuture<'_, Result<(), BackendError>> {
        let url = self.url(&format!("datasets/{id}/reset-index"));
        Box::pin(async move {
            // The reset endpoint's body is not part of the contract.
            self.send(url.clone(), self.client.post(&url)).await?;
            Ok(())
        })
    }

    fn query(
        &self,
        id: &str,
        query: &QueryRequest,
    ) -> BoxFuture<'_, Result<QueryResults, BackendError>> {
        let path = format!("datasets/{id}/query");
        let query = query.clone();
        Box::pin(async move { self.post_json(path, &query).await })
    }

    fn object(&self, id: &str, row_id: i64) -> BoxFuture<'_, Result<Row, BackendError>> {
        let path = format!("datasets/{id}/objects/{row_id}");
        Box::pin(async move { self.get_json(path).await })
    }

    fn predict(&self, id: &str, horizon: u32) -> BoxFuture<'_, Result<Value, BackendError>> {
        let url = self.url(&format!("predict/{id}/{horizon}"));
        Box::pin(async move {
            let resp = self.send(url.clone(), self.client.post(&url)).await?;
            let text = resp
                .text()
                .await
                .map_err(|source| BackendError::Decode { url, source })?;
            // Forecasts are a placeholder upstream; an empty or non-JSON body is not an error.
            Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::HttpBackend;
    use std::time::Duration;

    #[test]
    fn urls_join_without_double_slashes() {
        let b = HttpBackend::new("http://localhost:8080/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(b.base_url(), "http://localhost:8080/api");
        assert_eq!(
            b.url("datasets/ds1/status"),
            "http://localhost:8080/api/datasets/ds1/status"
        );
        assert_eq!(b.url("/datasets/"), "http://localhost:8080/api/datasets/");
    }
}
