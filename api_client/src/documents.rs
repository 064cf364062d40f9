use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    error::{self, checked},
    model,
};

/// Firestore REST client. Paths are relative to the database's document
/// root, e.g. `users/{uid}/books`.
#[derive(Clone)]
pub struct DocumentClient {
    http_client: Client,
    documents_root: String,
}

impl DocumentClient {
    pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
    const PAGE_SIZE: &str = "300";

    pub fn new(base_url: &str, project_id: &str) -> Self {
        Self {
            http_client: Client::new(),
            documents_root: format!(
                "{}/projects/{project_id}/databases/(default)/documents",
                base_url.trim_end_matches('/')
            ),
        }
    }

    pub async fn list_documents(
        &self,
        id_token: &str,
        collection_path: &str,
    ) -> error::Result<Vec<model::Document>> {
        let mut documents = vec![];
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http_client
                .get(self.resolve(collection_path))
                .bearer_auth(id_token)
                .query(&[("pageSize", Self::PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: model::ListDocumentsResponse = self.execute(request).await?;
            documents.extend(page.documents);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(collection_path, count = documents.len(), "listed documents");
        Ok(documents)
    }

    pub async fn create_document(
        &self,
        id_token: &str,
        collection_path: &str,
        document_id: Option<&str>,
        fields: model::Fields,
    ) -> error::Result<model::Document> {
        let mut request = self
            .http_client
            .post(self.resolve(collection_path))
            .bearer_auth(id_token)
            .json(&model::DocumentWrite { fields });
        if let Some(document_id) = document_id {
            request = request.query(&[("documentId", document_id)]);
        }

        self.execute(request).await
    }

    /// Writes `fields`. With a mask only the named fields are touched,
    /// without one the document is replaced. `must_exist` turns a write to
    /// a missing document into a not-found error instead of a create.
    pub async fn patch_document(
        &self,
        id_token: &str,
        document_path: &str,
        fields: model::Fields,
        mask: Option<&[&str]>,
        must_exist: bool,
    ) -> error::Result<model::Document> {
        let mut request = self
            .http_client
            .patch(self.resolve(document_path))
            .bearer_auth(id_token)
            .json(&model::DocumentWrite { fields });
        if let Some(mask) = mask {
            let paths = mask
                .iter()
                .map(|path| ("updateMask.fieldPaths", *path))
                .collect::<Vec<_>>();
            request = request.query(&paths);
        }
        if must_exist {
            request = request.query(&[("currentDocument.exists", "true")]);
        }

        self.execute(request).await
    }

    pub async fn delete_document(&self, id_token: &str, document_path: &str) -> error::Result<()> {
        let request = self
            .http_client
            .delete(self.resolve(document_path))
            .bearer_auth(id_token);
        checked(request.send().await?).await?;
        Ok(())
    }

    pub async fn count(
        &self,
        id_token: &str,
        query: &model::RunAggregationQueryRequest,
        alias: &str,
    ) -> error::Result<i64> {
        let request = self
            .http_client
            .post(format!("{}:runAggregationQuery", self.documents_root))
            .bearer_auth(id_token)
            .json(query);

        let responses: Vec<model::RunAggregationQueryResponse> = self.execute(request).await?;
        responses
            .into_iter()
            .filter_map(|response| response.result)
            .find_map(|result| result.aggregate_fields.get(alias).and_then(model::Value::as_i64))
            .ok_or_else(|| error::Error::Unexpected(format!("no aggregate named {alias}")))
    }

    async fn execute<R>(&self, request: RequestBuilder) -> error::Result<R>
    where
        R: DeserializeOwned,
    {
        let response = checked(self.http_client.execute(request.build()?).await?).await?;
        Ok(serde_json::from_slice(&response.bytes().await?)?)
    }

    fn resolve(&self, path: &str) -> String {
        format!("{}/{}", self.documents_root, path.trim_start_matches('/'))
    }
}
