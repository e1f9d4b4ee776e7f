pub mod codec;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{FeedError, Result};
use crate::models::{Entry, EntryFields, EntryPatch, StoreSettings};
use crate::services::store::{EntrySource, MutationSink, SnapshotScope};

use codec::{decode_entry, encode_fields, encode_patch, Document};

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub base_url: String,
    pub project_id: String,
    pub api_key: String,
    pub id_token: Option<String>,
    pub collection: String,
    pub timeout_secs: u64,
}

impl From<&StoreSettings> for FirestoreConfig {
    fn from(settings: &StoreSettings) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            project_id: settings.project_id.clone(),
            api_key: settings.api_key.clone(),
            id_token: settings.id_token.clone(),
            collection: settings.collection.clone(),
            timeout_secs: settings.timeout_secs,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    #[serde(default)]
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct FirestoreClient {
    config: FirestoreConfig,
    client: Client,
}

impl FirestoreClient {
    pub fn new(config: FirestoreConfig) -> Result<Self> {
        if config.project_id.trim().is_empty() {
            return Err(FeedError::Config("store project_id is not set".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    fn database_path(&self) -> String {
        format!("projects/{}/databases/(default)", self.config.project_id)
    }

    fn documents_url(&self) -> String {
        format!("{}/{}/documents", self.config.base_url, self.database_path())
    }

    fn parent_path(&self) -> String {
        format!("artifacts/{}/public/data", self.config.project_id)
    }

    fn document_path(&self, id: &str) -> String {
        format!("{}/{}/{}", self.parent_path(), self.config.collection, id)
    }

    /// Full resource name, as used inside commit writes.
    fn document_name(&self, id: &str) -> String {
        format!("{}/documents/{}", self.database_path(), self.document_path(id))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self.client.request(method, url);
        if !self.config.api_key.is_empty() {
            builder = builder.query(&[("key", self.config.api_key.as_str())]);
        }
        if let Some(token) = &self.config.id_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|e| e.error.message)
            .unwrap_or(text);
        Err(FeedError::Store {
            status: status.as_u16(),
            message,
        })
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
        let response = Self::check_status(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn commit(&self, id: &str, write: Value) -> Result<()> {
        let url = format!("{}:commit", self.documents_url());
        let response = self
            .request(Method::POST, &url)
            .json(&json!({ "writes": [write] }))
            .send()
            .await?;
        Self::check_status(response).await.map(|_| ()).map_err(|e| not_found(e, id))
    }

    fn structured_query(&self, scope: SnapshotScope) -> Value {
        let mut query = json!({
            "from": [{ "collectionId": self.config.collection }],
            "orderBy": [{ "field": { "fieldPath": "timestamp" }, "direction": "DESCENDING" }]
        });
        if scope == SnapshotScope::Published {
            query["where"] = json!({
                "fieldFilter": {
                    "field": { "fieldPath": "status" },
                    "op": "EQUAL",
                    "value": { "stringValue": "published" }
                }
            });
        }
        json!({ "structuredQuery": query })
    }
}

/// A failed precondition on a single document means it does not exist.
fn not_found(error: FeedError, id: &str) -> FeedError {
    match error {
        FeedError::Store { status: 404, .. } => FeedError::NotFound(id.to_string()),
        other => other,
    }
}

#[async_trait]
impl EntrySource for FirestoreClient {
    async fn fetch_snapshot(&self, scope: SnapshotScope) -> Result<Vec<Entry>> {
        let url = format!("{}/{}:runQuery", self.documents_url(), self.parent_path());
        let response = self
            .request(Method::POST, &url)
            .json(&self.structured_query(scope))
            .send()
            .await
            .map_err(|e| FeedError::Subscription(e.to_string()))?;
        let items: Vec<RunQueryItem> = Self::handle_response(response).await?;

        let mut entries = Vec::with_capacity(items.len());
        for doc in items.into_iter().filter_map(|item| item.document) {
            match decode_entry(&doc) {
                Ok(entry) => entries.push(entry),
                Err(e) => log::warn!("[Firestore] Skipping {}: {}", doc.name, e),
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl MutationSink for FirestoreClient {
    async fn increment_heart(&self, id: &str) -> Result<()> {
        self.commit(
            id,
            json!({
                "transform": {
                    "document": self.document_name(id),
                    "fieldTransforms": [
                        { "fieldPath": "hearts", "increment": { "integerValue": "1" } }
                    ]
                },
                "currentDocument": { "exists": true }
            }),
        )
        .await
    }

    async fn create_entry(&self, fields: EntryFields) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.commit(
            &id,
            json!({
                "update": {
                    "name": self.document_name(&id),
                    "fields": encode_fields(&fields)
                },
                "updateTransforms": [
                    { "fieldPath": "timestamp", "setToServerValue": "REQUEST_TIME" },
                    { "fieldPath": "createdAt", "setToServerValue": "REQUEST_TIME" }
                ],
                "currentDocument": { "exists": false }
            }),
        )
        .await?;
        log::info!("[Firestore] Created entry {}", id);
        Ok(id)
    }

    async fn update_entry(&self, id: &str, patch: EntryPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let (fields, mask) = encode_patch(&patch);
        self.commit(
            id,
            json!({
                "update": {
                    "name": self.document_name(id),
                    "fields": fields
                },
                "updateMask": { "fieldPaths": mask },
                "updateTransforms": [
                    { "fieldPath": "updatedAt", "setToServerValue": "REQUEST_TIME" }
                ],
                "currentDocument": { "exists": true }
            }),
        )
        .await
    }

    async fn delete_entry(&self, id: &str) -> Result<()> {
        let url = format!("{}/{}", self.documents_url(), self.document_path(id));
        let response = self
            .request(Method::DELETE, &url)
            .query(&[("currentDocument.exists", "true")])
            .send()
            .await?;
        Self::check_status(response)
            .await
            .map(|_| ())
            .map_err(|e| not_found(e, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Access, EntryStatus};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOCS: &str = "/projects/demo/databases/(default)/documents";

    fn client(server: &MockServer) -> FirestoreClient {
        FirestoreClient::new(FirestoreConfig {
            base_url: server.uri(),
            project_id: "demo".to_string(),
            api_key: "test-key".to_string(),
            id_token: None,
            collection: "drops".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn stored(id: &str, status: &str, hearts: &str) -> Value {
        json!({
            "document": {
                "name": format!("projects/demo/databases/(default)/documents/artifacts/demo/public/data/drops/{}", id),
                "fields": {
                    "title": { "stringValue": format!("Entry {}", id) },
                    "status": { "stringValue": status },
                    "hearts": { "integerValue": hearts },
                    "day": { "integerValue": "2" },
                    "timestamp": { "timestampValue": "2025-10-14T10:00:00Z" }
                }
            },
            "readTime": "2025-10-14T12:00:00Z"
        })
    }

    #[test]
    fn test_requires_project_id() {
        let result = FirestoreClient::new(FirestoreConfig::from(&StoreSettings::default()));
        assert!(matches!(result, Err(FeedError::Config(_))));
    }

    #[tokio::test]
    async fn test_fetch_published_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/artifacts/demo/public/data:runQuery", DOCS)))
            .and(query_param("key", "test-key"))
            .and(body_json(json!({
                "structuredQuery": {
                    "from": [{ "collectionId": "drops" }],
                    "orderBy": [{ "field": { "fieldPath": "timestamp" }, "direction": "DESCENDING" }],
                    "where": {
                        "fieldFilter": {
                            "field": { "fieldPath": "status" },
                            "op": "EQUAL",
                            "value": { "stringValue": "published" }
                        }
                    }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                stored("a", "published", "3"),
                { "document": { "name": "" }, "readTime": "2025-10-14T12:00:00Z" },
                stored("b", "published", "0")
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let entries = client(&server)
            .fetch_snapshot(SnapshotScope::Published)
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "a");
        assert_eq!(entries[0].hearts, 3);
        assert_eq!(entries[0].day, Some(2));
        assert_eq!(entries[1].id, "b");
    }

    #[tokio::test]
    async fn test_empty_collection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/artifacts/demo/public/data:runQuery", DOCS)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{ "readTime": "2025-10-14T12:00:00Z" }])),
            )
            .mount(&server)
            .await;

        let entries = client(&server).fetch_snapshot(SnapshotScope::All).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_permission_error_surfaces_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/artifacts/demo/public/data:runQuery", DOCS)))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": 403,
                    "message": "Missing or insufficient permissions.",
                    "status": "PERMISSION_DENIED"
                }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_snapshot(SnapshotScope::Published)
            .await
            .unwrap_err();
        match err {
            FeedError::Store { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Missing or insufficient permissions.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_increment_heart_commits_transform() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:commit", DOCS)))
            .and(body_json(json!({
                "writes": [{
                    "transform": {
                        "document": "projects/demo/databases/(default)/documents/artifacts/demo/public/data/drops/a",
                        "fieldTransforms": [
                            { "fieldPath": "hearts", "increment": { "integerValue": "1" } }
                        ]
                    },
                    "currentDocument": { "exists": true }
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "writeResults": [{}],
                "commitTime": "2025-10-14T12:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).increment_heart("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_increment_missing_document_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:commit", DOCS)))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": 404, "message": "No document to update", "status": "NOT_FOUND" }
            })))
            .mount(&server)
            .await;

        let err = client(&server).increment_heart("gone").await.unwrap_err();
        assert!(matches!(err, FeedError::NotFound(id) if id == "gone"));
    }

    #[tokio::test]
    async fn test_create_entry_returns_generated_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:commit", DOCS)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "writeResults": [{}] })))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server)
            .create_entry(EntryFields {
                title: "Day one".to_string(),
                description: "Kickoff".to_string(),
                link: "https://example.com".to_string(),
                content_type: "Essay".to_string(),
                access: Access::Free,
                status: EntryStatus::Published,
                hearts: 0,
                day: 1,
                image_url: None,
                scheduled_for: None,
            })
            .await
            .unwrap();

        assert_eq!(id.len(), 32);

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let write = &body["writes"][0];
        assert!(write["update"]["name"].as_str().unwrap().ends_with(&id));
        assert_eq!(write["currentDocument"]["exists"], json!(false));
        assert_eq!(write["update"]["fields"]["title"]["stringValue"], "Day one");
    }

    #[tokio::test]
    async fn test_update_sends_mask() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:commit", DOCS)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "writeResults": [{}] })))
            .mount(&server)
            .await;

        client(&server)
            .update_entry(
                "a",
                EntryPatch {
                    title: Some("Edited".to_string()),
                    description: Some("New body".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(
            body["writes"][0]["updateMask"]["fieldPaths"],
            json!(["title", "description"])
        );
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("{}/artifacts/demo/public/data/drops/a", DOCS)))
            .and(query_param("currentDocument.exists", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).delete_entry("a").await.unwrap();
    }
}
