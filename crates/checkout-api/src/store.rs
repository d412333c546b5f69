//! # Document Store
//!
//! Order persistence over a REST document database (Appwrite-compatible
//! layout):
//!
//! ```text
//! {endpoint}/databases/{database}/collections/{collection}/documents[/{id}]
//! ```
//!
//! Each order is one document whose id is the order id.

use async_trait::async_trait;
use checkout_core::{CheckoutError, CheckoutResult, OrderStatus, OrderStore, PersistedOrder};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::env;
use tracing::{debug, error, info, instrument};

/// Connection settings for the document store
#[derive(Debug, Clone)]
pub struct DocumentStoreConfig {
    /// Base URL, e.g. `https://cloud.appwrite.io/v1`
    pub endpoint: String,
    pub project: String,
    pub api_key: String,
    pub database: String,
    pub collection: String,
}

impl DocumentStoreConfig {
    /// Load from environment variables. Returns `None` when
    /// `DOCUMENT_STORE_URL` is not set.
    pub fn from_env() -> Result<Option<Self>, CheckoutError> {
        let Ok(endpoint) = env::var("DOCUMENT_STORE_URL") else {
            return Ok(None);
        };

        let required = |name: &str| {
            env::var(name).map_err(|_| CheckoutError::Configuration(format!("{} not set", name)))
        };

        Ok(Some(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project: required("DOCUMENT_STORE_PROJECT")?,
            api_key: required("DOCUMENT_STORE_API_KEY")?,
            database: required("DOCUMENT_STORE_DATABASE")?,
            collection: env::var("DOCUMENT_STORE_COLLECTION")
                .unwrap_or_else(|_| "orders".to_string()),
        }))
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.endpoint, self.database, self.collection
        )
    }
}

/// Order store backed by the REST document database
pub struct RestDocumentStore {
    config: DocumentStoreConfig,
    client: Client,
}

impl RestDocumentStore {
    pub fn new(config: DocumentStoreConfig) -> CheckoutResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| {
                CheckoutError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("X-Appwrite-Project", &self.config.project)
            .header("X-Appwrite-Key", &self.config.api_key)
    }

    fn document_url(&self, order_id: &str) -> String {
        format!("{}/{}", self.config.documents_url(), order_id)
    }

    async fn send(&self, builder: RequestBuilder) -> CheckoutResult<Response> {
        self.authorized(builder)
            .send()
            .await
            .map_err(|e| CheckoutError::Store(format!("Document store unreachable: {}", e)))
    }

    async fn body_of(response: Response) -> CheckoutResult<String> {
        response
            .text()
            .await
            .map_err(|e| CheckoutError::Store(e.to_string()))
    }

    fn store_error(status: StatusCode, body: &str) -> CheckoutError {
        error!("Document store error: status={}, body={}", status, body);
        let message = serde_json::from_str::<StoreErrorResponse>(body)
            .map(|e| e.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));
        CheckoutError::Store(message)
    }
}

#[async_trait]
impl OrderStore for RestDocumentStore {
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    async fn create(&self, order: &PersistedOrder) -> CheckoutResult<()> {
        let body = json!({
            "documentId": order.order_id,
            "data": order,
        });

        let response = self
            .send(self.client.post(self.config.documents_url()).json(&body))
            .await?;
        let status = response.status();

        if status == StatusCode::CONFLICT {
            return Err(CheckoutError::DuplicateOrder {
                order_id: order.order_id.clone(),
            });
        }
        if !status.is_success() {
            let body = Self::body_of(response).await?;
            return Err(Self::store_error(status, &body));
        }

        info!("Order document created");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, order_id: &str) -> CheckoutResult<Option<PersistedOrder>> {
        let response = self.send(self.client.get(self.document_url(order_id))).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = Self::body_of(response).await?;
        if !status.is_success() {
            return Err(Self::store_error(status, &body));
        }

        let order = serde_json::from_str(&body)
            .map_err(|e| CheckoutError::Serialization(format!("Invalid order document: {}", e)))?;
        Ok(Some(order))
    }

    #[instrument(skip(self))]
    async fn list_for_user(&self, user_id: &str) -> CheckoutResult<Vec<PersistedOrder>> {
        let query = json!({
            "method": "equal",
            "attribute": "userId",
            "values": [user_id],
        })
        .to_string();

        let response = self
            .send(
                self.client
                    .get(self.config.documents_url())
                    .query(&[("queries[]", query)]),
            )
            .await?;
        let status = response.status();
        let body = Self::body_of(response).await?;
        if !status.is_success() {
            return Err(Self::store_error(status, &body));
        }

        let list: DocumentList = serde_json::from_str(&body)
            .map_err(|e| CheckoutError::Serialization(format!("Invalid document list: {}", e)))?;
        debug!("Fetched {} of {} order(s)", list.documents.len(), list.total);

        let mut orders = list.documents;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> CheckoutResult<PersistedOrder> {
        let mut order = self
            .get(order_id)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        order.transition(status)?;

        let body = json!({
            "data": {
                "orderStatus": order.order_status,
                "lastUpdated": order.last_updated,
            }
        });
        let response = self
            .send(self.client.patch(self.document_url(order_id)).json(&body))
            .await?;
        let code = response.status();
        if !code.is_success() {
            let body = Self::body_of(response).await?;
            return Err(Self::store_error(code, &body));
        }

        info!(status = %order.order_status, "Order status updated");
        Ok(order)
    }
}

#[derive(Debug, Deserialize)]
struct DocumentList {
    #[serde(default)]
    total: u64,
    documents: Vec<PersistedOrder>,
}

#[derive(Debug, Deserialize)]
struct StoreErrorResponse {
    message: String,
}
