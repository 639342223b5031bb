// HTTP access to the remote record store.
use crate::error::{AppError, Result};
use crate::types::{InsertResult, ProductionRecord};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, error};

/// Message shown to the user whenever a write fails, whatever the cause.
pub const INSERT_FAILED_MESSAGE: &str = "No se pudo registrar la producción.";

/// Read-all / write-one access to the store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<ProductionRecord>>;

    async fn insert(&self, record: &ProductionRecord) -> Result<()>;

    /// Write one record, folding every failure into the result.
    async fn insert_one(&self, record: &ProductionRecord) -> InsertResult {
        match self.insert(record).await {
            Ok(()) => InsertResult::ok(),
            Err(e) => {
                error!("failed to register production record: {}", e);
                InsertResult::failed(INSERT_FAILED_MESSAGE)
            }
        }
    }
}

/// PostgREST-style table endpoint authenticated with a static key.
pub struct RestGateway {
    client: Client,
    url: String,
    api_key: String,
}

impl RestGateway {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }
}

#[async_trait]
impl RecordStore for RestGateway {
    async fn fetch_all(&self) -> Result<Vec<ProductionRecord>> {
        let response = self.authorized(self.client.get(&self.url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Transport(format!(
                "error fetching records: status {}",
                status
            )));
        }
        let records: Vec<ProductionRecord> = response
            .json()
            .await
            .map_err(|e| AppError::Transport(format!("unreadable record list: {}", e)))?;
        debug!("fetched {} records from store", records.len());
        Ok(records)
    }

    async fn insert(&self, record: &ProductionRecord) -> Result<()> {
        let response = self
            .authorized(self.client.post(&self.url))
            .json(record)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Transport(format!(
                "error registering record: status {}",
                status
            )));
        }
        Ok(())
    }
}
