//! Transcript record repository.

use std::time::Instant;

use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client;
use tracing::info;

use hark_models::ExportStatusSet;

use crate::error::{RecordsError, RecordsResult};
use crate::item::{statuses_to_attribute, TranscriptRecord};
use crate::metrics::record_request;

/// Configuration for the record store.
#[derive(Debug, Clone)]
pub struct RecordsConfig {
    /// Table holding one item per completed transcription
    pub table_name: String,
    /// Endpoint override (localstack)
    pub endpoint_url: Option<String>,
}

impl RecordsConfig {
    /// Create config from environment variables.
    pub fn from_env() -> RecordsResult<Self> {
        Ok(Self {
            table_name: std::env::var("RECORDS_TABLE")
                .map_err(|_| RecordsError::config_error("RECORDS_TABLE not set"))?,
            endpoint_url: std::env::var("RECORDS_ENDPOINT_URL").ok(),
        })
    }
}

/// Repository for transcript records.
#[derive(Clone)]
pub struct TranscriptStore {
    client: Client,
    table: String,
}

impl TranscriptStore {
    /// Create a new record store from configuration.
    pub async fn new(config: RecordsConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        Self {
            client: Client::new(&sdk_config),
            table: config.table_name,
        }
    }

    /// Create from environment variables.
    pub async fn from_env() -> RecordsResult<Self> {
        Ok(Self::new(RecordsConfig::from_env()?).await)
    }

    /// Create from an existing DynamoDB client.
    pub fn with_client(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    /// Write a completed transcript record.
    pub async fn put_record(&self, record: &TranscriptRecord) -> RecordsResult<()> {
        let started = Instant::now();

        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(record.to_attributes()))
            .send()
            .await;

        finish("put_record", started, &result);
        result.map_err(|e| RecordsError::PutFailed(e.to_string()))?;

        info!("Saved transcript record {}", record.id);
        Ok(())
    }

    /// Fetch a transcript record by job id.
    pub async fn get_record(&self, id: &str) -> RecordsResult<Option<TranscriptRecord>> {
        let started = Instant::now();

        let result = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("id", aws_sdk_dynamodb::types::AttributeValue::S(id.to_string()))
            .send()
            .await;

        finish("get_record", started, &result);
        let response = result.map_err(|e| RecordsError::GetFailed(e.to_string()))?;

        match response.item() {
            Some(item) => Ok(Some(TranscriptRecord::from_attributes(item)?)),
            None => Ok(None),
        }
    }

    /// Persist the export status array for a record.
    pub async fn set_export_statuses(
        &self,
        id: &str,
        statuses: &ExportStatusSet,
    ) -> RecordsResult<()> {
        let started = Instant::now();

        let result = self
            .client
            .update_item()
            .table_name(&self.table)
            .key("id", aws_sdk_dynamodb::types::AttributeValue::S(id.to_string()))
            .update_expression("SET exportStatuses = :statuses")
            .expression_attribute_values(":statuses", statuses_to_attribute(statuses))
            .send()
            .await;

        finish("set_export_statuses", started, &result);
        result.map_err(|e| RecordsError::UpdateFailed(e.to_string()))?;

        info!("Updated export statuses for record {}", id);
        Ok(())
    }
}

fn finish<T, E>(operation: &str, started: Instant, result: &Result<T, E>) {
    let outcome = if result.is_ok() { "ok" } else { "error" };
    record_request(operation, outcome, started.elapsed().as_secs_f64() * 1000.0);
}
