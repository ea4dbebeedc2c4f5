//! Host scale-in protection.
//!
//! A worker that is mid-job must not be picked by the auto-scaling
//! group for scale-in. The guard flips the instance's
//! ProtectedFromScaleIn flag around every poll attempt; with no group
//! configured it is a no-op for local runs.

use aws_sdk_autoscaling::Client;
use tracing::{info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::preemption::fetch_imds_token;

/// Scoped scale-in protection guard.
pub struct ScaleInProtection {
    inner: Option<Protected>,
}

struct Protected {
    client: Client,
    group: String,
    instance_id: String,
}

impl ScaleInProtection {
    /// Create the guard, discovering this host's instance id from the
    /// metadata service when a group is configured.
    pub async fn new(
        group: Option<String>,
        imds_base_url: &str,
        http: &reqwest::Client,
    ) -> WorkerResult<Self> {
        let Some(group) = group else {
            info!("Scale-in protection disabled; no auto-scaling group configured");
            return Ok(Self { inner: None });
        };

        let instance_id = discover_instance_id(http, imds_base_url).await?;
        info!(
            "Scale-in protection active for instance {} in group {}",
            instance_id, group
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        let client = Client::new(&sdk_config);

        Ok(Self {
            inner: Some(Protected {
                client,
                group,
                instance_id,
            }),
        })
    }

    /// Mark this instance protected. Must succeed before a poll; a
    /// terminable host must not take on work.
    pub async fn acquire(&self) -> WorkerResult<()> {
        let Some(p) = &self.inner else {
            return Ok(());
        };
        set_protection(p, true).await
    }

    /// Clear the protection flag. Failures are logged only; the next
    /// acquire sets the flag again regardless.
    pub async fn release(&self) {
        let Some(p) = &self.inner else {
            return;
        };
        if let Err(e) = set_protection(p, false).await {
            warn!("Failed to clear scale-in protection: {}", e);
        }
    }
}

async fn set_protection(p: &Protected, value: bool) -> WorkerResult<()> {
    p.client
        .set_instance_protection()
        .instance_ids(p.instance_id.clone())
        .auto_scaling_group_name(p.group.clone())
        .protected_from_scale_in(value)
        .send()
        .await
        .map_err(|e| WorkerError::protection_failed(e.to_string()))?;
    Ok(())
}

/// Discover this host's instance id from the metadata service.
pub async fn discover_instance_id(
    client: &reqwest::Client,
    base_url: &str,
) -> WorkerResult<String> {
    let token = fetch_imds_token(client, base_url).await?;
    let response = client
        .get(format!("{}/latest/meta-data/instance-id", base_url))
        .header("X-aws-ec2-metadata-token", token)
        .send()
        .await
        .map_err(|e| WorkerError::metadata_failed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(WorkerError::metadata_failed(format!(
            "instance-id request returned {}",
            response.status()
        )));
    }

    response
        .text()
        .await
        .map_err(|e| WorkerError::metadata_failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_guard_is_noop_without_group() {
        let client = reqwest::Client::new();
        let guard = ScaleInProtection::new(None, "http://unused.invalid", &client)
            .await
            .unwrap();
        guard.acquire().await.unwrap();
        guard.release().await;
    }

    #[tokio::test]
    async fn test_discover_instance_id() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/latest/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("tok-abc"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/latest/meta-data/instance-id"))
            .and(header("X-aws-ec2-metadata-token", "tok-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("i-0abc123def"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let id = discover_instance_id(&client, &server.uri()).await.unwrap();
        assert_eq!(id, "i-0abc123def");
    }

    #[tokio::test]
    async fn test_discover_instance_id_surfaces_metadata_errors() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/latest/api/token"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let result = discover_instance_id(&client, &server.uri()).await;
        assert!(matches!(result, Err(WorkerError::MetadataFailed(_))));
    }
}
