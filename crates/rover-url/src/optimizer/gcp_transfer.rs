//! Managed S3-to-GCS copies through the Storage Transfer Service
//!
//! The service imposes real preconditions: the key inside the source
//! bucket must equal the blob prefix inside the sink bucket, the copy
//! must be big enough to amortize the service's spin-up time, and the
//! AWS credentials must be long-lived ones (no session token). Every
//! precondition failure and every HTTP failure reads as "no optimized
//! copy happened" so the caller can fall back to byte streaming.

use crate::base::DirectoryUrl;
use crate::gcs::GcsDirectoryUrl;
use crate::s3::S3DirectoryUrl;
use chrono::Datelike;
use rover_common::{Redactor, TransferConfig};
use serde_json::json;
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "https://storagetransfer.googleapis.com";

const JOB_DESCRIPTION: &str = "rover one-time job";

pub struct GcpDataTransferService {
    http: reqwest::Client,
    base_url: String,
    config: TransferConfig,
}

impl GcpDataTransferService {
    pub fn new(config: TransferConfig) -> Self {
        GcpDataTransferService {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            config,
        }
    }

    /// Point the driver at a different API endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Copy an S3 directory into a GCS directory with a managed transfer
    /// job. `true` when the job ran to completion; `false` when a
    /// precondition or the service itself ruled the strategy out.
    pub async fn copy(&self, source: &S3DirectoryUrl, dest: &GcsDirectoryUrl) -> bool {
        if source.key() != dest.blob() {
            warn!(
                source = source.url(),
                dest = dest.url(),
                "Source key does not match destination blob; the transfer service \
                 cannot vary the destination path. Falling back to a slower copy"
            );
            return false;
        }

        let directory_size = match DirectoryUrl::size(source).await {
            Ok(size) => size,
            Err(e) => {
                warn!(source = source.url(), error = %e, "Could not size the source directory");
                return false;
            },
        };
        if directory_size < self.config.min_bytes_to_use {
            info!(
                directory_size,
                threshold = self.config.min_bytes_to_use,
                "Directory is below the transfer service threshold; skipping it"
            );
            return false;
        }

        let Some(aws_creds) = source.aws_creds() else {
            warn!(
                source = source.url(),
                "No AWS credentials available; falling back to a slower copy"
            );
            return false;
        };
        if aws_creds.session_token().is_some() {
            warn!(
                source = source.url(),
                "AWS credentials carry a session token, which the transfer service \
                 does not accept. Falling back to a slower copy"
            );
            return false;
        }

        let gcp = dest.gcp_credentials();
        let today = chrono::Utc::now().date_naive();
        let schedule_date = json!({
            "day": today.day(),
            "month": today.month(),
            "year": today.year(),
        });
        let transfer_job = json!({
            "description": JOB_DESCRIPTION,
            "status": "ENABLED",
            "projectId": gcp.project_id,
            "schedule": {
                "scheduleStartDate": schedule_date,
                "scheduleEndDate": schedule_date,
            },
            "transferSpec": {
                "awsS3DataSource": {
                    "bucketName": source.bucket(),
                    "awsAccessKey": {
                        "accessKeyId": aws_creds.access_key_id(),
                        "secretAccessKey": aws_creds.secret_access_key(),
                    },
                },
                "objectConditions": {
                    "includePrefixes": [source.key()],
                },
                "transferOptions": {
                    "overwriteObjectsAlreadyExistingInSink": false,
                    "deleteObjectsUniqueInSink": false,
                    "deleteObjectsFromSourceAfterTransfer": false,
                },
                "gcsDataSink": {
                    "bucketName": dest.bucket(),
                },
            },
        });
        let redactor = Redactor::default().with_secret(aws_creds.secret_access_key());
        debug!(
            job = %redactor.redact(&transfer_job.to_string()),
            "Submitting transfer job"
        );

        let response = self
            .http
            .post(format!("{}/v1/transferJobs", self.base_url))
            .bearer_auth(&gcp.access_token)
            .json(&transfer_job)
            .send()
            .await;
        let created: serde_json::Value = match response {
            Ok(r) if r.status().is_success() => match r.json().await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "Unreadable transfer job response; falling back");
                    return false;
                },
            },
            Ok(r) => {
                warn!(
                    status = %r.status(),
                    "The transfer service rejected the job; falling back to a slower copy"
                );
                return false;
            },
            Err(e) => {
                warn!(error = %e, "Could not reach the transfer service; falling back");
                return false;
            },
        };
        let Some(job_name) = created.get("name").and_then(|n| n.as_str()) else {
            warn!("Transfer job response carried no name; falling back");
            return false;
        };
        info!(job = job_name, "Transfer job submitted");

        self.wait_for_transfer_job(&gcp.project_id, job_name, &gcp.access_token)
            .await
    }

    /// Poll the operations list until the job leaves `IN_PROGRESS`, the
    /// poll budget runs out, or the service errors.
    async fn wait_for_transfer_job(
        &self,
        project_id: &str,
        job_name: &str,
        access_token: &str,
    ) -> bool {
        let filter = json!({
            "project_id": project_id,
            "job_names": [job_name],
        })
        .to_string();

        info!("Awaiting completion of the transfer job");
        for _ in 0..self.config.max_polls {
            let response = self
                .http
                .get(format!("{}/v1/transferOperations", self.base_url))
                .query(&[("filter", filter.as_str())])
                .bearer_auth(access_token)
                .send()
                .await;
            let operations: serde_json::Value = match response {
                Ok(r) if r.status().is_success() => match r.json().await {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, "Unreadable operations listing; falling back");
                        return false;
                    },
                },
                Ok(r) => {
                    warn!(status = %r.status(), "Could not list transfer operations; falling back");
                    return false;
                },
                Err(e) => {
                    warn!(error = %e, "Could not reach the transfer service; falling back");
                    return false;
                },
            };
            debug!(operations = %operations, "Polled transfer operations");

            // An empty listing means the job has not materialized an
            // operation yet; keep polling.
            let status = operations
                .get("operations")
                .and_then(|ops| ops.get(0))
                .and_then(|op| op.pointer("/metadata/status"))
                .and_then(|s| s.as_str());
            if let Some(status) = status {
                if status != "IN_PROGRESS" {
                    info!(status, "Transfer job complete");
                    return true;
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
        warn!(
            max_polls = self.config.max_polls,
            "Transfer job did not complete within the poll budget; falling back"
        );
        false
    }
}
