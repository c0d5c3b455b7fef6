//! `rover copy` - copy a directory of files between stores

use anyhow::Result;
use rover_common::TransferConfig;
use rover_url::{
    CopyOptimizer, DirectoryUrl, GcpCredentials, GcpDataTransferService, GcsClient, S3Context,
    UrlResolver,
};
use tracing::info;

pub async fn run(source: &str, dest: &str) -> Result<()> {
    let resolver = resolver_from_env().await;
    let source_loc = resolver.directory_url(source)?;
    let dest_loc = resolver.directory_url(dest)?;

    let optimizer = CopyOptimizer::new(GcpDataTransferService::new(TransferConfig::from_env()?));
    if optimizer.copy(&*source_loc, &*dest_loc).await {
        info!(from = source, to = dest, "Copied via an optimized strategy");
    } else {
        info!(from = source, to = dest, "Copying by streaming bytes");
        source_loc.copy_to(&*dest_loc).await?;
    }
    println!("Copied {source} to {dest}");
    Ok(())
}

/// Build a resolver from ambient credentials. S3 always resolves (the
/// SDK finds its own credentials); Cloud Storage needs
/// `GCP_ACCESS_TOKEN` and `GCP_PROJECT_ID`.
async fn resolver_from_env() -> UrlResolver {
    let mut resolver = UrlResolver::new().with_s3(S3Context::from_env().await);
    if let (Ok(access_token), Ok(project_id)) = (
        std::env::var("GCP_ACCESS_TOKEN"),
        std::env::var("GCP_PROJECT_ID"),
    ) {
        resolver = resolver.with_gcs(GcsClient::new(GcpCredentials {
            access_token,
            project_id,
        }));
    }
    resolver
}
