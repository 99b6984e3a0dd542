use serde_json::Value;
use tracing::debug;

use crate::{
    config::ClusterConfig,
    document::TokenDocument,
    error::{Result, TokenError},
    merge::{self, ResolvedIntent},
    store::{Etag, StoreClient, WriteMode},
};

/// Create: wholesale replacement with no precondition. An existing document
/// with the same name is silently upserted; racing creators are reconciled by
/// the store, not here.
pub async fn create(
    client: &StoreClient,
    cluster: &ClusterConfig,
    intent: &ResolvedIntent,
    admin: bool,
) -> Result<Value> {
    let payload = merge::apply_to_base(TokenDocument::new(), intent);
    client
        .post_token(
            cluster,
            &intent.token,
            &payload,
            None,
            WriteMode::Create,
            admin,
        )
        .await
}

/// Update: read the current document, patch only the resolved fields over it,
/// and write back under the ETag observed by the read. A concurrent editor
/// between the read and the write turns into a stale-token error; the caller
/// decides whether to retry.
pub async fn update(
    client: &StoreClient,
    cluster: &ClusterConfig,
    intent: &ResolvedIntent,
    admin: bool,
) -> Result<Value> {
    let (base, etag) = match client.get_token(cluster, &intent.token).await? {
        Some((document, etag)) => (document, Some(etag)),
        None => (TokenDocument::new(), None),
    };
    debug!(
        cluster = %cluster.name,
        token = %intent.token,
        guarded = etag.is_some(),
        "updating token"
    );
    let payload = merge::apply_to_base(base, intent);
    client
        .post_token(
            cluster,
            &intent.token,
            &payload,
            etag.as_ref(),
            WriteMode::Update,
            admin,
        )
        .await
}

/// What a guarded delete found before it was allowed to proceed.
#[derive(Debug)]
pub struct DeletePlan {
    pub document: TokenDocument,
    pub etag: Etag,
}

/// Delete: read, refuse while any active service still references the token,
/// then delete under the observed ETag. Returns the plan so the caller can
/// report what was deleted.
pub async fn delete(
    client: &StoreClient,
    cluster: &ClusterConfig,
    token: &str,
) -> Result<DeletePlan> {
    let Some((document, etag)) = client.get_token(cluster, token).await? else {
        return Err(TokenError::NotFound);
    };

    let service_ids = client.services_for_token(cluster, token).await?;
    if !service_ids.is_empty() {
        return Err(TokenError::InUse {
            token: token.to_string(),
            service_ids,
        });
    }

    client.delete_token(cluster, token, &etag).await?;
    Ok(DeletePlan { document, etag })
}
