use std::{fmt, time::Duration};

use reqwest::{Client, Response, StatusCode, header::IF_MATCH};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    config::ClusterConfig,
    document::TokenDocument,
    error::{Result, TokenError},
};

const USER_AGENT: &str = concat!("tokenctl/", env!("CARGO_PKG_VERSION"));

/// Opaque version marker for optimistic concurrency control. Returned with
/// every read, echoed back as an `If-Match` precondition on writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Etag(pub String);

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Wholesale replacement; an existing document with the same name is
    /// silently upserted.
    Create,
    Update,
}

#[derive(Debug, Deserialize)]
struct ServiceRef {
    #[serde(rename = "service-id")]
    service_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Thin client over the store's token endpoints. All transport failures are
/// tagged with the cluster they occurred on so the dispatcher can isolate
/// them.
#[derive(Clone)]
pub struct StoreClient {
    http: Client,
}

impl StoreClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|err| TokenError::Config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { http })
    }

    /// `GET /token` — the current document and its entity tag, or `None` when
    /// the cluster does not know the token.
    pub async fn get_token(
        &self,
        cluster: &ClusterConfig,
        name: &str,
    ) -> Result<Option<(TokenDocument, Etag)>> {
        let url = endpoint(cluster, "token");
        debug!(cluster = %cluster.name, token = name, "fetching token");
        let response = self
            .http
            .get(url)
            .query(&[("token", name)])
            .send()
            .await
            .map_err(|err| transport(cluster, err))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let etag = read_etag(cluster, &response)?;
                let body: Value = response.json().await.map_err(|err| transport(cluster, err))?;
                Ok(Some((TokenDocument::from_value(body)?, etag)))
            }
            _ => Err(unexpected(cluster, response).await),
        }
    }

    /// `POST /token` — create or update, optionally guarded by `If-Match`.
    /// A precondition mismatch surfaces as a stale-token error and is never
    /// retried here.
    pub async fn post_token(
        &self,
        cluster: &ClusterConfig,
        name: &str,
        document: &TokenDocument,
        if_match: Option<&Etag>,
        mode: WriteMode,
        admin: bool,
    ) -> Result<Value> {
        let url = endpoint(cluster, "token");
        let mut body = document.clone();
        body.insert("token", Value::String(name.to_string()));

        let mut request = self.http.post(url).json(&body);
        if let Some(etag) = if_match {
            request = request.header(IF_MATCH, etag.0.clone());
        }
        if admin {
            request = request.query(&[("update-mode", "admin")]);
        }
        debug!(
            cluster = %cluster.name,
            token = name,
            mode = ?mode,
            admin,
            guarded = if_match.is_some(),
            "posting token"
        );

        let response = request.send().await.map_err(|err| transport(cluster, err))?;
        match response.status() {
            StatusCode::PRECONDITION_FAILED => Err(TokenError::StaleToken {
                cluster: cluster.name.clone(),
            }),
            StatusCode::BAD_REQUEST => Err(validation(cluster, response).await),
            status if status.is_success() => {
                response.json().await.map_err(|err| transport(cluster, err))
            }
            _ => Err(unexpected(cluster, response).await),
        }
    }

    /// `DELETE /token` with an `If-Match` precondition.
    pub async fn delete_token(
        &self,
        cluster: &ClusterConfig,
        name: &str,
        if_match: &Etag,
    ) -> Result<()> {
        let url = endpoint(cluster, "token");
        debug!(cluster = %cluster.name, token = name, "deleting token");
        let response = self
            .http
            .delete(url)
            .query(&[("token", name)])
            .header(IF_MATCH, if_match.0.clone())
            .send()
            .await
            .map_err(|err| transport(cluster, err))?;

        match response.status() {
            StatusCode::PRECONDITION_FAILED => Err(TokenError::StaleToken {
                cluster: cluster.name.clone(),
            }),
            StatusCode::NOT_FOUND => Err(TokenError::NotFound),
            status if status.is_success() => Ok(()),
            _ => Err(unexpected(cluster, response).await),
        }
    }

    /// `GET /services` — ids of every active service instance referencing the
    /// token on this cluster.
    pub async fn services_for_token(
        &self,
        cluster: &ClusterConfig,
        name: &str,
    ) -> Result<Vec<String>> {
        let url = endpoint(cluster, "services");
        let response = self
            .http
            .get(url)
            .query(&[("token", name)])
            .send()
            .await
            .map_err(|err| transport(cluster, err))?;

        if !response.status().is_success() {
            return Err(unexpected(cluster, response).await);
        }
        let refs: Vec<ServiceRef> = response.json().await.map_err(|err| transport(cluster, err))?;
        Ok(refs.into_iter().map(|entry| entry.service_id).collect())
    }

    /// `GET /tokens` — the cluster's token listing, passed through verbatim.
    pub async fn list_tokens(&self, cluster: &ClusterConfig) -> Result<Vec<Value>> {
        let url = endpoint(cluster, "tokens");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| transport(cluster, err))?;

        if !response.status().is_success() {
            return Err(unexpected(cluster, response).await);
        }
        response.json().await.map_err(|err| transport(cluster, err))
    }
}

fn endpoint(cluster: &ClusterConfig, path: &str) -> String {
    format!("{}/{}", cluster.url.trim_end_matches('/'), path)
}

fn transport(cluster: &ClusterConfig, err: reqwest::Error) -> TokenError {
    TokenError::Transport {
        cluster: cluster.name.clone(),
        cause: err.to_string(),
    }
}

fn read_etag(cluster: &ClusterConfig, response: &Response) -> Result<Etag> {
    response
        .headers()
        .get(reqwest::header::ETAG)
        .and_then(|value| value.to_str().ok())
        .map(|value| Etag(value.to_string()))
        .ok_or_else(|| TokenError::UnexpectedResponse {
            cluster: cluster.name.clone(),
            status: 200,
            body: "token response carried no ETag header".into(),
        })
}

/// Store-reported validation messages are passed through verbatim, every
/// sentence kept.
async fn validation(cluster: &ClusterConfig, response: Response) -> TokenError {
    match response.json::<ErrorBody>().await {
        Ok(body) if !body.errors.is_empty() => TokenError::Validation {
            messages: body.errors,
        },
        Ok(_) => TokenError::Validation {
            messages: vec!["the store rejected the token description".into()],
        },
        Err(err) => transport(cluster, err),
    }
}

async fn unexpected(cluster: &ClusterConfig, response: Response) -> TokenError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    TokenError::UnexpectedResponse {
        cluster: cluster.name.clone(),
        status,
        body,
    }
}
