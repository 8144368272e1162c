//! sui-rpc-client: read access to a Sui fullnode over JSON-RPC
//!
//! The protocol readers only need three calls: fetch one object, page
//! through an object's dynamic fields, and page through an address's owned
//! objects. They are expressed as the [`ReadApi`] trait so readers can be
//! driven by the real [`RpcClient`] or by an in-memory fake in tests.

pub mod de;
pub mod queries;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use yume_core::{RpcConfig, RpcError};

pub use queries::{collect_dynamic_fields, collect_owned_objects};

/// Result type for fullnode operations
pub type Result<T> = std::result::Result<T, RpcError>;

/// A decoded Move object as returned with `showContent`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiObject {
    pub object_id: String,
    /// Full Move struct type, e.g. `0x..::position::LoanPosition`
    pub object_type: Option<String>,
    pub owner: Option<Value>,
    /// The `content.fields` map (Null when content was not returned)
    pub fields: Value,
}

impl SuiObject {
    /// Field lookup on the top-level struct fields
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Key of a dynamic field entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicFieldName {
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub value: Value,
}

/// One entry from `suix_getDynamicFields`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicFieldInfo {
    #[serde(default)]
    pub name: DynamicFieldName,
    pub object_id: String,
    #[serde(default)]
    pub object_type: String,
}

/// A page of dynamic field entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicFieldPage {
    #[serde(default)]
    pub data: Vec<DynamicFieldInfo>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_next_page: bool,
}

/// A page of owned objects
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectPage {
    pub data: Vec<SuiObject>,
    pub next_cursor: Option<String>,
    pub has_next_page: bool,
}

/// Read surface consumed by the protocol readers
#[async_trait]
pub trait ReadApi: Send + Sync {
    /// Fetch one object with its content. `Ok(None)` when it does not exist.
    async fn get_object(&self, object_id: &str) -> Result<Option<SuiObject>>;

    /// One page of a parent object's dynamic fields
    async fn get_dynamic_fields(
        &self,
        parent_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<DynamicFieldPage>;

    /// One page of objects owned by `owner` whose type matches `struct_type`
    async fn get_owned_objects(
        &self,
        owner: &str,
        struct_type: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ObjectPage>;
}

#[async_trait]
impl<T: ReadApi + ?Sized> ReadApi for Arc<T> {
    async fn get_object(&self, object_id: &str) -> Result<Option<SuiObject>> {
        (**self).get_object(object_id).await
    }

    async fn get_dynamic_fields(
        &self,
        parent_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<DynamicFieldPage> {
        (**self).get_dynamic_fields(parent_id, cursor, limit).await
    }

    async fn get_owned_objects(
        &self,
        owner: &str,
        struct_type: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ObjectPage> {
        (**self)
            .get_owned_objects(owner, struct_type, cursor, limit)
            .await
    }
}

/// JSON-RPC client for a Sui fullnode
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    config: RpcConfig,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    pub fn new(config: RpcConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("yume")
            .build()
            .map_err(|e| RpcError::Unreachable {
                url: format!("{}: {}", config.url, e),
            })?;

        Ok(Self {
            http,
            config,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Issue one JSON-RPC call and decode its `result`.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let timeout = Duration::from_secs(self.config.request_timeout_secs);
        let envelope: RpcEnvelope = timed_request(timeout, async {
            let response = self
                .http
                .post(&self.config.url)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_connect() {
                        RpcError::Unreachable {
                            url: self.config.url.clone(),
                        }
                    } else {
                        RpcError::ApiError {
                            message: e.to_string(),
                        }
                    }
                })?;
            response
                .json::<RpcEnvelope>()
                .await
                .map_err(|e| RpcError::ParseError(e.to_string()))
        })
        .await?;

        if let Some(err) = envelope.error {
            tracing::debug!(method, code = err.code, message = %err.message, "RPC call rejected");
            return Err(RpcError::ApiError {
                message: err.message,
            });
        }

        let result = envelope.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| RpcError::ParseError(format!("{method}: {e}")))
    }

    /// Chain identifier of the connected network
    pub async fn chain_identifier(&self) -> Result<String> {
        self.call("sui_getChainIdentifier", json!([])).await
    }
}

#[async_trait]
impl ReadApi for RpcClient {
    async fn get_object(&self, object_id: &str) -> Result<Option<SuiObject>> {
        let response: RawObjectResponse = self
            .call(
                "sui_getObject",
                json!([object_id, { "showContent": true, "showType": true, "showOwner": true }]),
            )
            .await?;
        Ok(response.into_object())
    }

    async fn get_dynamic_fields(
        &self,
        parent_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<DynamicFieldPage> {
        self.call("suix_getDynamicFields", json!([parent_id, cursor, limit]))
            .await
    }

    async fn get_owned_objects(
        &self,
        owner: &str,
        struct_type: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ObjectPage> {
        let query = json!({
            "filter": { "StructType": struct_type },
            "options": { "showContent": true, "showType": true, "showOwner": true },
        });
        let page: RawOwnedPage = self
            .call("suix_getOwnedObjects", json!([owner, query, cursor, limit]))
            .await?;

        Ok(ObjectPage {
            data: page
                .data
                .into_iter()
                .filter_map(RawObjectResponse::into_object)
                .collect(),
            next_cursor: page.next_cursor,
            has_next_page: page.has_next_page,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// `SuiObjectResponse`: either `data` or an `error` such as `notExists`
#[derive(Debug, Deserialize)]
struct RawObjectResponse {
    #[serde(default)]
    data: Option<RawObjectData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawObjectData {
    object_id: String,
    #[serde(rename = "type", default)]
    object_type: Option<String>,
    #[serde(default)]
    owner: Option<Value>,
    #[serde(default)]
    content: Option<RawContent>,
}

#[derive(Debug, Deserialize)]
struct RawContent {
    #[serde(rename = "type", default)]
    type_name: Option<String>,
    #[serde(default)]
    fields: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOwnedPage {
    #[serde(default)]
    data: Vec<RawObjectResponse>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_next_page: bool,
}

impl RawObjectResponse {
    fn into_object(self) -> Option<SuiObject> {
        let data = self.data?;
        let (content_type, fields) = match data.content {
            Some(content) => (content.type_name, content.fields),
            None => (None, Value::Null),
        };
        Some(SuiObject {
            object_id: data.object_id,
            object_type: data.object_type.or(content_type),
            owner: data.owner,
            fields,
        })
    }
}

/// Bound a request future by the configured timeout.
async fn timed_request<T>(
    timeout: Duration,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| RpcError::Timeout {
            secs: timeout.as_secs(),
        })?
}
