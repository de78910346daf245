//! Algolia REST client
//!
//! Implements the [`IndexStore`] contract over the Algolia search REST API.
//! Copy and move operations are asynchronous on the Algolia side; the client
//! waits for their tasks to be published before returning.

use crate::index::traits::{
    BrowseFilter, IndexError, IndexResult, IndexStore, Record, SaveRulesOptions,
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Environment variable holding the application ID
pub const APP_ID_ENV: &str = "APPLICATION_ID";

/// Environment variable holding the admin API key
pub const API_KEY_ENV: &str = "API_KEY";

const TASK_POLL_INTERVAL: Duration = Duration::from_millis(500);
const TASK_POLL_ATTEMPTS: u32 = 240;

/// Response of every write operation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskResponse {
    #[serde(rename = "taskID")]
    task_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TaskStatus {
    status: String,
}

#[derive(Debug, Serialize)]
struct OperationRequest<'a> {
    operation: &'a str,
    destination: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<Vec<&'a str>>,
}

#[derive(Debug, Serialize)]
struct BatchOperation<'a> {
    action: &'a str,
    body: &'a Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrowseRequest<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    filters: &'a str,
    attributes_to_retrieve: Vec<&'a str>,
    hits_per_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct BrowseResponse {
    #[serde(default)]
    hits: Vec<BrowseHit>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BrowseHit {
    #[serde(rename = "objectID")]
    object_id: String,
}

/// Algolia search API client
#[derive(Debug, Clone)]
pub struct AlgoliaClient {
    app_id: String,
    api_key: String,
    base_url: Url,
    client: Client,
    poll_interval: Duration,
}

impl AlgoliaClient {
    /// Creates a client for the application's write host
    pub fn new(app_id: &str, api_key: &str) -> IndexResult<Self> {
        let base_url = Url::parse(&format!("https://{}.algolia.net", app_id))
            .map_err(|e| IndexError::Serialization(format!("invalid app id: {}", e)))?;
        Self::with_base_url(app_id, api_key, base_url)
    }

    /// Creates a client against an explicit API host
    pub fn with_base_url(app_id: &str, api_key: &str, base_url: Url) -> IndexResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            app_id: app_id.to_string(),
            api_key: api_key.to_string(),
            base_url,
            client,
            poll_interval: TASK_POLL_INTERVAL,
        })
    }

    /// Sets how often pending tasks are polled
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Builds `/1/indexes/<index>/<path...>` with every segment escaped
    fn endpoint(&self, index: &str, path: &[&str]) -> IndexResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| IndexError::Serialization("base URL cannot have a path".to_string()))?
            .clear()
            .extend(["1", "indexes", index])
            .extend(path);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("X-Algolia-Application-Id", &self.app_id)
            .header("X-Algolia-API-Key", &self.api_key)
    }

    async fn send<T: for<'de> Deserialize<'de>>(&self, builder: RequestBuilder) -> IndexResult<T> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(IndexError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    /// Waits until a task is published
    async fn wait_task(&self, index: &str, task_id: i64) -> IndexResult<()> {
        let id = task_id.to_string();
        let url = self.endpoint(index, &["task", id.as_str()])?;
        for _ in 0..TASK_POLL_ATTEMPTS {
            let status: TaskStatus = self.send(self.request(Method::GET, url.clone())).await?;
            if status.status == "published" {
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(IndexError::TaskTimeout(task_id))
    }

    async fn operation(
        &self,
        src: &str,
        dst: &str,
        operation: &str,
        scope: Option<Vec<&str>>,
    ) -> IndexResult<()> {
        let body = OperationRequest {
            operation,
            destination: dst,
            scope,
        };
        let url = self.endpoint(src, &["operation"])?;
        let task: TaskResponse = self.send(self.request(Method::POST, url).json(&body)).await?;
        debug!(src, dst, operation, task_id = ?task.task_id, "Index operation queued");

        if let Some(task_id) = task.task_id {
            self.wait_task(src, task_id).await?;
        }
        Ok(())
    }

    async fn batch(&self, index: &str, operations: Vec<BatchOperation<'_>>) -> IndexResult<()> {
        if operations.is_empty() {
            return Ok(());
        }
        let url = self.endpoint(index, &["batch"])?;
        let _: TaskResponse = self
            .send(
                self.request(Method::POST, url)
                    .json(&json!({ "requests": operations })),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl IndexStore for AlgoliaClient {
    async fn create_index(&self, name: &str) -> IndexResult<()> {
        // Algolia creates indexes on first write; an empty settings update is one.
        self.set_settings(name, &json!({})).await
    }

    async fn copy_index(&self, src: &str, dst: &str) -> IndexResult<()> {
        self.operation(src, dst, "copy", None).await
    }

    async fn copy_rules(&self, src: &str, dst: &str) -> IndexResult<()> {
        self.operation(src, dst, "copy", Some(vec!["rules"])).await
    }

    async fn set_settings(&self, index: &str, settings: &Value) -> IndexResult<()> {
        let url = self.endpoint(index, &["settings"])?;
        let _: TaskResponse = self
            .send(self.request(Method::PUT, url).json(settings))
            .await?;
        Ok(())
    }

    async fn save_rules(
        &self,
        index: &str,
        rules: &[Value],
        options: SaveRulesOptions,
    ) -> IndexResult<()> {
        let mut url = self.endpoint(index, &["rules", "batch"])?;
        url.query_pairs_mut()
            .append_pair(
                "forwardToReplicas",
                &options.forward_to_replicas.to_string(),
            )
            .append_pair("clearExistingRules", &options.clear_existing.to_string());

        let _: TaskResponse = self
            .send(self.request(Method::POST, url).json(rules))
            .await?;
        Ok(())
    }

    async fn save_objects(&self, index: &str, batch: &[Record]) -> IndexResult<()> {
        let operations = batch
            .iter()
            .map(|record| BatchOperation {
                action: if record.get("objectID").is_some() {
                    "updateObject"
                } else {
                    "addObject"
                },
                body: record,
            })
            .collect();
        self.batch(index, operations).await
    }

    async fn save_synonyms(&self, index: &str, synonyms: &[Value]) -> IndexResult<()> {
        let url = self.endpoint(index, &["synonyms", "batch"])?;
        let _: TaskResponse = self
            .send(self.request(Method::POST, url).json(synonyms))
            .await?;
        Ok(())
    }

    async fn clear_objects(&self, index: &str) -> IndexResult<()> {
        let url = self.endpoint(index, &["clear"])?;
        let task: TaskResponse = self.send(self.request(Method::POST, url)).await?;
        if let Some(task_id) = task.task_id {
            self.wait_task(index, task_id).await?;
        }
        Ok(())
    }

    async fn move_index(&self, src: &str, dst: &str) -> IndexResult<()> {
        self.operation(src, dst, "move", None).await
    }

    async fn browse_objects(&self, index: &str, filter: &BrowseFilter) -> IndexResult<Vec<String>> {
        let url = self.endpoint(index, &["browse"])?;
        let filters = filter.to_filter_expression();
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let body = BrowseRequest {
                filters: &filters,
                attributes_to_retrieve: vec!["objectID"],
                hits_per_page: 1000,
                cursor: cursor.as_deref(),
            };
            let page: BrowseResponse = self
                .send(self.request(Method::POST, url.clone()).json(&body))
                .await?;

            ids.extend(page.hits.into_iter().map(|hit| hit.object_id));
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(ids)
    }

    async fn delete_objects(&self, index: &str, ids: &[String]) -> IndexResult<()> {
        let bodies: Vec<Value> = ids.iter().map(|id| json!({ "objectID": id })).collect();
        let operations = bodies
            .iter()
            .map(|body| BatchOperation {
                action: "deleteObject",
                body,
            })
            .collect();
        self.batch(index, operations).await
    }
}
