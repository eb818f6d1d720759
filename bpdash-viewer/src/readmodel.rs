use crate::error::{FetchError, ValidationError, ViewerError};
use bpdash_core::{FrameModel, ObjectState};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// hostname -> service -> state, as served by `GET /environments/{name}`.
pub type EnvironmentView = BTreeMap<String, BTreeMap<String, ObjectState>>;

/// A `nok` frame nobody has annotated yet, from `GET /businessprocesses/{bp}/events`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnannotatedEvent {
    pub id: String,
    pub bp: String,
    #[serde(default)]
    pub kpi: Option<String>,
    #[serde(flatten)]
    pub frame: FrameModel,
}

/// HTTP client for the hub's read model.
#[derive(Clone)]
pub struct ReadModelClient {
    base_url: String,
    http: reqwest::Client,
}

impl ReadModelClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = self.url(path);
        debug!("GET {url}");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Unreachable { url: url.clone(), source })?;
        read_json(url, response).await
    }

    pub async fn environments(&self) -> Result<Vec<String>, FetchError> {
        self.get_json("/environments/").await
    }

    /// An environment without any host counts as no data.
    pub async fn environment(&self, name: &str) -> Result<EnvironmentView, FetchError> {
        let path = format!("/environments/{name}");
        let view: EnvironmentView = self.get_json(&path).await?;
        if view.is_empty() {
            return Err(FetchError::NoData { url: self.url(&path) });
        }
        Ok(view)
    }

    pub async fn business_processes(&self) -> Result<BTreeMap<String, String>, FetchError> {
        self.get_json("/businessprocesses/").await
    }

    pub async fn bp_timeline(&self, bp: &str) -> Result<Vec<FrameModel>, FetchError> {
        self.get_json(&format!("/businessprocesses/{bp}")).await
    }

    pub async fn kpis(&self, bp: &str) -> Result<BTreeMap<String, String>, FetchError> {
        self.get_json(&format!("/businessprocesses/{bp}/kpis")).await
    }

    pub async fn kpi_timeline(&self, bp: &str, kpi: &str) -> Result<Vec<FrameModel>, FetchError> {
        self.get_json(&format!("/businessprocesses/{bp}/kpis/{kpi}")).await
    }

    /// Empty when every outage of the last month is explained.
    pub async fn unannotated_events(&self, bp: &str) -> Result<Vec<UnannotatedEvent>, FetchError> {
        self.get_json(&format!("/businessprocesses/{bp}/events")).await
    }

    /// Annotates the frame `event` of `bp`. Blank text is refused before any
    /// request goes out.
    pub async fn annotate(&self, bp: &str, event: &str, text: &str) -> Result<FrameModel, ViewerError> {
        let text = validate_annotation(text)?;
        let url = self.url(&format!("/businessprocesses/{bp}/events/{event}"));
        let response = self
            .http
            .post(&url)
            .body(text.to_string())
            .send()
            .await
            .map_err(|source| FetchError::Unreachable { url: url.clone(), source })?;
        Ok(read_json(url, response).await?)
    }
}

pub fn validate_annotation(text: &str) -> Result<&str, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyAnnotation);
    }
    Ok(text)
}

async fn read_json<T: DeserializeOwned>(url: String, response: reqwest::Response) -> Result<T, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url,
            status: status.as_u16(),
        });
    }
    let body = response
        .text()
        .await
        .map_err(|source| FetchError::Unreachable { url: url.clone(), source })?;
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(FetchError::NoData { url });
    }
    serde_json::from_str(trimmed).map_err(|source| FetchError::Decode { url, source })
}
