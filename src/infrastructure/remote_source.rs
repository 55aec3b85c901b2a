// Remote monitoring API data source
use crate::application::data_source::{parse_series_payload, snapshot_from_series, DataSource};
use crate::domain::metric::{Metric, SystemId};
use crate::domain::series::FeedSnapshot;
use crate::domain::telemetry::Sample;
use crate::infrastructure::config::{prepare_query, RemoteSettings};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RemoteSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    url_template: String,
    history_template: String,
    capacity: usize,
    tz: FixedOffset,
}

impl RemoteSource {
    pub fn new(settings: &RemoteSettings, capacity: usize, tz: FixedOffset) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            url_template: settings.url_template.clone(),
            history_template: settings.history_template.clone(),
            capacity,
            tz,
        })
    }

    fn build_url(&self, template: &str, system: SystemId, window_ms: Option<i64>) -> String {
        let mut vars = HashMap::new();
        vars.insert("base_url".to_string(), self.base_url.clone());
        vars.insert("system".to_string(), urlencoding::encode(system.slug()).into_owned());
        if let Some(window) = window_ms {
            vars.insert("window_ms".to_string(), window.to_string());
        }
        prepare_query(template, &vars)
    }

    async fn get_series(&self, url: &str) -> Result<BTreeMap<Metric, Vec<Sample>>> {
        let mut request = self.client.get(url).header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Monitoring API request failed with status {}: {}", status, body);
        }

        let body = response
            .bytes()
            .await
            .context("Failed to read monitoring API response")?;
        parse_series_payload(&body)
    }
}

#[async_trait]
impl DataSource for RemoteSource {
    async fn fetch(&self, system: SystemId) -> Result<FeedSnapshot> {
        let url = self.build_url(&self.url_template, system, None);
        tracing::debug!("Fetching {} snapshot from {}", system, url);

        let series = self.get_series(&url).await?;
        let last_update = Utc::now()
            .with_timezone(&self.tz)
            .format("%m/%d/%Y, %I:%M:%S %p")
            .to_string();
        Ok(snapshot_from_series(system, series, self.capacity, last_update))
    }

    async fn fetch_history(&self, system: SystemId, window_ms: i64) -> Result<BTreeMap<Metric, Vec<Sample>>> {
        let url = self.build_url(&self.history_template, system, Some(window_ms));
        tracing::debug!("Fetching {} history from {}", system, url);
        self.get_series(&url).await
    }
}
