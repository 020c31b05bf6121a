//! HTTP client for the backend service

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alarm::AlarmSettings;
use crate::config::RuntimeConfig;

use super::{Backend, BackendError, DreamCommand};

const CONFIG_PATH: &str = "/api/config";
const ALARM_PATH: &str = "/api/alarm";
const ALARM_TOGGLE_PATH: &str = "/api/alarm/toggle";

/// Body of an alarm save request
#[derive(Debug, Serialize)]
struct AlarmTime {
    hour: u8,
    minute: u8,
}

/// The service answers a save either with the bare settings or wrapped
/// as `{"status": ..., "data": {...}}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SaveReply {
    Wrapped { data: AlarmSettings },
    Bare(AlarmSettings),
}

impl SaveReply {
    fn into_settings(self) -> AlarmSettings {
        match self {
            SaveReply::Wrapped { data } => data,
            SaveReply::Bare(settings) => settings,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToggleReply {
    enabled: bool,
}

/// `Backend` over the service's JSON HTTP API
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a client for the service at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn ensure_success(
        response: reqwest::Response,
        path: &'static str,
    ) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(BackendError::Status {
                status: status.as_u16(),
                path,
            })
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &'static str) -> Result<T, BackendError> {
        debug!(path, "GET");
        let response = self.client.get(self.url(path)).send().await?;
        let body = Self::ensure_success(response, path)?.json().await?;
        Ok(body)
    }

    async fn post_json<T, B>(&self, path: &'static str, body: Option<&B>) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        debug!(path, "POST");
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let body = Self::ensure_success(response, path)?.json().await?;
        Ok(body)
    }
}

impl Backend for HttpBackend {
    async fn fetch_config(&self) -> Result<RuntimeConfig, BackendError> {
        self.get_json(CONFIG_PATH).await
    }

    async fn fetch_alarm(&self) -> Result<AlarmSettings, BackendError> {
        self.get_json(ALARM_PATH).await
    }

    async fn save_alarm(&self, hour: u8, minute: u8) -> Result<AlarmSettings, BackendError> {
        let reply: SaveReply = self
            .post_json(ALARM_PATH, Some(&AlarmTime { hour, minute }))
            .await?;
        Ok(reply.into_settings())
    }

    async fn toggle_alarm(&self) -> Result<bool, BackendError> {
        let reply: ToggleReply = self.post_json::<_, ()>(ALARM_TOGGLE_PATH, None).await?;
        Ok(reply.enabled)
    }

    async fn send_command(&self, command: DreamCommand) -> Result<(), BackendError> {
        let path = command.path();
        debug!(path, "POST");
        let response = self.client.post(self.url(path)).send().await?;
        Self::ensure_success(response, path)?;
        Ok(())
    }
}
