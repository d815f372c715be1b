use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::error::{EnvError, Result};

pub const UPSUN_API_BASE: &str = "https://api.upsun.com";

/// 远端 REST API：按路径读取 JSON
#[allow(async_fn_in_trait)]
pub trait ProviderApi {
    async fn get_json(&self, path: &str) -> Result<Value>;
}

/// 携带 bearer token 的 Upsun API 客户端
pub struct UpsunApi {
    client: Client,
    base_url: String,
    token: String,
}

impl UpsunApi {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(UPSUN_API_BASE, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("project-env-manager/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }
}

impl ProviderApi for UpsunApi {
    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);
        let response = self.client.get(&url).bearer_auth(&self.token).send().await?;
        if !response.status().is_success() {
            return Err(EnvError::RemoteApi(format!(
                "{} returned status {}",
                path,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}
