use anyhow::{Context, Result};
use std::net::SocketAddr;

use crate::services::{gemini, open_food_facts};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub open_food_facts_url: String,
    pub bind_addr: SocketAddr,
}

// Keeps the API key out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("gemini_api_key", &"***")
            .field("gemini_model", &self.gemini_model)
            .field("gemini_api_base", &self.gemini_api_base)
            .field("open_food_facts_url", &self.open_food_facts_url)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| var(key).filter(|value| !value.trim().is_empty());

        let gemini_api_key =
            get("GEMINI_API_KEY").context("GEMINI_API_KEY must be set in .env file")?;

        let gemini_model = get("GEMINI_MODEL").unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string());

        let gemini_api_base =
            get("GEMINI_API_BASE").unwrap_or_else(|| gemini::DEFAULT_API_BASE.to_string());
        reqwest::Url::parse(&gemini_api_base)
            .with_context(|| format!("GEMINI_API_BASE is not a valid URL: {}", gemini_api_base))?;

        let open_food_facts_url = get("OPENFOODFACTS_API_URL")
            .unwrap_or_else(|| open_food_facts::DEFAULT_API_URL.to_string());
        reqwest::Url::parse(&open_food_facts_url).with_context(|| {
            format!("OPENFOODFACTS_API_URL is not a valid URL: {}", open_food_facts_url)
        })?;

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("BIND_ADDR is not a socket address: {}", bind_addr))?;

        Ok(Self {
            gemini_api_key,
            gemini_model,
            gemini_api_base,
            open_food_facts_url,
            bind_addr,
        })
    }
}
