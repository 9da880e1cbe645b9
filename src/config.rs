use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{CrawlError, Result};

pub const DEFAULT_BASE_URL: &str = "https://docs.unity3d.com/2017.4/Documentation/ScriptReference/";
pub const DEFAULT_INDEX_PAGE: &str = "index.html";
pub const DEFAULT_OUTPUT_DIR: &str = "data";
pub const DEFAULT_FILE_PREFIX: &str = "unity_";
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RETRIES: u32 = 0;
pub const BASE_BACKOFF_MS: u64 = 2000;
const ENV_PREFIX: &str = "APIDOC";

/// How pages are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Renderer {
    /// Plain HTTP GET, no script execution
    Http,
    /// spider.cloud rendering (needs SPIDER_API_KEY)
    Spider,
}

impl Renderer {
    pub fn as_str(self) -> &'static str {
        match self {
            Renderer::Http => "http",
            Renderer::Spider => "spider",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Prefix for every relative link found in markup. Always ends in `/`.
    pub base_url: String,
    pub index_page: String,
    pub output_dir: PathBuf,
    pub file_prefix: String,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub retries: u32,
    pub renderer: Renderer,
    /// Enrich only the first N entities.
    pub limit: Option<usize>,
}

/// Values given on the command line; they win over environment and defaults.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub retries: Option<u32>,
    pub renderer: Option<Renderer>,
    pub limit: Option<usize>,
}

impl CrawlConfig {
    /// Defaults, then `APIDOC_*` environment variables, then `overrides`.
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("base_url", DEFAULT_BASE_URL)
            .and_then(|b| b.set_default("index_page", DEFAULT_INDEX_PAGE))
            .and_then(|b| b.set_default("output_dir", DEFAULT_OUTPUT_DIR))
            .and_then(|b| b.set_default("file_prefix", DEFAULT_FILE_PREFIX))
            .and_then(|b| b.set_default("concurrency", DEFAULT_CONCURRENCY as i64))
            .and_then(|b| b.set_default("timeout_secs", DEFAULT_TIMEOUT_SECS as i64))
            .and_then(|b| b.set_default("retries", DEFAULT_RETRIES as i64))
            .and_then(|b| b.set_default("renderer", Renderer::Spider.as_str()))
            .map_err(config_err)?
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        if let Some(url) = &overrides.base_url {
            builder = builder.set_override("base_url", url.as_str()).map_err(config_err)?;
        }
        if let Some(dir) = &overrides.output_dir {
            builder = builder
                .set_override("output_dir", dir.display().to_string())
                .map_err(config_err)?;
        }
        if let Some(n) = overrides.concurrency {
            builder = builder.set_override("concurrency", n as i64).map_err(config_err)?;
        }
        if let Some(n) = overrides.retries {
            builder = builder.set_override("retries", n as i64).map_err(config_err)?;
        }
        if let Some(r) = overrides.renderer {
            builder = builder.set_override("renderer", r.as_str()).map_err(config_err)?;
        }
        if let Some(n) = overrides.limit {
            builder = builder.set_override("limit", n as i64).map_err(config_err)?;
        }

        let cfg: CrawlConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_err)?;
        cfg.validated()
    }

    /// Normalize the base URL and reject unusable values.
    pub fn validated(mut self) -> Result<Self> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(CrawlError::Config(format!(
                "base_url must be an absolute http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if !self.base_url.ends_with('/') {
            self.base_url.push('/');
        }
        if self.concurrency == 0 {
            return Err(CrawlError::Config("concurrency must be at least 1".into()));
        }
        Ok(self)
    }

    pub fn index_url(&self) -> String {
        format!("{}{}", self.base_url, self.index_page)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(BASE_BACKOFF_MS)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            index_page: DEFAULT_INDEX_PAGE.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
            renderer: Renderer::Spider,
            limit: None,
        }
    }
}

fn config_err(e: config::ConfigError) -> CrawlError {
    CrawlError::Config(e.to_string())
}
