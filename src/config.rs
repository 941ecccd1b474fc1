use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    pub http: HttpConfig,
    pub search: SearchConfig,
    pub pipeline: PipelineConfig,
    pub table: TableConfig,
    pub server: ServerConfig,
    pub development: Option<DevelopmentConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Production,
            http: HttpConfig::default(),
            search: SearchConfig::default(),
            pipeline: PipelineConfig::default(),
            table: TableConfig::default(),
            server: ServerConfig::default(),
            development: None,
        }
    }
}

/// Build-mode switch. Development mode applies the `[development]` section:
/// extra request headers for the development host and a fixed metadata base
/// URL in place of the manifest-derived one.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Production,
    Development,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout applied to every outbound step.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    /// FactsInfo tabular search endpoint.
    pub endpoint: String,
    /// Manifest resource used to discover the metadata API base URL.
    pub manifest_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://sync.datim.org".to_string(),
            manifest_url: "https://www.datim.org/manifest.webapp".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// Keep the column headers from the first successful search for the
    /// whole session instead of overwriting them on every search.
    pub keep_first_headers: bool,
    /// What to do when more than one group matches a role prefix.
    pub ambiguous_groups: GroupPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            keep_first_headers: true,
            ambiguous_groups: GroupPolicy::First,
        }
    }
}

/// Resolution policy for multiple `Agency_*`/`Partner_*` group matches.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GroupPolicy {
    /// Take the first match in response order.
    First,
    /// Fail the search with an ambiguity error.
    Error,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TableConfig {
    pub page_size: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            page_size: crate::table::DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7331".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DevelopmentConfig {
    /// Host that receives the extra development headers.
    pub host: String,
    /// Fixed metadata API base URL; the manifest fetch is skipped.
    pub base_url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Config {
    pub fn is_development(&self) -> bool {
        self.mode == Mode::Development
    }

    /// The fixed metadata base URL, present only in development mode.
    pub fn development_base_url(&self) -> Option<&str> {
        if self.is_development() {
            self.development.as_ref().map(|d| d.base_url.as_str())
        } else {
            None
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate http
    if config.http.timeout_secs == 0 {
        anyhow::bail!("http.timeout_secs must be > 0");
    }

    // Validate endpoints
    Url::parse(&config.search.endpoint)
        .with_context(|| format!("search.endpoint is not a valid URL: {}", config.search.endpoint))?;
    Url::parse(&config.search.manifest_url).with_context(|| {
        format!(
            "search.manifest_url is not a valid URL: {}",
            config.search.manifest_url
        )
    })?;

    // Validate table
    if config.table.page_size == 0 {
        anyhow::bail!("table.page_size must be >= 1");
    }

    // Validate server
    if config.server.bind.is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    // Validate development section
    match (&config.mode, &config.development) {
        (Mode::Development, None) => {
            anyhow::bail!("mode = \"development\" requires a [development] section")
        }
        (_, Some(dev)) => {
            if dev.host.is_empty() {
                anyhow::bail!("development.host must not be empty");
            }
            Url::parse(&dev.base_url).with_context(|| {
                format!("development.base_url is not a valid URL: {}", dev.base_url)
            })?;
        }
        _ => {}
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("wimm.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let (_tmp, path) = write_config("");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.mode, Mode::Production);
        assert_eq!(cfg.search.endpoint, "https://sync.datim.org");
        assert_eq!(cfg.http.timeout_secs, 30);
        assert_eq!(cfg.table.page_size, 5);
        assert!(cfg.pipeline.keep_first_headers);
        assert_eq!(cfg.pipeline.ambiguous_groups, GroupPolicy::First);
        assert!(cfg.development_base_url().is_none());
    }

    #[test]
    fn test_development_mode_requires_section() {
        let (_tmp, path) = write_config("mode = \"development\"\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("[development]"));
    }

    #[test]
    fn test_development_section_parsed() {
        let (_tmp, path) = write_config(
            r#"
mode = "development"

[development]
host = "dev.datim.org"
base_url = "https://dev.datim.org"

[development.headers]
Authorization = "Basic abc"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.development_base_url(), Some("https://dev.datim.org"));
        let dev = cfg.development.unwrap();
        assert_eq!(dev.headers.get("Authorization").unwrap(), "Basic abc");
    }

    #[test]
    fn test_development_section_inactive_in_production() {
        let (_tmp, path) = write_config(
            r#"
[development]
host = "dev.datim.org"
base_url = "https://dev.datim.org"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert!(cfg.development_base_url().is_none());
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let (_tmp, path) = write_config("[search]\nendpoint = \"not a url\"\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let (_tmp, path) = write_config("[http]\ntimeout_secs = 0\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_group_policy_error_variant() {
        let (_tmp, path) = write_config("[pipeline]\nambiguous_groups = \"error\"\n");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.pipeline.ambiguous_groups, GroupPolicy::Error);
    }
}
