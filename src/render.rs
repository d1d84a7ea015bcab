//! Config rendering
//!
//! Orchestrates one full render: load the base template, gather raw links
//! from inline lists, link files and subscription feeds, batch-convert them
//! into outbounds, merge into the template with the configured selector
//! tags, and write the result.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{ConfigDocument, merge_outbounds, parse_base_config};
use crate::convert::convert_links;
use crate::link::RawLink;
use crate::subscription::{SubscriptionManager, SubscriptionRecord};

// ============================================================================
// Render Config
// ============================================================================

/// A render job parsed from TOML
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RenderConfig {
    /// Base template file path or URL (required)
    pub base: String,

    /// Output file path; "-" writes to stdout
    #[serde(default = "default_output")]
    pub output: String,

    /// Tags of selector/group outbounds in the template that should absorb
    /// the generated tags
    #[serde(default)]
    pub selector_tags: Vec<String>,

    /// Raw links listed inline
    #[serde(default)]
    pub links: Vec<String>,

    /// Files containing one raw link per line
    #[serde(default)]
    pub link_files: Vec<String>,

    /// Subscription feeds to resolve
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionSource>,
}

/// One subscription feed in a render job
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SubscriptionSource {
    /// Name/identifier for this feed
    pub name: String,

    /// URL to fetch the feed from
    pub url: String,

    /// Keyword filter override; empty uses the built-in defaults
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
}

impl RenderConfig {
    /// Parse a render config from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: RenderConfig =
            toml::from_str(content).context("Failed to parse render config TOML")?;

        if config.links.is_empty()
            && config.link_files.is_empty()
            && config.subscriptions.is_empty()
        {
            anyhow::bail!("At least one link source is required");
        }

        Ok(config)
    }

    /// Load a render config from a file path
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read render config from {:?}", path))?;
        Self::from_toml(&content)
    }

    /// Load a render config from a file path or URL
    pub async fn load(path_or_url: &str) -> Result<Self> {
        if is_url(path_or_url) {
            let content = fetch_text(path_or_url).await?;
            Self::from_toml(&content)
        } else {
            Self::from_file(Path::new(path_or_url)).await
        }
    }
}

fn default_output() -> String {
    "./out/config.json".to_string()
}

fn is_url(path_or_url: &str) -> bool {
    path_or_url.starts_with("http://") || path_or_url.starts_with("https://")
}

// ============================================================================
// Renderer
// ============================================================================

/// Renderer that drives one render job end to end
pub struct Renderer {
    config: RenderConfig,
    subscriptions: SubscriptionManager,
}

impl Renderer {
    /// Create a renderer for the given job
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            subscriptions: SubscriptionManager::new(),
        }
    }

    /// Load a render job from a path or URL
    pub async fn load(path_or_url: &str) -> Result<Self> {
        let config = RenderConfig::load(path_or_url).await?;
        Ok(Self::new(config))
    }

    /// Run the render and return the merged document
    pub async fn render(&self) -> Result<ConfigDocument> {
        info!("Starting config render");

        let mut document = self.load_base().await?;
        debug!("Loaded base template with {} outbounds", document.outbounds.len());

        let links = self.gather_links().await?;
        info!("Gathered {} raw links", links.len());

        let outbounds = convert_links(&links);
        info!("Compiled {} outbounds", outbounds.len());

        merge_outbounds(&mut document, &outbounds, &self.config.selector_tags)
            .context("Failed to merge generated outbounds")?;

        Ok(document)
    }

    /// Run the render and write the result to the configured output
    pub async fn render_to_file(&self, output_override: Option<&str>) -> Result<()> {
        let document = self.render().await?;

        let json = document
            .to_json_pretty()
            .context("Failed to serialize rendered config")?;

        let output = output_override.unwrap_or(&self.config.output);
        if output == "-" {
            println!("{}", json);
            return Ok(());
        }

        let path = Path::new(output);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create output directory {:?}", parent))?;
        }

        tokio::fs::write(path, &json)
            .await
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        info!("Config written to {:?}", path);
        Ok(())
    }

    /// Load and normalize the base template
    async fn load_base(&self) -> Result<ConfigDocument> {
        let source = &self.config.base;
        info!("Loading base template from {}", source);

        let content = if is_url(source) {
            fetch_text(source).await?
        } else {
            tokio::fs::read_to_string(source)
                .await
                .with_context(|| format!("Failed to read base template from {}", source))?
        };

        Ok(parse_base_config(&content))
    }

    /// Collect raw links from every configured source, in order
    async fn gather_links(&self) -> Result<Vec<RawLink>> {
        let mut links: Vec<RawLink> = Vec::new();

        for (index, raw) in self.config.links.iter().enumerate() {
            links.push(RawLink::new(format!("inline:{}", index), raw.clone()));
        }

        for file in &self.config.link_files {
            let content = tokio::fs::read_to_string(file)
                .await
                .with_context(|| format!("Failed to read link file {}", file))?;
            for (index, line) in content.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                links.push(RawLink::new(
                    format!("file:{}:{}", file, index + 1),
                    line.to_string(),
                ));
            }
        }

        for source in &self.config.subscriptions {
            let mut record = SubscriptionRecord::new(source.name.clone(), source.url.clone());
            record.exclude_keywords = source.exclude_keywords.clone();

            let resolution = self.subscriptions.resolve(Some(record), true).await;
            if let Some(metadata) = &resolution.metadata
                && let Some(error) = &metadata.last_error
            {
                warn!("Subscription '{}' failed: {}", source.name, error);
            }
            info!(
                "Subscription '{}' resolved to {} links",
                source.name,
                resolution.links.len()
            );
            links.extend(resolution.links);
        }

        Ok(links)
    }
}

// ============================================================================
// HTTP Utilities
// ============================================================================

/// Fetch text content from a URL
pub async fn fetch_text(url: &str) -> Result<String> {
    debug!("Fetching URL: {}", url);

    let client = reqwest::Client::builder()
        .user_agent(format!("switchboard/{}", crate::get_version()))
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch URL: {}", url))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("HTTP request failed with status {}: {}", status, url);
    }

    let text = response
        .text()
        .await
        .with_context(|| format!("Failed to read response body from: {}", url))?;

    Ok(text)
}
