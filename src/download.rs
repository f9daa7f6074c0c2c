//! Pluggable download capability for B3 portfolio files.
//!
//! Driving a headless browser is an external concern: the core only asks an
//! agent to make the file appear in the download directory, then polls for
//! it (see [`crate::composition`]).

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::models::{Config, IndexId};

#[async_trait]
pub trait DownloadAgent: Send + Sync {
    /// Ask the agent to download the theoretical portfolio file for `index`
    /// into the configured download directory.
    async fn request_download(&self, index: IndexId) -> Result<()>;
}

/// Runs a user-configured headless-browser command against the B3 index
/// page. The command receives the page URL and the download directory as
/// arguments and is responsible for triggering the "by sector" download.
pub struct BrowserDownloadAgent {
    command: String,
    b3_base_url: String,
    download_dir: String,
}

impl BrowserDownloadAgent {
    pub fn new(command: String, config: &Config) -> Self {
        Self {
            command,
            b3_base_url: config.b3_base_url.trim_end_matches('/').to_string(),
            download_dir: config.download_dir.clone(),
        }
    }

    fn index_page_url(&self, index: IndexId) -> String {
        format!(
            "{}/indexPage/day/{}?language=pt-br",
            self.b3_base_url,
            index.code()
        )
    }
}

#[async_trait]
impl DownloadAgent for BrowserDownloadAgent {
    async fn request_download(&self, index: IndexId) -> Result<()> {
        let url = self.index_page_url(index);
        info!("Requesting {} portfolio download via {}", index, self.command);

        let status = Command::new(&self.command)
            .arg(&url)
            .arg(&self.download_dir)
            .status()
            .await
            .map_err(|e| anyhow!("failed to spawn download command {:?}: {e}", self.command))?;

        if !status.success() {
            return Err(anyhow!(
                "download command {:?} exited with {status} for {index}",
                self.command
            ));
        }
        Ok(())
    }
}

/// Agent that does nothing; used when a pre-downloaded file is expected.
pub struct NoopDownloadAgent;

#[async_trait]
impl DownloadAgent for NoopDownloadAgent {
    async fn request_download(&self, _index: IndexId) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_page_url() {
        let config = crate::models::Config {
            fundamentus_base_url: "https://www.fundamentus.com.br".into(),
            b3_base_url: "https://sistemaswebb3-listados.b3.com.br/".into(),
            download_dir: ".".into(),
            download_timeout_secs: 30,
            download_poll_ms: 500,
            max_concurrency: 4,
            http_timeout_secs: 30,
            user_agent: "test".into(),
            browser_cmd: None,
        };
        let agent = BrowserDownloadAgent::new("chromium".into(), &config);
        assert_eq!(
            agent.index_page_url(IndexId::Ifix),
            "https://sistemaswebb3-listados.b3.com.br/indexPage/day/IFIX?language=pt-br"
        );
    }
}
