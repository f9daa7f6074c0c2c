use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::FetchError;
use crate::models::Config;

/// HTTP client for fundamentus.com.br.
///
/// The site refuses requests without a browser-looking header set, so every
/// request carries the same User-Agent and Accept headers; gzip/deflate
/// negotiation comes from the client's gzip support.
pub struct FundamentusClient {
    client: Client,
    base_url: String,
}

impl FundamentusClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html, text/plain, text/css, text/sgml, */*;q=0.01"),
        );

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        let base_url = Url::parse(&config.fundamentus_base_url)
            .with_context(|| format!("invalid base URL {:?}", config.fundamentus_base_url))?;

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Detail page for one security (equity or FII), ticker uppercased.
    pub async fn get_detail_page(&self, ticker: &str) -> Result<String, FetchError> {
        let ticker = ticker.to_uppercase();
        let url = format!("{}/detalhes.php?papel={}", self.base_url, ticker);
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        Ok(response.error_for_status()?.text().await?)
    }

    /// Advanced search page, source of the sector `<select>` control.
    pub async fn get_advanced_search_page(&self) -> Result<String, FetchError> {
        let url = format!("{}/buscaavancada.php", self.base_url);
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        Ok(response.error_for_status()?.text().await?)
    }

    /// Equity screener results, optionally filtered by sector id.
    pub async fn get_equity_listing_page(
        &self,
        sector_id: Option<&str>,
    ) -> Result<String, FetchError> {
        let url = match sector_id {
            Some(id) => format!("{}/resultado.php?setor={}", self.base_url, id),
            None => format!("{}/resultado.php", self.base_url),
        };
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        Ok(response.error_for_status()?.text().await?)
    }

    /// FII screener results page.
    pub async fn get_fii_listing_page(&self) -> Result<String, FetchError> {
        let url = format!("{}/fii_resultado.php", self.base_url);
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        Ok(response.error_for_status()?.text().await?)
    }
}
