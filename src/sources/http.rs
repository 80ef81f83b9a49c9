//! HTTP trade source
//!
//! Expects `GET {base_url}/trades?date=YYYY-MM-DD` to answer with a JSON array
//! of trades.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::TradeSource;
use crate::models::Trade;

#[derive(Clone)]
pub struct HttpTradeSource {
    client: Client,
    base_url: String,
}

impl HttpTradeSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to build HttpTradeSource client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    #[inline]
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl TradeSource for HttpTradeSource {
    async fn get_trades(&self, date: NaiveDate) -> Result<Vec<Trade>> {
        let url = self.url("/trades");
        let date_param = date.format("%Y-%m-%d").to_string();

        let resp = self
            .client
            .get(url)
            .query(&[("date", date_param.as_str())])
            .send()
            .await
            .context("GET /trades failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "GET /trades?date={} {}: {}",
                date_param,
                status,
                text
            ));
        }

        let trades = resp
            .json::<Vec<Trade>>()
            .await
            .context("Failed to parse trades response")?;

        debug!("{} trades received for {}", trades.len(), date_param);
        Ok(trades)
    }
}
