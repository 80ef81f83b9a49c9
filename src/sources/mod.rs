//! Trade Sources
//!
//! The report generator only depends on [`TradeSource`]. Two adapters are
//! provided:
//! - [`SimulatedTradeSource`] - random trades with configurable failure rate
//! - [`HttpTradeSource`] - JSON trades from an HTTP endpoint

use anyhow::Result;
use chrono::NaiveDate;

use crate::models::Trade;

pub mod http;
pub mod simulated;

pub use http::HttpTradeSource;
pub use simulated::{SimulatedSourceConfig, SimulatedTradeSource};

#[async_trait::async_trait]
pub trait TradeSource: Send + Sync {
    /// Fetch every trade for the given trading date, periods in settlement order
    async fn get_trades(&self, date: NaiveDate) -> Result<Vec<Trade>>;
}
