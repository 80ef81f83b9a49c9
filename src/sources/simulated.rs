//! Simulated trade source
//!
//! Produces random trades with one period per local hour of the trading day,
//! so DST days come out as 23 or 25 periods. Fails at random to exercise the
//! scheduler's retry path.

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate, TimeZone};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{sleep, Duration};
use tracing::debug;

use super::TradeSource;
use crate::models::Trade;

#[derive(Debug, Clone)]
pub struct SimulatedSourceConfig {
    pub min_trades: usize,
    pub max_trades: usize,
    /// Probability (0.0 to 1.0) that a fetch fails
    pub failure_rate: f64,
    pub base_latency_ms: u64,
    pub latency_jitter_ms: u64,
    /// Volumes are drawn from `-max_abs_volume..=max_abs_volume`
    pub max_abs_volume: f64,
}

impl Default for SimulatedSourceConfig {
    fn default() -> Self {
        Self {
            min_trades: 1,
            max_trades: 5,
            failure_rate: 0.1,
            base_latency_ms: 50,
            latency_jitter_ms: 450,
            max_abs_volume: 200.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedTradeSource {
    pub config: SimulatedSourceConfig,
}

impl SimulatedTradeSource {
    pub fn new(config: SimulatedSourceConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl TradeSource for SimulatedTradeSource {
    async fn get_trades(&self, date: NaiveDate) -> Result<Vec<Trade>> {
        let mut rng = StdRng::from_entropy();

        let jitter: u64 = rng.gen_range(0..=self.config.latency_jitter_ms);
        sleep(Duration::from_millis(self.config.base_latency_ms + jitter)).await;

        if rng.gen::<f64>() < self.config.failure_rate {
            return Err(anyhow!("trade service unavailable (simulated)"));
        }

        let max_trades = self.config.max_trades.max(self.config.min_trades);
        let trade_count = rng.gen_range(self.config.min_trades..=max_trades);
        let period_count = local_period_count(date);
        let max_abs = self.config.max_abs_volume.abs();

        let trades = (0..trade_count)
            .map(|n| {
                let volumes: Vec<f64> = (0..period_count)
                    .map(|_| {
                        let v = if max_abs > 0.0 {
                            rng.gen_range(-max_abs..=max_abs)
                        } else {
                            0.0
                        };
                        (v * 10.0).round() / 10.0
                    })
                    .collect();
                Trade::from_volumes(date, &volumes).with_id(format!("sim:{}:{}", date, n))
            })
            .collect::<Vec<_>>();

        debug!(
            "Simulated {} trades x {} periods for {}",
            trades.len(),
            period_count,
            date
        );
        Ok(trades)
    }
}

/// Number of whole local hours from 23:00 the day before `date` to 23:00 on `date`
pub fn local_period_count(date: NaiveDate) -> usize {
    local_period_count_in(&Local, date)
}

fn local_period_count_in<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> usize {
    let start = date
        .pred_opt()
        .and_then(|d| d.and_hms_opt(23, 0, 0))
        .and_then(|naive| tz.from_local_datetime(&naive).earliest());
    let end = date
        .and_hms_opt(23, 0, 0)
        .and_then(|naive| tz.from_local_datetime(&naive).earliest());

    match (start, end) {
        (Some(start), Some(end)) => (end - start).num_hours().clamp(23, 25) as usize,
        _ => 24,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_utc_day_has_24_periods() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(local_period_count_in(&Utc, date), 24);
    }

    #[tokio::test]
    async fn test_always_failing_source() {
        let source = SimulatedTradeSource::new(SimulatedSourceConfig {
            failure_rate: 1.0,
            base_latency_ms: 0,
            latency_jitter_ms: 0,
            ..Default::default()
        });
        let date = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();

        assert!(source.get_trades(date).await.is_err());
    }

    #[tokio::test]
    async fn test_trades_cover_the_trading_day() {
        let source = SimulatedTradeSource::new(SimulatedSourceConfig {
            failure_rate: 0.0,
            base_latency_ms: 0,
            latency_jitter_ms: 0,
            min_trades: 2,
            max_trades: 2,
            ..Default::default()
        });
        let date = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();

        let trades = source.get_trades(date).await.unwrap();
        assert_eq!(trades.len(), 2);
        for trade in &trades {
            assert_eq!(trade.date, date);
            assert_eq!(trade.period_count(), local_period_count(date));
            assert!(trade.periods.iter().all(|p| p.volume.abs() <= 200.0));
        }
    }
}
