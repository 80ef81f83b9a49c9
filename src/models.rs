use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A single settlement period within a trade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Period {
    /// 0-based position within the owning trade's sequence
    pub period: usize,
    /// Traded volume (signed, may be fractional)
    pub volume: f64,
}

/// A trade returned by a trade source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(default)]
    pub trade_id: Option<String>,
    pub date: NaiveDate,
    /// Ordered by settlement period
    pub periods: Vec<Period>,
}

impl Trade {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            trade_id: None,
            date,
            periods: Vec::new(),
        }
    }

    pub fn with_id(mut self, trade_id: impl Into<String>) -> Self {
        self.trade_id = Some(trade_id.into());
        self
    }

    /// Build a trade whose periods carry `volumes` in order
    pub fn from_volumes(date: NaiveDate, volumes: &[f64]) -> Self {
        let periods = volumes
            .iter()
            .enumerate()
            .map(|(period, &volume)| Period { period, volume })
            .collect();
        Self {
            trade_id: None,
            date,
            periods,
        }
    }

    pub fn period_count(&self) -> usize {
        self.periods.len()
    }

    /// Volume at `index`, or `None` when this trade has no such period
    pub fn volume_at(&self, index: usize) -> Option<f64> {
        self.periods.get(index).map(|p| p.volume)
    }
}

/// One aggregated line of the position report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportRow {
    pub local_time: NaiveDateTime,
    pub volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_volumes_indexes_in_order() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        let trade = Trade::from_volumes(date, &[10.0, -2.5, 7.0]);

        assert_eq!(trade.period_count(), 3);
        assert_eq!(trade.periods[1].period, 1);
        assert_eq!(trade.volume_at(1), Some(-2.5));
        assert_eq!(trade.volume_at(3), None);
    }

    #[test]
    fn test_trade_deserializes_without_id() {
        let json = r#"{"date":"2024-01-16","periods":[{"period":0,"volume":100.0}]}"#;
        let trade: Trade = serde_json::from_str(json).unwrap();

        assert!(trade.trade_id.is_none());
        assert_eq!(trade.volume_at(0), Some(100.0));
    }
}
