//! Period aggregation and clock-time labelling

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::{ReportRow, Trade};

/// Trading day the report covers: shift forward one hour, then take the date.
/// Maps 23:00-23:59 onto the following day.
pub fn day_ahead_date(point_in_time: NaiveDateTime) -> NaiveDate {
    (point_in_time + Duration::hours(1)).date()
}

/// Local start time of settlement period `index`. Index 0 is 23:00 on the
/// previous calendar day.
pub fn period_start_time(day_ahead: NaiveDate, index: usize) -> NaiveDateTime {
    day_ahead.and_time(NaiveTime::MIN) + Duration::hours(index as i64 - 1)
}

/// Sum volumes per period index across all trades.
///
/// The result has one entry per index up to the longest trade. A trade shorter
/// than that contributes nothing past its own length.
pub fn aggregate_volumes(trades: &[Trade]) -> Vec<f64> {
    let max_periods = trades.iter().map(Trade::period_count).max().unwrap_or(0);

    (0..max_periods)
        .map(|i| trades.iter().filter_map(|t| t.volume_at(i)).sum())
        .collect()
}

pub fn build_rows(day_ahead: NaiveDate, trades: &[Trade]) -> Vec<ReportRow> {
    aggregate_volumes(trades)
        .into_iter()
        .enumerate()
        .map(|(i, volume)| ReportRow {
            local_time: period_start_time(day_ahead, i),
            volume,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_ahead_boundary() {
        assert_eq!(day_ahead_date(at(2024, 1, 15, 10, 0)), date(2024, 1, 15));
        assert_eq!(day_ahead_date(at(2024, 1, 15, 22, 59)), date(2024, 1, 15));
        assert_eq!(day_ahead_date(at(2024, 1, 15, 23, 0)), date(2024, 1, 16));
        assert_eq!(day_ahead_date(at(2024, 1, 15, 23, 30)), date(2024, 1, 16));
        assert_eq!(day_ahead_date(at(2024, 12, 31, 23, 59)), date(2025, 1, 1));
    }

    #[test]
    fn test_period_labels() {
        let day = date(2024, 1, 16);
        assert_eq!(period_start_time(day, 0), at(2024, 1, 15, 23, 0));
        assert_eq!(period_start_time(day, 1), at(2024, 1, 16, 0, 0));
        assert_eq!(period_start_time(day, 2), at(2024, 1, 16, 1, 0));
        assert_eq!(period_start_time(day, 24), at(2024, 1, 16, 23, 0));
    }

    #[test]
    fn test_equal_length_trades_sum_per_index() {
        let day = date(2024, 1, 16);
        let trades = vec![
            Trade::from_volumes(day, &[100.0, 100.0, 100.0]),
            Trade::from_volumes(day, &[50.0, 50.0, -20.0]),
        ];

        assert_eq!(aggregate_volumes(&trades), vec![150.0, 150.0, 80.0]);
    }

    #[test]
    fn test_shorter_trades_stop_contributing() {
        let day = date(2024, 1, 16);
        let trades = vec![
            Trade::from_volumes(day, &[10.0, 20.0]),
            Trade::from_volumes(day, &[5.0]),
        ];

        assert_eq!(aggregate_volumes(&trades), vec![15.0, 20.0]);
    }

    #[test]
    fn test_row_count_follows_longest_trade() {
        let day = date(2024, 10, 27);
        let long: Vec<f64> = (0..25).map(|i| i as f64).collect();
        let short: Vec<f64> = vec![1.0; 23];
        let trades = vec![
            Trade::from_volumes(day, &short),
            Trade::from_volumes(day, &long),
        ];

        let rows = build_rows(day, &trades);
        assert_eq!(rows.len(), 25);
        assert_eq!(rows[22].volume, 23.0);
        assert_eq!(rows[23].volume, 23.0);
        assert_eq!(rows[24].volume, 24.0);
    }

    #[test]
    fn test_no_trades_no_rows() {
        assert!(aggregate_volumes(&[]).is_empty());
    }
}
