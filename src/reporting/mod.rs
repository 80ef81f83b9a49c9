//! Power Position Reporting
//!
//! Turns the trades for the day-ahead trading date into an hourly CSV:
//!
//! ```text
//! Local Time,Volume
//! 23:00,150
//! 00:00,150
//! ...
//! ```
//!
//! Row `i` holds the summed volume of period `i` across all trades and is
//! labelled `day_ahead 00:00 + (i - 1)h`.

pub mod aggregate;
pub mod generator;
pub mod writer;

pub use aggregate::{aggregate_volumes, build_rows, day_ahead_date, period_start_time};
pub use generator::PowerPositionReporter;
pub use writer::{render_csv, report_filename};
