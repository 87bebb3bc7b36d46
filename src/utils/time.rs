use chrono::{DateTime, Utc};

/// This is the standard way of writing dates into the sheet.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wall-clock format for the Start and End columns.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Elapsed time between two moments in hours, rounded to two decimal places.
pub fn elapsed_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let seconds = (end - start).num_milliseconds() as f64 / 1000.;
    (seconds / 3600. * 100.).round() / 100.
}
