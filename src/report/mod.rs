//! Windowed hour reports over the linked sheet. Rows are bucketed by tag and by
//! task label, ranked by descending hours, and rendered as a short summary.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;

use crate::{sheet::RowMap, utils::time::DATE_FORMAT};

/// How many tags and tasks the rendered summary shows.
pub const TOP_ENTRIES: usize = 5;

/// Bucket for rows whose tag field is empty.
pub const NO_TAG_LABEL: &str = "no tag";

/// Task labels longer than this are cut and marked with an ellipsis.
pub const TASK_LABEL_LIMIT: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct BucketHours {
    pub label: String,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub window_days: i64,
    pub total_hours: f64,
    /// Hours per tag, descending. Ties keep first-encountered order.
    pub by_tag: Vec<BucketHours>,
    /// Hours per task label, descending. Ties keep first-encountered order.
    pub by_task: Vec<BucketHours>,
    /// Number of rows that contributed to the sums.
    pub row_count: usize,
}

impl ReportSummary {
    /// An empty window is a normal outcome, distinct from a store fault.
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }
}

/// Accumulates hours in first-encountered label order so that ranking ties stay
/// deterministic.
#[derive(Default)]
struct Buckets {
    order: Vec<BucketHours>,
    index: HashMap<String, usize>,
}

impl Buckets {
    fn add(&mut self, label: &str, hours: f64) {
        match self.index.get(label) {
            Some(&i) => self.order[i].hours += hours,
            None => {
                self.index.insert(label.to_string(), self.order.len());
                self.order.push(BucketHours {
                    label: label.to_string(),
                    hours,
                });
            }
        }
    }

    fn ranked(mut self) -> Vec<BucketHours> {
        // Stable sort, so equal totals keep their first-encountered order.
        self.order
            .sort_by(|a, b| b.hours.partial_cmp(&a.hours).unwrap_or(std::cmp::Ordering::Equal));
        self.order
    }
}

/// Sums hours over rows whose date falls within the last `window_days`,
/// inclusive on both ends. A row contributes to all aggregates or to none: if
/// either its date or its hours fail to parse it is dropped whole.
pub fn aggregate(rows: &[RowMap], window_days: i64, now: DateTime<Utc>) -> ReportSummary {
    let window_start = (now - Duration::days(window_days)).date_naive();
    let window_end = now.date_naive();

    let mut total_hours = 0.;
    let mut row_count = 0;
    let mut by_tag = Buckets::default();
    let mut by_task = Buckets::default();

    for row in rows {
        let date = row.get("Date").map(String::as_str).unwrap_or_default();
        let Ok(date) = NaiveDate::parse_from_str(date, DATE_FORMAT) else {
            debug!("Skipping row with unparsable date {date:?}");
            continue;
        };
        if date < window_start || date > window_end {
            continue;
        }
        let hours = row.get("Hours").map(String::as_str).unwrap_or_default();
        let Ok(hours) = hours.parse::<f64>() else {
            debug!("Skipping row with unparsable hours {hours:?}");
            continue;
        };

        total_hours += hours;
        row_count += 1;

        let tags: Vec<&str> = row
            .get("Tags")
            .map(String::as_str)
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .collect();
        if tags.is_empty() {
            by_tag.add(NO_TAG_LABEL, hours);
        } else {
            for tag in tags {
                by_tag.add(tag, hours);
            }
        }

        let task = row.get("Task").map(String::as_str).unwrap_or_default();
        by_task.add(&truncate_label(task), hours);
    }

    ReportSummary {
        window_days,
        total_hours,
        by_tag: by_tag.ranked(),
        by_task: by_task.ranked(),
        row_count,
    }
}

fn truncate_label(label: &str) -> String {
    if label.chars().count() <= TASK_LABEL_LIMIT {
        return label.to_string();
    }
    let mut cut: String = label.chars().take(TASK_LABEL_LIMIT).collect();
    cut.push('…');
    cut
}

/// Renders the summary as a plain chat message: the 2-decimal total followed by
/// the top tags and tasks.
pub fn render(summary: &ReportSummary) -> String {
    let mut out = format!(
        "Last {} days: {:.2} h across {} tasks\n",
        summary.window_days, summary.total_hours, summary.row_count
    );

    out.push_str("\nTop tags:\n");
    for entry in summary.by_tag.iter().take(TOP_ENTRIES) {
        out.push_str(&format!("  {}: {:.2} h\n", entry.label, entry.hours));
    }

    out.push_str("\nTop tasks:\n");
    for entry in summary.by_task.iter().take(TOP_ENTRIES) {
        out.push_str(&format!("  {}: {:.2} h\n", entry.label, entry.hours));
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    use crate::sheet::RowMap;

    use super::{aggregate, render, NO_TAG_LABEL, TOP_ENTRIES};

    fn report_now() -> chrono::DateTime<Utc> {
        Utc.from_utc_datetime(&chrono::NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            NaiveTime::MIN,
        ))
    }

    fn row(date: &str, hours: &str, task: &str, tags: &str) -> RowMap {
        [
            ("Date", date),
            ("Start", "09:00:00"),
            ("End", "10:00:00"),
            ("Hours", hours),
            ("Task", task),
            ("Tags", tags),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn sums_hours_by_tag_and_task() {
        let rows = vec![row("2024-01-01", "1", "A", "x,y")];

        let summary = aggregate(&rows, 7, report_now());

        assert_eq!(summary.total_hours, 1.);
        assert_eq!(summary.row_count, 1);
        assert_eq!(summary.by_tag.len(), 2);
        assert!(summary.by_tag.iter().all(|b| b.hours == 1.));
        assert_eq!(summary.by_task[0].label, "A");
        assert_eq!(summary.by_task[0].hours, 1.);
    }

    #[test]
    fn rows_outside_the_window_are_dropped() {
        let rows = vec![
            row("2024-01-01", "1", "recent", ""),
            row("2023-11-01", "4", "ancient", ""),
        ];

        let summary = aggregate(&rows, 7, report_now());

        assert_eq!(summary.total_hours, 1.);
        assert_eq!(summary.by_task.len(), 1);
        assert_eq!(summary.by_task[0].label, "recent");
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let rows = vec![
            row("2023-12-27", "1", "oldest in window", ""),
            row("2024-01-03", "1", "today", ""),
        ];

        let summary = aggregate(&rows, 7, report_now());

        assert_eq!(summary.row_count, 2);
    }

    #[test]
    fn unparsable_rows_contribute_to_no_aggregate() {
        let rows = vec![
            row("not a date", "1", "bad date", "x"),
            row("2024-01-02", "not hours", "bad hours", "x"),
            row("2024-01-02", "2", "good", "x"),
        ];

        let summary = aggregate(&rows, 7, report_now());

        assert_eq!(summary.total_hours, 2.);
        assert_eq!(summary.row_count, 1);
        assert_eq!(summary.by_tag.len(), 1);
        assert_eq!(summary.by_tag[0].hours, 2.);
        assert_eq!(summary.by_task.len(), 1);
    }

    #[test]
    fn empty_tags_fall_into_the_sentinel_bucket() {
        let rows = vec![row("2024-01-02", "1.5", "A", "  ,  ")];

        let summary = aggregate(&rows, 7, report_now());

        assert_eq!(summary.by_tag.len(), 1);
        assert_eq!(summary.by_tag[0].label, NO_TAG_LABEL);
    }

    #[test]
    fn long_task_labels_are_truncated() {
        let label = "a".repeat(40);
        let rows = vec![row("2024-01-02", "1", &label, "")];

        let summary = aggregate(&rows, 7, report_now());

        assert_eq!(summary.by_task[0].label.chars().count(), 31);
        assert!(summary.by_task[0].label.ends_with('…'));
    }

    #[test]
    fn rendering_shows_at_most_five_tags_in_descending_order() {
        let rows: Vec<_> = (1..=7)
            .map(|i| row("2024-01-02", &i.to_string(), "task", &format!("tag{i}")))
            .collect();

        let summary = aggregate(&rows, 7, report_now());

        assert_eq!(summary.by_tag.len(), 7);
        let shown: Vec<_> = summary.by_tag.iter().take(TOP_ENTRIES).collect();
        assert_eq!(shown.len(), 5);
        assert_eq!(shown[0].label, "tag7");
        assert_eq!(shown[4].label, "tag3");
        assert!(shown.windows(2).all(|w| w[0].hours >= w[1].hours));

        let rendered = render(&summary);
        assert!(rendered.contains("tag7"));
        assert!(!rendered.contains("tag2"));
    }

    #[test]
    fn ties_keep_first_encountered_order() {
        let rows = vec![
            row("2024-01-02", "1", "first", "a"),
            row("2024-01-02", "1", "second", "b"),
        ];

        let summary = aggregate(&rows, 7, report_now());

        assert_eq!(summary.by_tag[0].label, "a");
        assert_eq!(summary.by_tag[1].label, "b");
    }

    #[test]
    fn empty_window_is_detectable() {
        let summary = aggregate(&[], 7, report_now());
        assert!(summary.is_empty());
    }
}
