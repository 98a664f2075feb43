use std::collections::BTreeMap;

use serde::Serialize;
use time::macros::format_description;
use time::{Date, Duration, Weekday};

use crate::response::ApiError;

const ISO_DATE: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

pub fn parse_iso_date(value: &str, field: &str) -> Result<Date, ApiError> {
    Date::parse(value, ISO_DATE)
        .map_err(|_| ApiError::field(field, "Invalid date format. Expected YYYY-MM-DD."))
}

pub fn format_iso_date(date: Date) -> String {
    date.format(ISO_DATE).expect("ISO date formatting cannot fail")
}

fn day_abbrev(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Monday => "MON",
        Weekday::Tuesday => "TUE",
        Weekday::Wednesday => "WED",
        Weekday::Thursday => "THU",
        Weekday::Friday => "FRI",
        Weekday::Saturday => "SAT",
        Weekday::Sunday => "SUN",
    }
}

/// Inclusive report interval, from either a relative `Nd` window ending today
/// or an explicit start/end pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRange {
    pub start: Date,
    pub end: Date,
}

pub fn resolve_range(
    range: Option<&str>,
    start_date: Option<&str>,
    end_date: Option<&str>,
    today: Date,
) -> Result<ReportRange, ApiError> {
    if let Some(range) = range {
        let days = range
            .strip_suffix('d')
            .and_then(|n| n.parse::<i64>().ok())
            .ok_or_else(|| ApiError::field("range", "Invalid range format. Example: 7d, 30d"))?;
        if days <= 0 {
            return Err(ApiError::field("range", "Range must be greater than 0 days."));
        }
        let end = today;
        let start = end - Duration::days(days - 1);
        return Ok(ReportRange { start, end });
    }

    if start_date.is_some() || end_date.is_some() {
        let (Some(start_date), Some(end_date)) = (start_date, end_date) else {
            return Err(ApiError::BadRequest(
                "Both start_date and end_date are required.".into(),
            ));
        };
        let start = parse_iso_date(start_date, "start_date")?;
        let end = parse_iso_date(end_date, "end_date")?;
        if start > end {
            return Err(ApiError::BadRequest(
                "start_date cannot be greater than end_date.".into(),
            ));
        }
        // An end date past today is allowed; trailing days simply report no
        // entries.
        return Ok(ReportRange { start, end });
    }

    Err(ApiError::BadRequest(
        "Provide either ?range=7d OR ?start_date=YYYY-MM-DD&end_date=YYYY-MM-DD.".into(),
    ))
}

#[derive(Debug, Serialize)]
pub struct RangeInfo {
    pub start_date: String,
    pub end_date: String,
    pub total_days: i64,
}

#[derive(Debug, Serialize)]
pub struct StreakInfo {
    pub current_days: u32,
    pub last_mood_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DayMood {
    pub date: String,
    pub day: String,
    pub avg_mood: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ActivityLog {
    pub active_days: Vec<u8>,
}

#[derive(Debug, Serialize)]
pub struct MoodReport {
    pub range: RangeInfo,
    pub streak: StreakInfo,
    pub mood_history: Vec<DayMood>,
    pub activity_log: ActivityLog,
}

/// Pure aggregation over (date, score) rows within the inclusive interval.
///
/// Written as group-and-average even though the one-entry-per-day constraint
/// makes each group a singleton today.
pub fn build_report(range: ReportRange, rows: &[(Date, i16)]) -> MoodReport {
    let mut sums: BTreeMap<Date, (i64, i64)> = BTreeMap::new();
    for (date, score) in rows {
        if *date < range.start || *date > range.end {
            continue;
        }
        let entry = sums.entry(*date).or_insert((0, 0));
        entry.0 += i64::from(*score);
        entry.1 += 1;
    }

    let averages: BTreeMap<Date, f64> = sums
        .iter()
        .map(|(date, (sum, n))| {
            let avg = (*sum as f64 / *n as f64 * 100.0).round() / 100.0;
            (*date, avg)
        })
        .collect();

    let total_days = (range.end - range.start).whole_days() + 1;

    let mut mood_history = Vec::with_capacity(total_days as usize);
    let mut cursor = range.start;
    while cursor <= range.end {
        mood_history.push(DayMood {
            date: format_iso_date(cursor),
            day: day_abbrev(cursor.weekday()).to_string(),
            avg_mood: averages.get(&cursor).copied(),
        });
        cursor += Duration::days(1);
    }

    // The streak anchors at the latest entered date in range, not the range
    // end, and walks backward until the first missing day.
    let last_mood_date = averages.keys().next_back().copied();
    let mut current_days = 0u32;
    if let Some(last) = last_mood_date {
        let mut check = last;
        while averages.contains_key(&check) {
            current_days += 1;
            check -= Duration::days(1);
        }
    }

    let active_days: Vec<u8> = averages.keys().map(|d| d.day()).collect();

    MoodReport {
        range: RangeInfo {
            start_date: format_iso_date(range.start),
            end_date: format_iso_date(range.end),
            total_days,
        },
        streak: StreakInfo {
            current_days,
            last_mood_date: last_mood_date.map(format_iso_date),
        },
        mood_history,
        activity_log: ActivityLog { active_days },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn range(start: Date, end: Date) -> ReportRange {
        ReportRange { start, end }
    }

    #[test]
    fn relative_range_ends_today() {
        let today = date!(2024 - 03 - 10);
        let r = resolve_range(Some("7d"), None, None, today).unwrap();
        assert_eq!(r.end, today);
        assert_eq!(r.start, date!(2024 - 03 - 04));
    }

    #[test]
    fn zero_and_negative_ranges_are_rejected() {
        let today = date!(2024 - 03 - 10);
        assert!(resolve_range(Some("0d"), None, None, today).is_err());
        assert!(resolve_range(Some("-3d"), None, None, today).is_err());
        assert!(resolve_range(Some("weekly"), None, None, today).is_err());
    }

    #[test]
    fn lone_bound_is_rejected() {
        let today = date!(2024 - 03 - 10);
        assert!(resolve_range(None, Some("2024-01-01"), None, today).is_err());
        assert!(resolve_range(None, None, Some("2024-01-05"), today).is_err());
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let today = date!(2024 - 03 - 10);
        let err = resolve_range(None, Some("2024-01-05"), Some("2024-01-01"), today).unwrap_err();
        assert!(matches!(err, crate::response::ApiError::BadRequest(_)));
    }

    #[test]
    fn missing_parameters_are_rejected() {
        let today = date!(2024 - 03 - 10);
        assert!(resolve_range(None, None, None, today).is_err());
    }

    #[test]
    fn future_end_date_is_allowed() {
        let today = date!(2024 - 03 - 10);
        let r = resolve_range(None, Some("2024-03-01"), Some("2024-04-01"), today).unwrap();
        assert_eq!(r.end, date!(2024 - 04 - 01));
    }

    #[test]
    fn malformed_dates_are_rejected() {
        let today = date!(2024 - 03 - 10);
        assert!(resolve_range(None, Some("01/01/2024"), Some("2024-01-05"), today).is_err());
    }

    #[test]
    fn streak_stops_at_gap() {
        // entries on Jan 1-3, gap on Jan 4, entry on Jan 5
        let rows = [
            (date!(2024 - 01 - 01), 3),
            (date!(2024 - 01 - 02), 2),
            (date!(2024 - 01 - 03), 4),
            (date!(2024 - 01 - 05), 1),
        ];
        let report = build_report(range(date!(2024 - 01 - 01), date!(2024 - 01 - 05)), &rows);

        assert_eq!(report.streak.current_days, 1);
        assert_eq!(report.streak.last_mood_date.as_deref(), Some("2024-01-05"));
        assert_eq!(report.activity_log.active_days, vec![1, 2, 3, 5]);
        assert_eq!(report.range.total_days, 5);
        assert_eq!(report.mood_history.len(), 5);
        assert_eq!(report.mood_history[3].date, "2024-01-04");
        assert_eq!(report.mood_history[3].avg_mood, None);
        assert_eq!(report.mood_history[4].avg_mood, Some(1.0));
    }

    #[test]
    fn streak_anchors_at_latest_entry_not_range_end() {
        // range runs to Jan 7 but the last entry is Jan 5
        let rows = [
            (date!(2024 - 01 - 04), 2),
            (date!(2024 - 01 - 05), 3),
        ];
        let report = build_report(range(date!(2024 - 01 - 01), date!(2024 - 01 - 07)), &rows);

        assert_eq!(report.streak.current_days, 2);
        assert_eq!(report.streak.last_mood_date.as_deref(), Some("2024-01-05"));
    }

    #[test]
    fn empty_range_reports_zero_streak() {
        let report = build_report(range(date!(2024 - 01 - 01), date!(2024 - 01 - 07)), &[]);

        assert_eq!(report.streak.current_days, 0);
        assert_eq!(report.streak.last_mood_date, None);
        assert_eq!(report.range.total_days, 7);
        assert!(report.mood_history.iter().all(|d| d.avg_mood.is_none()));
        assert!(report.activity_log.active_days.is_empty());
    }

    #[test]
    fn single_day_range() {
        let rows = [(date!(2024 - 02 - 29), 4)];
        let report = build_report(range(date!(2024 - 02 - 29), date!(2024 - 02 - 29)), &rows);

        assert_eq!(report.range.total_days, 1);
        assert_eq!(report.streak.current_days, 1);
        assert_eq!(report.mood_history[0].avg_mood, Some(4.0));
        assert_eq!(report.mood_history[0].day, "THU");
    }

    #[test]
    fn unbroken_run_counts_fully() {
        let rows: Vec<(Date, i16)> = (1..=7)
            .map(|d| (Date::from_calendar_date(2024, time::Month::January, d).unwrap(), 2))
            .collect();
        let report = build_report(range(date!(2024 - 01 - 01), date!(2024 - 01 - 07)), &rows);
        assert_eq!(report.streak.current_days, 7);
    }

    #[test]
    fn averages_round_to_two_decimals() {
        // two rows on one date exercises the group-and-average path
        let rows = [
            (date!(2024 - 01 - 02), 1),
            (date!(2024 - 01 - 02), 2),
            (date!(2024 - 01 - 02), 2),
        ];
        let report = build_report(range(date!(2024 - 01 - 01), date!(2024 - 01 - 02)), &rows);
        assert_eq!(report.mood_history[1].avg_mood, Some(1.67));
    }

    #[test]
    fn rows_outside_range_are_ignored() {
        let rows = [
            (date!(2023 - 12 - 31), 4),
            (date!(2024 - 01 - 01), 2),
            (date!(2024 - 01 - 09), 4),
        ];
        let report = build_report(range(date!(2024 - 01 - 01), date!(2024 - 01 - 07)), &rows);
        assert_eq!(report.activity_log.active_days, vec![1]);
    }
}
