//! Read-side records: aggregates, daily summaries and exports.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{Identity, SubjectKind};
use crate::session::{Session, millis_to_seconds};

/// Lifetime totals for one identity.
///
/// `total_duration_ms` is the exact sum; `total_duration` is the same value
/// in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppAggregate {
    pub subject_kind: SubjectKind,
    pub identity: Identity,
    pub total_duration: f64,
    pub total_duration_ms: i64,
    pub session_count: i64,
    pub last_used: DateTime<Utc>,
}

impl AppAggregate {
    pub fn new(
        subject_kind: SubjectKind,
        identity: Identity,
        total_duration_ms: i64,
        session_count: i64,
        last_used: DateTime<Utc>,
    ) -> Self {
        Self {
            subject_kind,
            identity,
            total_duration: millis_to_seconds(total_duration_ms),
            total_duration_ms,
            session_count,
            last_used,
        }
    }
}

/// Focus statistics for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    /// Seconds of window focus.
    pub total_active_time: f64,
    /// Seconds spent idle, summed from idle transitions.
    pub total_idle_time: f64,
    /// Distinct window identities seen.
    pub app_count: i64,
    /// Percentage of tracked time that was active.
    pub focus_efficiency: f64,
}

impl DailySummary {
    pub fn new(date: NaiveDate, total_active_time: f64, total_idle_time: f64, app_count: i64) -> Self {
        Self {
            date,
            total_active_time,
            total_idle_time,
            app_count,
            focus_efficiency: focus_efficiency(total_active_time, total_idle_time),
        }
    }
}

/// `100 * active / (active + idle)`, or 0 when nothing was tracked.
pub fn focus_efficiency(active: f64, idle: f64) -> f64 {
    let total = active + idle;
    if total <= 0.0 {
        return 0.0;
    }
    100.0 * active / total
}

/// Everything the reporting layer exports for a time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Export {
    pub sessions: Vec<Session>,
    pub browser_sessions: Vec<Session>,
    pub aggregates: Vec<AppAggregate>,
    pub summary: DailySummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn efficiency_of_three_quarters() {
        assert!((focus_efficiency(3600.0, 1200.0) - 75.0).abs() < 1e-9);
    }

    #[test]
    fn efficiency_is_zero_without_tracked_time() {
        assert!(focus_efficiency(0.0, 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn all_idle_is_zero_efficiency() {
        assert!(focus_efficiency(0.0, 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn daily_summary_computes_efficiency() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let summary = DailySummary::new(date, 3600.0, 1200.0, 4);
        assert!((summary.focus_efficiency - 75.0).abs() < 1e-9);
        assert_eq!(summary.app_count, 4);
    }
}
