//! Dashboard statistics derived from the activity log.

use gitdrive_core::{action, DriveError};
use rusqlite::params;
use serde::Serialize;
use std::collections::HashSet;
use time::{Date, Month, OffsetDateTime};

use crate::store::ActivityStore;

const MONTHS: usize = 6;
const DAY_SECONDS: i64 = 24 * 60 * 60;

/// One month of the trailing window, oldest first.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthBucket {
    /// Three-letter month name ("Jan").
    pub month: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    /// Distinct users active in the last 30 days.
    pub active_users: u64,
    /// File mutations in the last 24 hours.
    pub file_activities_24h: u64,
    /// Uploads per month over the trailing six months.
    pub monthly_uploads: Vec<MonthBucket>,
    /// Distinct active users per month over the trailing six months.
    pub user_activity: Vec<MonthBucket>,
}

fn month_abbrev(month: Month) -> &'static str {
    match month {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    }
}

fn previous_month(year: i32, month: Month) -> (i32, Month) {
    if month == Month::January {
        (year - 1, Month::December)
    } else {
        (year, month.previous())
    }
}

/// The trailing `MONTHS` (year, month) pairs ending at `now`, oldest
/// first.
fn month_window(now: OffsetDateTime) -> Vec<(i32, Month)> {
    let mut months = Vec::with_capacity(MONTHS);
    let (mut year, mut month) = (now.year(), now.month());
    for _ in 0..MONTHS {
        months.push((year, month));
        (year, month) = previous_month(year, month);
    }
    months.reverse();
    months
}

impl ActivityStore {
    pub fn dashboard_stats(&self, repo: Option<&str>) -> Result<DashboardStats, DriveError> {
        self.dashboard_stats_at(repo, OffsetDateTime::now_utc())
    }

    fn dashboard_stats_at(
        &self,
        repo: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<DashboardStats, DriveError> {
        let months = month_window(now);
        let (oldest_year, oldest_month) = months[0];
        let window_start = Date::from_calendar_date(oldest_year, oldest_month, 1)
            .map_err(|e| DriveError::Storage(format!("invalid window date: {e}")))?
            .midnight()
            .assume_utc()
            .unix_timestamp();
        let now_unix = now.unix_timestamp();

        let repo_filter = repo.unwrap_or("");
        let rows: Vec<(String, String, i64)> = {
            let conn = self.conn()?;
            let mut stmt = conn
                .prepare(
                    "SELECT action, user_email, ts_unix FROM logs
                     WHERE ts_unix >= ?1 AND (?2 = '' OR repo_full_name = ?2)",
                )
                .map_err(|e| DriveError::Storage(e.to_string()))?;
            let mapped = stmt
                .query_map(params![window_start, repo_filter], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })
                .map_err(|e| DriveError::Storage(e.to_string()))?;
            mapped
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| DriveError::Storage(e.to_string()))?
        };

        let mutating = [
            action::UPLOAD,
            action::DELETE,
            action::MOVE,
            action::CREATE_FOLDER,
        ];
        let mut uploads = vec![0u64; MONTHS];
        let mut users_by_month: Vec<HashSet<&str>> = vec![HashSet::new(); MONTHS];
        let mut active_users: HashSet<&str> = HashSet::new();
        let mut file_activities_24h = 0u64;

        for (act, email, ts_unix) in &rows {
            if *ts_unix >= now_unix - 30 * DAY_SECONDS {
                active_users.insert(email);
            }
            if *ts_unix >= now_unix - DAY_SECONDS && mutating.contains(&act.as_str()) {
                file_activities_24h += 1;
            }
            let Ok(when) = OffsetDateTime::from_unix_timestamp(*ts_unix) else {
                continue;
            };
            let Some(idx) = months
                .iter()
                .position(|(y, m)| *y == when.year() && *m == when.month())
            else {
                continue;
            };
            if act == action::UPLOAD {
                uploads[idx] += 1;
            }
            users_by_month[idx].insert(email);
        }

        let bucket = |counts: Vec<u64>| {
            months
                .iter()
                .zip(counts)
                .map(|((_, month), count)| MonthBucket {
                    month: month_abbrev(*month).to_string(),
                    count,
                })
                .collect::<Vec<_>>()
        };
        let user_counts: Vec<u64> = users_by_month.iter().map(|s| s.len() as u64).collect();

        Ok(DashboardStats {
            active_users: active_users.len() as u64,
            file_activities_24h,
            monthly_uploads: bucket(uploads),
            user_activity: bucket(user_counts),
        })
    }
}
