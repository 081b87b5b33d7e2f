use crate::models::db_operations::analytics_db_operations::{self, MonthlyTable};
use crate::models::db_operations::{users_db_operations, DbError};
use crate::models::{Analytics, CategoryStat, MonthlyStat, PostCategory};
use chrono::{DateTime, Datelike, Utc};
use rusqlite::Connection;

const MONTHS_SHOWN: u32 = 6;

/// `YYYY-MM` keys for the last `count` months, oldest first, ending at `now`.
pub fn trailing_months(now: DateTime<Utc>, count: u32) -> Vec<String> {
    let current = now.year() * 12 + now.month0() as i32;
    (0..count as i32)
        .rev()
        .map(|back| {
            let m = current - back;
            format!("{:04}-{:02}", m.div_euclid(12), m.rem_euclid(12) + 1)
        })
        .collect()
}

/// Dashboard numbers: totals, per-category counts and a six month activity series.
pub fn build_analytics(conn: &Connection, now: DateTime<Utc>) -> Result<Analytics, DbError> {
    let totals = analytics_db_operations::read_totals(conn)?;
    let total_users = users_db_operations::count_users(conn)?;

    let per_category = analytics_db_operations::read_posts_per_category(conn)?;
    let category_stats = PostCategory::ALL
        .iter()
        .map(|c| CategoryStat {
            category: *c,
            label: c.label(),
            count: per_category.get(c).copied().unwrap_or(0),
        })
        .collect();

    let months = trailing_months(now, MONTHS_SHOWN);
    let since = months.first().cloned().unwrap_or_default();
    let posts = analytics_db_operations::read_monthly_counts(conn, MonthlyTable::Posts, &since)?;
    let comments = analytics_db_operations::read_monthly_counts(conn, MonthlyTable::Comments, &since)?;
    let monthly_stats = months
        .into_iter()
        .map(|month| MonthlyStat {
            posts: posts.get(&month).copied().unwrap_or(0),
            comments: comments.get(&month).copied().unwrap_or(0),
            month,
        })
        .collect();

    Ok(Analytics {
        total_posts: totals.total_posts,
        published_posts: totals.published_posts,
        total_comments: totals.total_comments,
        approved_comments: totals.approved_comments,
        total_users,
        category_stats,
        monthly_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn trailing_months_cross_year_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 2, 15, 0, 0, 0).unwrap();
        assert_eq!(
            trailing_months(now, 6),
            vec!["2023-09", "2023-10", "2023-11", "2023-12", "2024-01", "2024-02"]
        );
    }
}
