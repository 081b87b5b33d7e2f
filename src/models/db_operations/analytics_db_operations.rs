use super::parse_column;
use crate::models::PostCategory;
use rusqlite::{Connection, Result as RusqliteResult};
use std::collections::HashMap;

pub struct Totals {
    pub total_posts: i64,
    pub published_posts: i64,
    pub total_comments: i64,
    pub approved_comments: i64,
}

pub fn read_totals(conn: &Connection) -> RusqliteResult<Totals> {
    conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM posts),
            (SELECT COUNT(*) FROM posts WHERE is_published = 1),
            (SELECT COUNT(*) FROM comments),
            (SELECT COUNT(*) FROM comments WHERE is_approved = 1)",
        [],
        |row| {
            Ok(Totals {
                total_posts: row.get(0)?,
                published_posts: row.get(1)?,
                total_comments: row.get(2)?,
                approved_comments: row.get(3)?,
            })
        },
    )
}

pub fn read_posts_per_category(conn: &Connection) -> RusqliteResult<HashMap<PostCategory, i64>> {
    let mut stmt = conn.prepare("SELECT category, COUNT(*) FROM posts GROUP BY category")?;
    let counts = stmt
        .query_map([], |row| Ok((parse_column::<PostCategory>(row, 0)?, row.get(1)?)))?
        .collect::<RusqliteResult<HashMap<_, _>>>()?;
    Ok(counts)
}

/// Counts keyed by `YYYY-MM` for rows created on or after `since` (a `YYYY-MM` prefix).
pub fn read_monthly_counts(conn: &Connection, table: MonthlyTable, since: &str) -> RusqliteResult<HashMap<String, i64>> {
    let (table_name, column) = match table {
        MonthlyTable::Posts => ("posts", "uploaded_at"),
        MonthlyTable::Comments => ("comments", "created_at"),
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT substr({col}, 1, 7) AS month, COUNT(*) FROM {table} WHERE substr({col}, 1, 7) >= ?1 GROUP BY month",
        col = column,
        table = table_name
    ))?;
    let counts = stmt
        .query_map([since], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<RusqliteResult<HashMap<_, _>>>()?;
    Ok(counts)
}

#[derive(Debug, Clone, Copy)]
pub enum MonthlyTable {
    Posts,
    Comments,
}
