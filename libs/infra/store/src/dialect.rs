// [libs/infra/store/src/dialect.rs]
//!
//! The original tool picked its integer-division operator and its 5-minute
//! time-bucket expression at runtime by branching on `db.dbname`. Here that
//! branch becomes a trait so each SQL fragment the pipeline builds is typed
//! against a `Dialect` instead of re-deriving the operator string inline.

/// The two SQL fragments that differ between the backend families the
/// pipeline targets.
pub trait Dialect: Send + Sync {
    /// Integer division of `a` by `b`, e.g. `/` in SQLite, `DIV` in MySQL.
    fn div_expr(&self, a: &str, b: &str) -> String;

    /// Floors `column` (a Unix-seconds timestamp) to the nearest multiple
    /// of `seconds`.
    fn time_bucket_expr(&self, column: &str, seconds: i64) -> String;
}

/// The runtime target: a SQLite-compatible embedded/remote engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn div_expr(&self, a: &str, b: &str) -> String {
        format!("({a} / {b})")
    }

    fn time_bucket_expr(&self, column: &str, seconds: i64) -> String {
        // `column` already holds Unix-epoch seconds (per the schema), so
        // flooring is plain integer arithmetic — no strftime conversion.
        // strftime('%s', N, 'utc') on a bare integer treats N as a Julian
        // day number, not epoch seconds, and would corrupt every bucket.
        format!("({column} - ({column} % {seconds}))")
    }
}

/// Kept to prove the abstraction is not accidentally single-backend; not
/// wired into the runtime store, which targets SQLite only.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn div_expr(&self, a: &str, b: &str) -> String {
        format!("({a} DIV {b})")
    }

    fn time_bucket_expr(&self, column: &str, seconds: i64) -> String {
        let minutes = seconds / 60;
        format!("SUBSTRING(TIMESTAMPADD(MINUTE, -(MINUTE({column}) % {minutes}), {column}), 1, 16)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_uses_the_slash_operator() {
        assert_eq!(SqliteDialect.div_expr("src", "256"), "(src / 256)");
    }

    #[test]
    fn mysql_uses_div() {
        assert_eq!(MySqlDialect.div_expr("src", "256"), "(src DIV 256)");
    }

    #[test]
    fn sqlite_time_bucket_is_plain_integer_flooring() {
        let expr = SqliteDialect.time_bucket_expr("timestamp", 300);
        assert_eq!(expr, "(timestamp - (timestamp % 300))");
    }

    #[test]
    fn sqlite_time_bucket_floors_to_the_nearest_5_minutes() {
        // Mirrors the expression's arithmetic in Rust against the example
        // from the concrete scenarios: 1_700_000_123 -> 1_700_000_100.
        let timestamp = 1_700_000_123_i64;
        let seconds = 300_i64;
        let bucketed = timestamp - (timestamp % seconds);
        assert_eq!(bucketed, 1_700_000_100);
    }
}
