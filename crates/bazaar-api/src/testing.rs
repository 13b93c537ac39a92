use bazaar_db::Database;

use crate::auth::{AppState, AppStateInner};

pub(crate) const SECRET: &str = "test-secret";

/// Fresh in-memory state with one user per name; ids follow the name order.
pub(crate) fn state_with_users(names: &[&str]) -> (AppState, Vec<i64>) {
    let db = Database::open_in_memory().unwrap();
    let ids = names
        .iter()
        .map(|name| db.create_user(name, "not-a-real-hash").unwrap())
        .collect();
    (AppStateInner::new(db, SECRET), ids)
}

pub(crate) fn count(state: &AppState, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    state
        .db
        .with_conn(|conn| Ok(conn.query_row(&sql, [], |r| r.get(0))?))
        .unwrap()
}
