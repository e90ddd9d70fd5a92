#![forbid(unsafe_code)]

mod indexes;
pub(super) mod mysql;
pub(super) mod postgres;
mod pragmas;
pub(super) mod sqlite;

pub(super) fn full_sqlite_sql() -> String {
    let mut sql = String::new();
    sql.push_str(pragmas::SQL);
    sql.push_str(sqlite::SQL);
    sql.push_str(indexes::SQL);
    sql
}
