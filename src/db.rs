use anyhow::Result;
use sea_orm::{ConnectionTrait, DatabaseConnection, SqlxPostgresConnector, Statement};
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use tokio::fs;

pub type DbPool = sqlx::PgPool;
pub type OrmConn = DatabaseConnection;

/// Create the sqlx pool used for raw queries.
pub async fn create_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Wrap an existing sqlx pool so SeaORM and raw queries share connections.
pub fn orm_from_pool(pool: DbPool) -> OrmConn {
    SqlxPostgresConnector::from_sqlx_postgres_pool(pool)
}

/// Create a SeaORM connection with its own pool.
pub async fn create_orm_conn(database_url: &str) -> Result<DatabaseConnection> {
    let pool = create_pool(database_url).await?;
    Ok(orm_from_pool(pool))
}

/// Minimal migration runner that executes SQL files in `migrations/` in filename order.
///
/// Every statement uses `IF NOT EXISTS`, so re-running is harmless.
pub async fn run_migrations(conn: &DatabaseConnection) -> Result<()> {
    let mut entries = fs::read_dir("migrations").await?;
    let mut files: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path);
        }
    }
    files.sort();

    let backend = conn.get_database_backend();
    for file in files {
        tracing::debug!(file = %file.display(), "applying migration");
        let sql = fs::read_to_string(&file).await?;
        // Postgres prepared statements cannot contain multiple commands,
        // so split the migration file and run each statement individually.
        for stmt in split_statements(&sql) {
            conn.execute(Statement::from_string(backend, stmt)).await?;
        }
    }

    Ok(())
}

/// Escapes LIKE metacharacters (backslash is the escape) so user input matches literally.
pub fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn split_statements(sql: &str) -> Vec<String> {
    sql.lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
        .split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .map(|stmt| format!("{stmt};"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{escape_like, split_statements};

    #[test]
    fn splits_and_skips_comments() {
        let sql = "-- users; table\nCREATE TABLE a (id INT);\n\n  CREATE INDEX b ON a (id);\n";
        let stmts = split_statements(sql);
        assert_eq!(
            stmts,
            vec!["CREATE TABLE a (id INT);", "CREATE INDEX b ON a (id);"]
        );
    }

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("salt"), "salt");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
