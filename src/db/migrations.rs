use std::collections::HashSet;
use std::path::{Path, PathBuf};

use deadpool_postgres::Pool;

use super::error::DbError;

pub const MIGRATIONS_DIR: &str = "migrations";

pub async fn run(pool: &Pool, dir: &Path) -> Result<(), DbError> {
    let client = pool.get().await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                id SERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )",
            &[],
        )
        .await?;

    let rows = client.query("SELECT name FROM _migrations", &[]).await?;
    let applied: HashSet<String> = rows.iter().map(|row| row.get(0)).collect();

    if !dir.exists() {
        tracing::info!("No migrations directory at {}, skipping migrations", dir.display());
        return Ok(());
    }

    for (name, path) in pending(dir, &applied)? {
        let sql = std::fs::read_to_string(&path)?;

        let mut client = pool.get().await?;
        let tx = client.transaction().await?;

        tx.batch_execute(&sql).await.map_err(|e| {
            DbError::MigrationError(format!("Failed to run migration {}: {}", name, e))
        })?;

        tx.execute("INSERT INTO _migrations (name) VALUES ($1)", &[&name])
            .await?;

        tx.commit().await?;

        tracing::info!("Applied migration: {}", name);
    }

    tracing::info!("All migrations up to date");
    Ok(())
}

/// `.sql` files in `dir` not yet recorded in `applied`, sorted by file name.
fn pending(dir: &Path, applied: &HashSet<String>) -> Result<Vec<(String, PathBuf)>, DbError> {
    let mut entries: Vec<(String, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|x| x == "sql").unwrap_or(false))
        .filter_map(|p| {
            let name = p.file_name()?.to_string_lossy().to_string();
            Some((name, p))
        })
        .filter(|(name, _)| !applied.contains(name))
        .collect();

    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}
