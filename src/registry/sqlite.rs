// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::BTreeSet;
use std::path::Path;
use crate::registry::{
    models::{ErrorStatus, InstallationStatus, ServerType, WorkshopMod},
    traits::ModStore,
};
use tracing::{debug, error, info, warn};

pub struct SqliteModStore {
    pool: SqlitePool,
}

/// Explicit column list; `SELECT *` on a table altered by `migrate_schema`
/// yields rows whose column count the cached statement does not expect
const SELECT_MOD: &str = "SELECT id, name, server_type, installation_status, error_status, key_files, file_size, last_updated, server_only, published_name FROM workshop_mods";

const UPSERT_MOD: &str = r#"
    INSERT INTO workshop_mods (id, name, server_type, installation_status, error_status, key_files, file_size, last_updated, server_only, published_name)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
    ON CONFLICT(id) DO UPDATE SET
        name = excluded.name,
        server_type = excluded.server_type,
        installation_status = excluded.installation_status,
        error_status = excluded.error_status,
        key_files = excluded.key_files,
        file_size = excluded.file_size,
        last_updated = excluded.last_updated,
        server_only = excluded.server_only,
        published_name = excluded.published_name
"#;

const UPDATE_MOD: &str = r#"
    UPDATE workshop_mods
    SET name = ?2, server_type = ?3, installation_status = ?4, error_status = ?5, key_files = ?6, file_size = ?7, last_updated = ?8, server_only = ?9, published_name = ?10
    WHERE id = ?1
"#;

// Only backfills installed mods that still lack a size
const UPDATE_FILE_SIZE: &str = r#"
    UPDATE workshop_mods
    SET file_size = ?2
    WHERE id = ?1 AND installation_status = 'FINISHED' AND COALESCE(file_size, 0) = 0
"#;

/// Columns added after the first release, with their definitions
const ADDED_COLUMNS: [(&str, &str); 2] = [
    ("file_size", "INTEGER"),
    ("published_name", "TEXT"),
];

/// Column values of a mod in the order used by `UPSERT_MOD` and `UPDATE_MOD`
struct ModColumns {
    id: i64,
    name: String,
    server_type: Option<&'static str>,
    installation_status: &'static str,
    error_status: Option<&'static str>,
    key_files: String,
    file_size: Option<i64>,
    last_updated: Option<String>,
    server_only: bool,
    published_name: Option<String>,
}

impl ModColumns {
    fn from_mod(workshop_mod: &WorkshopMod) -> anyhow::Result<Self> {
        Ok(Self {
            id: i64::try_from(workshop_mod.id)?,
            name: workshop_mod.name.clone(),
            server_type: workshop_mod.server_type.map(ServerType::as_str),
            installation_status: workshop_mod.installation_status.as_str(),
            error_status: workshop_mod.error_status.map(ErrorStatus::as_str),
            key_files: serde_json::to_string(&workshop_mod.key_files)?,
            file_size: workshop_mod.file_size.map(i64::try_from).transpose()?,
            last_updated: workshop_mod.last_updated.map(|t| t.to_rfc3339()),
            server_only: workshop_mod.server_only,
            published_name: workshop_mod.published_name.clone(),
        })
    }

    fn bind<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        query
            .bind(self.id)
            .bind(&self.name)
            .bind(self.server_type)
            .bind(self.installation_status)
            .bind(self.error_status)
            .bind(&self.key_files)
            .bind(self.file_size)
            .bind(&self.last_updated)
            .bind(self.server_only)
            .bind(&self.published_name)
    }
}

impl SqliteModStore {
    pub async fn new(db_path: &Path) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let store = Self { pool };
        store.init_schema().await?;

        Ok(store)
    }

    /// Private in-memory database. The pool is pinned to one connection that
    /// never expires, otherwise every new connection would see an empty database.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init_schema().await?;

        Ok(store)
    }

    async fn init_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workshop_mods (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                server_type TEXT,
                installation_status TEXT NOT NULL,
                error_status TEXT,
                key_files TEXT NOT NULL DEFAULT '[]',
                file_size INTEGER,
                last_updated TEXT,
                server_only INTEGER NOT NULL DEFAULT 0,
                published_name TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        self.migrate_schema().await?;

        info!("Initialized SQLite mod store schema");
        Ok(())
    }

    async fn migrate_schema(&self) -> anyhow::Result<()> {
        for (column, definition) in ADDED_COLUMNS {
            let result = sqlx::query(&format!("SELECT {} FROM workshop_mods LIMIT 1", column))
                .fetch_optional(&self.pool)
                .await;

            if result.is_err() {
                info!(column, "Migrating database schema: adding column");

                sqlx::query(&format!("ALTER TABLE workshop_mods ADD COLUMN {} {}", column, definition))
                    .execute(&self.pool)
                    .await?;

                if column == "file_size" {
                    warn!("Database migrated. Sizes of installed mods will be recalculated on the next listing.");
                }
            }
        }

        Ok(())
    }

    fn mod_from_row(&self, row: &SqliteRow) -> anyhow::Result<WorkshopMod> {
        use chrono::DateTime;

        let id: i64 = row.try_get("id")?;

        let server_type = match row.try_get::<Option<String>, _>("server_type")? {
            Some(value) => match value.parse::<ServerType>() {
                Ok(server_type) => Some(server_type),
                Err(e) => {
                    warn!(mod_id = id, error = %e, "Unknown server_type, leaving it unset");
                    None
                }
            },
            None => None,
        };

        let status_str: String = row.try_get("installation_status")?;
        let installation_status = status_str.parse::<InstallationStatus>().unwrap_or_else(|e| {
            warn!(mod_id = id, error = %e, "Unknown installation_status, defaulting to NOT_INSTALLED");
            InstallationStatus::NotInstalled
        });

        let error_status = row
            .try_get::<Option<String>, _>("error_status")?
            .and_then(|value| value.parse::<ErrorStatus>().ok());

        // A record in ERROR must carry a reason
        let error_status = match (installation_status, error_status) {
            (InstallationStatus::Error, None) => Some(ErrorStatus::Generic),
            (InstallationStatus::Error, status) => status,
            _ => None,
        };

        let key_files: BTreeSet<String> =
            serde_json::from_str(&row.try_get::<String, _>("key_files")?)?;

        let last_updated = row
            .try_get::<Option<String>, _>("last_updated")?
            .map(|value| DateTime::parse_from_rfc3339(&value))
            .transpose()?
            .map(|t| t.with_timezone(&chrono::Utc));

        Ok(WorkshopMod {
            id: u64::try_from(id)?,
            name: row.try_get("name")?,
            server_type,
            installation_status,
            error_status,
            key_files,
            file_size: row
                .try_get::<Option<i64>, _>("file_size")?
                .map(|size| size.max(0) as u64),
            last_updated,
            server_only: row.try_get("server_only")?,
            published_name: row.try_get("published_name")?,
        })
    }

    fn mods_from_rows(&self, rows: Vec<SqliteRow>) -> Vec<WorkshopMod> {
        let mut mods = Vec::with_capacity(rows.len());
        for row in rows {
            match self.mod_from_row(&row) {
                Ok(workshop_mod) => mods.push(workshop_mod),
                Err(e) => {
                    error!(error = %e, "Failed to parse workshop mod from database");
                }
            }
        }
        mods
    }
}

#[async_trait]
impl ModStore for SqliteModStore {
    async fn get_mod(&self, id: u64) -> anyhow::Result<Option<WorkshopMod>> {
        let row = sqlx::query(&format!("{} WHERE id = ?1", SELECT_MOD))
            .bind(i64::try_from(id)?)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.mod_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_mods(&self) -> anyhow::Result<Vec<WorkshopMod>> {
        let rows = sqlx::query(&format!("{} ORDER BY id", SELECT_MOD))
            .fetch_all(&self.pool)
            .await?;

        Ok(self.mods_from_rows(rows))
    }

    async fn list_mods_for_server(&self, server_type: ServerType) -> anyhow::Result<Vec<WorkshopMod>> {
        let rows = sqlx::query(&format!("{} WHERE server_type = ?1 ORDER BY id", SELECT_MOD))
            .bind(server_type.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(self.mods_from_rows(rows))
    }

    async fn save_all_mods(&self, mods: &[WorkshopMod]) -> anyhow::Result<()> {
        let columns = mods
            .iter()
            .map(ModColumns::from_mod)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut tx = self.pool.begin().await?;
        for column in &columns {
            column.bind(sqlx::query(UPSERT_MOD)).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(count = mods.len(), "Saved workshop mods");
        Ok(())
    }

    async fn update_mod(&self, workshop_mod: &WorkshopMod) -> anyhow::Result<bool> {
        let columns = ModColumns::from_mod(workshop_mod)?;
        let result = columns.bind(sqlx::query(UPDATE_MOD)).execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_file_size(&self, id: u64, file_size: u64) -> anyhow::Result<bool> {
        let result = sqlx::query(UPDATE_FILE_SIZE)
            .bind(i64::try_from(id)?)
            .bind(i64::try_from(file_size)?)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_server_only(&self, id: u64, server_only: bool) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE workshop_mods SET server_only = ?2 WHERE id = ?1")
            .bind(i64::try_from(id)?)
            .bind(server_only)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_mod(&self, id: u64) -> anyhow::Result<()> {
        let result = sqlx::query("DELETE FROM workshop_mods WHERE id = ?1")
            .bind(i64::try_from(id)?)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            info!(mod_id = id, "Removed mod from store");
        }

        Ok(())
    }
}
