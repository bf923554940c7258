use std::path::Path;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::RunQueryDsl;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::archetypes::ArchetypeProfile;
use crate::domains::campaign::{Campaign, CampaignDraft};
use crate::error::{Result, StudioError};

mod schema;
use schema::campaigns;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Queryable)]
struct CampaignRow {
    id: i32,
    user_id: String,
    name: String,
    archetype: String,
    brand_json: String,
    icp_json: Option<String>,
    channels_json: String,
    assets_json: String,
    created_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = campaigns)]
struct NewCampaign<'a> {
    user_id: &'a str,
    name: &'a str,
    archetype: &'a str,
    brand_json: &'a str,
    icp_json: Option<&'a str>,
    channels_json: &'a str,
    assets_json: &'a str,
    created_at: i64,
}

/// SQLite-backed campaign history.
pub struct CampaignStore {
    pool: SqlitePool,
}

impl CampaignStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let sqlite_path = sqlite_path.as_ref();
        ensure_parent_dir(sqlite_path)?;
        run_migrations(sqlite_path).await?;

        let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(sqlite_path);
        let pool: SqlitePool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| StudioError::Storage(e.to_string()))?;
        tracing::debug!(path = sqlite_path, "Opened campaign store");
        Ok(Self { pool })
    }

    pub async fn save(&self, draft: &CampaignDraft) -> Result<Campaign> {
        let brand_json = serde_json::to_string(&draft.brand)?;
        let icp_json = draft
            .icp
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let channels_json = serde_json::to_string(&draft.channels)?;
        let assets_json = serde_json::to_string(&draft.assets)?;

        let new = NewCampaign {
            user_id: &draft.user_id,
            name: &draft.name,
            archetype: draft.archetype.key(),
            brand_json: &brand_json,
            icp_json: icp_json.as_deref(),
            channels_json: &channels_json,
            assets_json: &assets_json,
            created_at: chrono::Utc::now().timestamp(),
        };

        let mut conn = self.conn().await?;
        let row: CampaignRow = diesel::insert_into(campaigns::table)
            .values(&new)
            .get_result(&mut conn)
            .await
            .map_err(|e| StudioError::Storage(e.to_string()))?;
        let campaign = map_row(row)?;
        tracing::info!(
            campaign_id = campaign.id,
            user_id = %campaign.user_id,
            archetype = %campaign.archetype,
            assets = campaign.assets.len(),
            "Saved campaign"
        );
        Ok(campaign)
    }

    pub async fn get(&self, id: i32) -> Result<Option<Campaign>> {
        let mut conn = self.conn().await?;
        let row: Option<CampaignRow> = campaigns::table
            .filter(campaigns::id.eq(id))
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| StudioError::Storage(e.to_string()))?;
        row.map(map_row).transpose()
    }

    /// Newest first.
    pub async fn list(&self, user_id: &str, limit: usize) -> Result<Vec<Campaign>> {
        let mut conn = self.conn().await?;
        let rows: Vec<CampaignRow> = campaigns::table
            .filter(campaigns::user_id.eq(user_id))
            .order((campaigns::created_at.desc(), campaigns::id.desc()))
            .limit(limit as i64)
            .load(&mut conn)
            .await
            .map_err(|e| StudioError::Storage(e.to_string()))?;
        rows.into_iter().map(map_row).collect()
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let mut conn = self.conn().await?;
        let count = diesel::delete(campaigns::table.filter(campaigns::id.eq(id)))
            .execute(&mut conn)
            .await
            .map_err(|e| StudioError::Storage(e.to_string()))?;
        Ok(count > 0)
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| StudioError::Storage(e.to_string()))?;
        diesel::sql_query("PRAGMA busy_timeout = 5000")
            .execute(&mut conn)
            .await
            .map_err(|e| StudioError::Storage(e.to_string()))?;
        Ok(conn)
    }
}

fn map_row(row: CampaignRow) -> Result<Campaign> {
    let archetype: ArchetypeProfile = row.archetype.parse()?;
    Ok(Campaign {
        id: row.id,
        user_id: row.user_id,
        name: row.name,
        archetype,
        brand: serde_json::from_str(&row.brand_json)?,
        icp: row
            .icp_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        channels: serde_json::from_str(&row.channels_json)?,
        assets: serde_json::from_str(&row.assets_json)?,
        created_at: row.created_at,
    })
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StudioError::Storage(e.to_string()))?;
    }
    Ok(())
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = SqliteConnection::establish(&database_url)
            .map_err(|e| StudioError::Storage(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| StudioError::Storage(e.to_string()))?;
        Ok::<_, StudioError>(())
    })
    .await
    .map_err(|e| StudioError::Runtime(e.to_string()))??;
    Ok(())
}
