mod schema;
mod seed;

pub use seed::{SeedData, SeedPrompt, SeedSummary};

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::FetchError;
use crate::models::*;
use crate::ports::{DrawingRepository, KeyValueStore, LocationRepository, PromptRepository};

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "driftpad")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("driftpad.db"))
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Location operations
    // ============================================================

    /// Active locations in insertion order.
    pub fn list_active_locations(&self) -> Result<Vec<LocationRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, name, slug, latitude, longitude, radius_meters, city, state, is_active
             FROM locations WHERE is_active = 1 ORDER BY rowid",
        )?;

        let locations = stmt
            .query_map([], location_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(locations)
    }

    pub fn get_active_location_by_slug(&self, slug: &str) -> Result<Option<LocationRecord>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let location = conn
            .query_row(
                "SELECT id, name, slug, latitude, longitude, radius_meters, city, state, is_active
                 FROM locations WHERE slug = ? AND is_active = 1",
                [slug],
                location_from_row,
            )
            .optional()?;

        Ok(location)
    }

    pub fn create_location(&self, input: CreateLocationInput) -> Result<LocationRecord> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();
        let is_active = input.is_active.unwrap_or(true);
        let state = input.state.map(|s| s.to_uppercase());

        conn.execute(
            "INSERT INTO locations (id, name, slug, latitude, longitude, radius_meters, city, state, is_active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                &input.name,
                &input.slug,
                input.latitude,
                input.longitude,
                input.radius_meters,
                &input.city,
                &state,
                is_active,
                now.to_rfc3339(),
            ),
        )?;

        Ok(LocationRecord {
            id,
            name: input.name,
            slug: input.slug,
            latitude: input.latitude,
            longitude: input.longitude,
            radius_meters: input.radius_meters,
            city: input.city,
            state,
            is_active,
        })
    }

    // ============================================================
    // Prompt operations
    // ============================================================

    pub fn query_prompts(&self, filter: &PromptFilter, limit: usize) -> Result<Vec<PromptRecord>> {
        let mut sql = String::from(
            "SELECT id, content, category, requires_shape, requires_gallery_image, location_id, weight, active
             FROM prompts WHERE 1 = 1",
        );
        let mut params: Vec<Value> = Vec::new();

        if filter.active_only {
            sql.push_str(" AND active = 1");
        }

        match filter.location {
            LocationScope::At(location_id) => {
                sql.push_str(" AND location_id = ?");
                params.push(Value::Text(location_id.to_string()));
            }
            LocationScope::Generic => sql.push_str(" AND location_id IS NULL"),
        }

        if !filter.exclude_ids.is_empty() {
            let placeholders = vec!["?"; filter.exclude_ids.len()].join(", ");
            sql.push_str(&format!(" AND id NOT IN ({})", placeholders));
            params.extend(
                filter
                    .exclude_ids
                    .iter()
                    .map(|id| Value::Text(id.to_string())),
            );
        }

        sql.push_str(" ORDER BY rowid LIMIT ?");
        params.push(Value::Integer(limit as i64));

        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&sql)?;
        let prompts = stmt
            .query_map(params_from_iter(params), |row| {
                Ok(PromptRecord {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    content: row.get(1)?,
                    category: PromptCategory::from_str(&row.get::<_, String>(2)?)
                        .unwrap_or(PromptCategory::Generative),
                    requires_shape: row.get(3)?,
                    requires_gallery_image: row.get(4)?,
                    location_id: row.get::<_, Option<String>>(5)?.map(parse_uuid),
                    weight: row.get(6)?,
                    active: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(prompts)
    }

    pub fn create_prompt(&self, input: CreatePromptInput) -> Result<PromptRecord> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();
        let weight = input.weight.unwrap_or(1);
        let active = input.active.unwrap_or(true);

        conn.execute(
            "INSERT INTO prompts (id, content, category, requires_shape, requires_gallery_image, location_id, weight, active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                &input.content,
                input.category.as_str(),
                input.requires_shape,
                input.requires_gallery_image,
                input.location_id.map(|id| id.to_string()),
                weight,
                active,
                now.to_rfc3339(),
            ),
        )?;

        Ok(PromptRecord {
            id,
            content: input.content,
            category: input.category,
            requires_shape: input.requires_shape,
            requires_gallery_image: input.requires_gallery_image,
            location_id: input.location_id,
            weight,
            active,
        })
    }

    // ============================================================
    // Drawing operations
    // ============================================================

    /// Newest eligible drawings first.
    pub fn query_drawings(&self, filter: &DrawingFilter, limit: usize) -> Result<Vec<DrawingAsset>> {
        let mut sql = format!(
            "SELECT id, image_data, image_url, title, description, is_erase_eligible, is_add_eligible, is_public
             FROM drawings WHERE {} = 1",
            filter.eligibility.column()
        );
        if filter.public_only {
            sql.push_str(" AND is_public = 1");
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ?");

        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&sql)?;
        let drawings = stmt
            .query_map([limit as i64], |row| {
                Ok(DrawingAsset {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    image_data: row.get(1)?,
                    image_url: row.get(2)?,
                    title: row.get(3)?,
                    description: row.get(4)?,
                    is_erase_eligible: row.get(5)?,
                    is_add_eligible: row.get(6)?,
                    is_public: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(drawings)
    }

    pub fn create_drawing(&self, input: CreateDrawingInput) -> Result<DrawingAsset> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO drawings (id, image_data, image_url, title, description, is_erase_eligible, is_add_eligible, is_public, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                &input.image_data,
                &input.image_url,
                &input.title,
                &input.description,
                input.is_erase_eligible,
                input.is_add_eligible,
                input.is_public,
                now.to_rfc3339(),
            ),
        )?;

        Ok(DrawingAsset {
            id,
            image_data: input.image_data,
            image_url: input.image_url,
            title: input.title,
            description: input.description,
            is_erase_eligible: input.is_erase_eligible,
            is_add_eligible: input.is_add_eligible,
            is_public: input.is_public,
        })
    }

    // ============================================================
    // Key-value operations
    // ============================================================

    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let value = conn
            .query_row("SELECT value FROM kv_store WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            (key, value, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    pub fn remove_value(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute("DELETE FROM kv_store WHERE key = ?", [key])?;
        Ok(rows > 0)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

impl Database {
    /// Run a query on the blocking pool so callers' timeouts can fire while
    /// SQLite is busy.
    async fn off_runtime<T, F>(&self, op: F) -> Result<T, FetchError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| FetchError::Backend(format!("database task failed: {e}")))?
            .map_err(FetchError::from)
    }
}

#[async_trait]
impl LocationRepository for Database {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<LocationRecord>, FetchError> {
        let slug = slug.to_string();
        self.off_runtime(move |db| db.get_active_location_by_slug(&slug))
            .await
    }

    async fn list_active(&self) -> Result<Vec<LocationRecord>, FetchError> {
        self.off_runtime(|db| db.list_active_locations()).await
    }
}

#[async_trait]
impl PromptRepository for Database {
    async fn query(
        &self,
        filter: &PromptFilter,
        limit: usize,
    ) -> Result<Vec<PromptRecord>, FetchError> {
        let filter = filter.clone();
        self.off_runtime(move |db| db.query_prompts(&filter, limit))
            .await
    }
}

#[async_trait]
impl DrawingRepository for Database {
    async fn query(
        &self,
        filter: &DrawingFilter,
        limit: usize,
    ) -> Result<Vec<DrawingAsset>, FetchError> {
        let filter = *filter;
        self.off_runtime(move |db| db.query_drawings(&filter, limit))
            .await
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_value(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_value(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.remove_value(key).map(|_| ())
    }
}

fn location_from_row(row: &Row<'_>) -> rusqlite::Result<LocationRecord> {
    Ok(LocationRecord {
        id: parse_uuid(row.get::<_, String>(0)?),
        name: row.get(1)?,
        slug: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        radius_meters: row.get(5)?,
        city: row.get(6)?,
        state: row.get(7)?,
        is_active: row.get(8)?,
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}
