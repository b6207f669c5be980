//! Gallery persistence layer: the record store for gallery items and the
//! object stores holding their image blobs.
//!
//! The record store is an async API around SQLite (sqlx). The workflow engine
//! only depends on the [`RecordStore`] and [`ObjectStore`] contracts, so
//! either side can be swapped for another backend.

pub mod keys;
pub mod storage;

use std::{str::FromStr, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    QueryBuilder, Row, Sqlite, SqlitePool,
};
use thiserror::Error;
use uuid::Uuid;

pub use storage::{FsObjectStore, MemoryObjectStore, ObjectStore, StoredObject};

/// Default SQLite busy timeout in milliseconds when the DB is under load.
const SQLITE_BUSY_TIMEOUT_MS: u64 = 5_000;

#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Returns the items matching every predicate of `filter`, newest first,
    /// restricted to the requested page.
    async fn list(&self, filter: &GalleryFilter, page: Pagination) -> Result<Vec<GalleryRecord>>;
    async fn fetch(&self, id: Uuid) -> Result<Option<GalleryRecord>>;
    async fn insert(&self, record: NewGalleryRecord<'_>) -> Result<GalleryRecord>;
    async fn update(&self, id: Uuid, update: GalleryUpdate<'_>) -> Result<GalleryRecord>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Primary entry point to the record store.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes (or creates) a connection pool to the SQLite database located at
    /// the given URL (e.g. `sqlite:///var/lib/gallery/gallery.db`).
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database url '{database_url}'"))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(SQLITE_BUSY_TIMEOUT_MS));

        // Every connection to an in-memory database sees its own empty schema,
        // so those pools are pinned to a single long-lived connection.
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().min_connections(1).max_connections(8)
        };

        let pool = pool_options.connect_with(options).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Exposes the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Lists gallery items matching `filter`, ordered by creation time descending.
    pub async fn list_images(
        &self,
        filter: &GalleryFilter,
        page: Pagination,
    ) -> Result<Vec<GalleryRecord>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM gallery WHERE 1 = 1");
        for predicate in filter.predicates() {
            push_predicate(&mut query, predicate);
        }
        query
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(i64::from(page.limit()))
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let mut rows = query.build().fetch(&self.pool);
        let mut out = Vec::new();
        while let Some(row) = rows.try_next().await? {
            out.push(map_record(row)?);
        }
        Ok(out)
    }

    /// Retrieves a gallery item by its identifier.
    pub async fn fetch_image(&self, id: Uuid) -> Result<Option<GalleryRecord>> {
        let row = sqlx::query("SELECT * FROM gallery WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(map_record).transpose()
    }

    /// Inserts a new item and returns the persisted row.
    pub async fn insert_image(&self, data: NewGalleryRecord<'_>) -> Result<GalleryRecord> {
        let now = timestamp(Utc::now());
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO gallery (
                id, title, description, title_search, description_search,
                tags, image_url, image_key, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(data.title)
        .bind(data.description)
        .bind(data.title.to_lowercase())
        .bind(data.description.to_lowercase())
        .bind(serde_json::to_string(data.tags)?)
        .bind(data.image_url)
        .bind(data.image_key)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.fetch_image(id)
            .await?
            .ok_or_else(|| anyhow!("gallery item {id} inserted but missing when reloaded"))
    }

    /// Rewrites every mutable column of an existing item.
    pub async fn update_image(&self, id: Uuid, data: GalleryUpdate<'_>) -> Result<GalleryRecord> {
        let now = timestamp(Utc::now());
        let result = sqlx::query(
            r#"
            UPDATE gallery
            SET title = ?, description = ?, title_search = ?, description_search = ?,
                tags = ?, image_url = ?, image_key = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(data.title)
        .bind(data.description)
        .bind(data.title.to_lowercase())
        .bind(data.description.to_lowercase())
        .bind(serde_json::to_string(data.tags)?)
        .bind(data.image_url)
        .bind(data.image_key)
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(GalleryError::RecordMissing(id).into());
        }

        self.fetch_image(id)
            .await?
            .ok_or_else(|| GalleryError::RecordMissing(id).into())
    }

    /// Removes an item. Deleting an unknown id is a no-op.
    pub async fn delete_image(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM gallery WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[cfg(test)]
    pub async fn count_images(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM gallery")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl RecordStore for Database {
    async fn list(&self, filter: &GalleryFilter, page: Pagination) -> Result<Vec<GalleryRecord>> {
        self.list_images(filter, page).await
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<GalleryRecord>> {
        self.fetch_image(id).await
    }

    async fn insert(&self, record: NewGalleryRecord<'_>) -> Result<GalleryRecord> {
        self.insert_image(record).await
    }

    async fn update(&self, id: Uuid, update: GalleryUpdate<'_>) -> Result<GalleryRecord> {
        self.update_image(id, update).await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.delete_image(id).await
    }
}

fn push_predicate(query: &mut QueryBuilder<'_, Sqlite>, predicate: FieldPredicate<'_>) {
    match predicate.op {
        FilterOp::Equals => {
            if predicate.field == FilterField::Tags {
                query
                    .push(" AND EXISTS (SELECT 1 FROM json_each(gallery.tags) WHERE json_each.value = ")
                    .push_bind(predicate.value.to_owned())
                    .push(")");
            } else {
                query
                    .push(" AND ")
                    .push(predicate.field.column())
                    .push(" = ")
                    .push_bind(predicate.value.to_owned());
            }
        }
        // SQLite's lower() only folds ASCII, so matching runs against
        // columns lowercased in Rust on write.
        FilterOp::ContainsIgnoreCase => {
            query
                .push(" AND instr(")
                .push(predicate.field.search_column())
                .push(", ")
                .push_bind(predicate.value.to_lowercase())
                .push(") > 0");
        }
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(value: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid RFC3339 timestamp '{}': {}", value, err))
}

fn map_record(row: SqliteRow) -> Result<GalleryRecord> {
    let id: String = row.try_get("id")?;
    let tags_json: String = row.try_get("tags")?;

    Ok(GalleryRecord {
        id: Uuid::parse_str(&id)?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        tags: serde_json::from_str(&tags_json).context("failed to deserialize gallery tags")?,
        image_url: row.try_get("image_url")?,
        image_key: row.try_get("image_key")?,
        created_at: parse_datetime(row.try_get("created_at")?)?,
        updated_at: parse_datetime(row.try_get("updated_at")?)?,
    })
}

/// Errors returned by the record and object stores.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GalleryError {
    #[error("gallery item {0} not found")]
    RecordMissing(Uuid),
    #[error("object '{0}' already exists")]
    ObjectExists(String),
    #[error("invalid object key '{0}'")]
    InvalidKey(String),
    #[error("page and limit must be at least 1 (page={page}, limit={limit})")]
    InvalidPagination { page: u32, limit: u32 },
}

/// Persisted gallery item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GalleryRecord {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub tags: Vec<String>,
    pub image_url: String,
    pub image_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GalleryRecord {
    /// Key of the blob this item owns. Items created from a URL override
    /// own none, even when the URL points into the gallery bucket.
    pub fn blob_key(&self) -> Option<&str> {
        self.image_key.as_deref()
    }
}

/// Input payload for item creation.
#[derive(Debug, Clone)]
pub struct NewGalleryRecord<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub tags: &'a [String],
    pub image_url: &'a str,
    pub image_key: Option<&'a str>,
}

/// Full set of mutable columns written by an update.
#[derive(Debug, Clone)]
pub struct GalleryUpdate<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub tags: &'a [String],
    pub image_url: &'a str,
    pub image_key: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Id,
    Title,
    Description,
    Tags,
}

impl FilterField {
    fn column(&self) -> &'static str {
        match self {
            FilterField::Id => "id",
            FilterField::Title => "title",
            FilterField::Description => "description",
            FilterField::Tags => "tags",
        }
    }

    /// Column holding the lowercased text used by contains-matching.
    fn search_column(&self) -> &'static str {
        match self {
            FilterField::Title => "title_search",
            FilterField::Description => "description_search",
            other => other.column(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equals,
    ContainsIgnoreCase,
}

/// One predicate of a [`GalleryFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPredicate<'a> {
    pub field: FilterField,
    pub op: FilterOp,
    pub value: &'a str,
}

/// Conjunctive listing filter. Empty strings are treated as "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalleryFilter {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    tag: Option<String>,
}

impl GalleryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = non_empty(title);
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = non_empty(description);
        self
    }

    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = non_empty(tag);
        self
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.predicates().is_empty()
    }

    pub fn predicates(&self) -> Vec<FieldPredicate<'_>> {
        let mut out = Vec::new();
        if let Some(id) = self.id.as_deref() {
            out.push(FieldPredicate {
                field: FilterField::Id,
                op: FilterOp::Equals,
                value: id,
            });
        }
        if let Some(title) = self.title.as_deref() {
            out.push(FieldPredicate {
                field: FilterField::Title,
                op: FilterOp::ContainsIgnoreCase,
                value: title,
            });
        }
        if let Some(description) = self.description.as_deref() {
            out.push(FieldPredicate {
                field: FilterField::Description,
                op: FilterOp::ContainsIgnoreCase,
                value: description,
            });
        }
        if let Some(tag) = self.tag.as_deref() {
            out.push(FieldPredicate {
                field: FilterField::Tags,
                op: FilterOp::Equals,
                value: tag,
            });
        }
        out
    }

    /// Evaluates the filter against an in-memory record, with the same
    /// semantics the SQLite store applies.
    pub fn matches(&self, record: &GalleryRecord) -> bool {
        self.predicates().into_iter().all(|predicate| {
            match (predicate.field, predicate.op) {
                (FilterField::Tags, _) => record.tags.iter().any(|tag| tag == predicate.value),
                (field, FilterOp::Equals) => field_value(record, field) == predicate.value,
                (field, FilterOp::ContainsIgnoreCase) => field_value(record, field)
                    .to_lowercase()
                    .contains(&predicate.value.to_lowercase()),
            }
        })
    }
}

fn field_value(record: &GalleryRecord, field: FilterField) -> String {
    match field {
        FilterField::Id => record.id.to_string(),
        FilterField::Title => record.title.clone(),
        FilterField::Description => record.description.clone(),
        FilterField::Tags => record.tags.join(","),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Page selection for listings. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Pagination {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Validates the page selection; `limit` is capped at [`Self::MAX_LIMIT`].
    pub fn new(page: u32, limit: u32) -> Result<Self, GalleryError> {
        if page == 0 || limit == 0 {
            return Err(GalleryError::InvalidPagination { page, limit });
        }
        Ok(Self {
            page,
            limit: limit.min(Self::MAX_LIMIT),
        })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Applies the page window to an already ordered list.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.limit as usize)
            .collect()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: Self::DEFAULT_PAGE,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_DB_URL: &str = "sqlite::memory:";

    async fn setup_db() -> Database {
        Database::connect(TEST_DB_URL).await.unwrap()
    }

    async fn insert(db: &Database, title: &str, description: &str, tags: &[&str]) -> GalleryRecord {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        let key = format!("{}.png", title.to_lowercase().replace(' ', "-"));
        let url = format!("http://localhost/storage/gallery-images/{key}");
        db.insert_image(NewGalleryRecord {
            title,
            description,
            tags: &tags,
            image_url: &url,
            image_key: Some(&key),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn insert_and_fetch_roundtrip() {
        let db = setup_db().await;
        let record = insert(&db, "Dunes", "Sand at dusk", &["landscape", "bw"]).await;

        assert_eq!(record.tags, vec!["landscape".to_string(), "bw".to_string()]);
        assert_eq!(record.image_key.as_deref(), Some("dunes.png"));

        let fetched = db.fetch_image(record.id).await.unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn list_orders_newest_first() {
        let db = setup_db().await;
        let first = insert(&db, "One", "first", &["a"]).await;
        let second = insert(&db, "Two", "second", &["a"]).await;
        let third = insert(&db, "Three", "third", &["b"]).await;

        let all = db
            .list_images(&GalleryFilter::new(), Pagination::default())
            .await
            .unwrap();
        let ids: Vec<Uuid> = all.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[tokio::test]
    async fn list_filters_are_conjunctive() {
        let db = setup_db().await;
        let sunset = insert(&db, "Sunset Beach", "Warm colours", &["landscape", "color"]).await;
        insert(&db, "Sunset City", "Neon", &["urban"]).await;
        insert(&db, "Forest", "Warm light through trees", &["landscape"]).await;

        let filter = GalleryFilter::new()
            .with_title(Some("sunset".into()))
            .with_description(Some("WARM".into()))
            .with_tag(Some("landscape".into()));
        let found = db.list_images(&filter, Pagination::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, sunset.id);

        let by_id = db
            .list_images(&GalleryFilter::new().with_id(sunset.id), Pagination::default())
            .await
            .unwrap();
        assert_eq!(by_id.len(), 1);
        assert!(filter.matches(&by_id[0]));
    }

    #[tokio::test]
    async fn tag_filter_is_exact() {
        let db = setup_db().await;
        insert(&db, "Mono", "grey", &["bw"]).await;

        let partial = GalleryFilter::new().with_tag(Some("b".into()));
        assert!(db
            .list_images(&partial, Pagination::default())
            .await
            .unwrap()
            .is_empty());

        let upper = GalleryFilter::new().with_tag(Some("BW".into()));
        assert!(db
            .list_images(&upper, Pagination::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn pagination_slices_results() {
        let db = setup_db().await;
        for n in 0..5 {
            insert(&db, &format!("Item {n}"), "x", &["a"]).await;
        }

        let page_two = db
            .list_images(&GalleryFilter::new(), Pagination::new(2, 2).unwrap())
            .await
            .unwrap();
        let titles: Vec<&str> = page_two.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Item 2", "Item 1"]);

        let past_end = db
            .list_images(&GalleryFilter::new(), Pagination::new(4, 2).unwrap())
            .await
            .unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn update_rewrites_columns_and_refreshes_timestamp() {
        let db = setup_db().await;
        let record = insert(&db, "Old", "old", &["x"]).await;
        let tags = vec!["y".to_string()];

        let updated = db
            .update_image(
                record.id,
                GalleryUpdate {
                    title: "New",
                    description: "old",
                    tags: &tags,
                    image_url: &record.image_url,
                    image_key: record.image_key.as_deref(),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "New");
        assert_eq!(updated.tags, tags);
        assert_eq!(updated.created_at, record.created_at);
        assert!(updated.updated_at >= record.updated_at);
    }

    #[tokio::test]
    async fn update_of_unknown_id_reports_missing_record() {
        let db = setup_db().await;
        let id = Uuid::new_v4();
        let err = db
            .update_image(
                id,
                GalleryUpdate {
                    title: "t",
                    description: "d",
                    tags: &[],
                    image_url: "u",
                    image_key: None,
                },
            )
            .await
            .unwrap_err();

        let gallery_err = err.downcast::<GalleryError>().unwrap();
        assert_eq!(gallery_err, GalleryError::RecordMissing(id));
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let db = setup_db().await;
        let record = insert(&db, "Gone", "soon", &["x"]).await;
        assert_eq!(db.count_images().await.unwrap(), 1);

        db.delete_image(record.id).await.unwrap();
        assert!(db.fetch_image(record.id).await.unwrap().is_none());
        assert_eq!(db.count_images().await.unwrap(), 0);
    }

    fn record_with_url(image_url: &str) -> GalleryRecord {
        let now = Utc::now();
        GalleryRecord {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: "d".into(),
            tags: vec![],
            image_url: image_url.into(),
            image_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn only_persisted_keys_are_owned() {
        let mut record = record_with_url("http://localhost/storage/gallery-images/42-cat.png");
        assert_eq!(record.blob_key(), None);

        record.image_key = Some("42-cat.png".into());
        assert_eq!(record.blob_key(), Some("42-cat.png"));
    }

    #[tokio::test]
    async fn contains_filters_fold_non_ascii_case() {
        let db = setup_db().await;
        let paris = insert(&db, "Été à Paris", "Soirée ÉLECTRIQUE", &["city"]).await;
        insert(&db, "Winter", "snow", &["city"]).await;

        for needle in ["été", "ÉTÉ", "à paris"] {
            let filter = GalleryFilter::new().with_title(Some(needle.into()));
            let found = db.list_images(&filter, Pagination::default()).await.unwrap();
            assert_eq!(found.len(), 1, "{needle}");
            assert_eq!(found[0].id, paris.id);
            assert!(filter.matches(&found[0]));
        }

        let by_description = GalleryFilter::new().with_description(Some("électrique".into()));
        let found = db
            .list_images(&by_description, Pagination::default())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn update_refreshes_search_columns() {
        let db = setup_db().await;
        let record = insert(&db, "Plain", "text", &["x"]).await;
        db.update_image(
            record.id,
            GalleryUpdate {
                title: "Ñandú Österreich",
                description: "text",
                tags: &record.tags,
                image_url: &record.image_url,
                image_key: record.image_key.as_deref(),
            },
        )
        .await
        .unwrap();

        let filter = GalleryFilter::new().with_title(Some("ñandú ö".into()));
        let found = db.list_images(&filter, Pagination::default()).await.unwrap();
        assert_eq!(found.len(), 1);

        let stale = GalleryFilter::new().with_title(Some("plain".into()));
        assert!(db
            .list_images(&stale, Pagination::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn pagination_validates_and_caps() {
        assert_eq!(
            Pagination::new(0, 10).unwrap_err(),
            GalleryError::InvalidPagination { page: 0, limit: 10 }
        );
        assert!(Pagination::new(1, 0).is_err());
        assert_eq!(Pagination::new(1, 500).unwrap().limit(), Pagination::MAX_LIMIT);
        assert_eq!(Pagination::new(3, 10).unwrap().offset(), 20);
        assert_eq!(
            Pagination::new(2, 2).unwrap().slice(vec![1, 2, 3, 4, 5]),
            vec![3, 4]
        );
    }

    #[test]
    fn empty_filter_values_impose_no_constraint() {
        let filter = GalleryFilter::new()
            .with_title(Some(String::new()))
            .with_tag(None);
        assert!(filter.is_empty());
    }
}
