//! SQLite persistence for the post cache.
//!
//! The whole [`PostStore`] is read at startup and written back in a single
//! transaction at the end of a run. Posts are only ever inserted, so a failed
//! or interrupted save leaves the last committed state in place.

use chrono::{DateTime, Utc};
use seddit_core::{DatabaseError, Feed, FeedKey, FeedState, Post, PostStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

#[cfg(test)]
mod tests;

/// `<major>.<minor>` of the on-disk layout written by this build.
pub const FORMAT_VERSION: &str = "1.0";

const SQLITE_CORRUPT: i32 = 11;
const SQLITE_NOTADB: i32 = 26;

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// How long a write waits for another connection to release the file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &[(&str, &str)] = &[
    (
        "store_meta",
        r#"
        CREATE TABLE IF NOT EXISTS store_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    ),
    (
        "posts",
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL
        )
        "#,
    ),
    (
        "post_feeds",
        r#"
        CREATE TABLE IF NOT EXISTS post_feeds (
            post_id TEXT NOT NULL REFERENCES posts(id),
            feed_name TEXT NOT NULL,
            PRIMARY KEY (post_id, feed_name)
        )
        "#,
    ),
    (
        "feed_states",
        r#"
        CREATE TABLE IF NOT EXISTS feed_states (
            subreddit TEXT NOT NULL,
            feed_name TEXT NOT NULL,
            last_refreshed_at TEXT NOT NULL,
            PRIMARY KEY (subreddit, feed_name)
        )
        "#,
    ),
    (
        "feed_members",
        r#"
        CREATE TABLE IF NOT EXISTS feed_members (
            subreddit TEXT NOT NULL,
            feed_name TEXT NOT NULL,
            position INTEGER NOT NULL,
            post_id TEXT NOT NULL,
            PRIMARY KEY (subreddit, feed_name, position)
        )
        "#,
    ),
    (
        "idx_feed_members_post",
        "CREATE INDEX IF NOT EXISTS idx_feed_members_post ON feed_members(post_id)",
    ),
];

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the store file at `path` and bring its schema
    /// up to date.
    pub async fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| DatabaseError::ConnectionFailed {
                reason: format!("cannot create {}: {}", dir.display(), e),
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self {
            pool,
            path: path.to_path_buf(),
        };
        db.migrate().await?;
        db.check_format_version().await?;
        debug!("Opened store at {}", path.display());
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    async fn migrate(&self) -> Result<(), DatabaseError> {
        for &(name, statement) in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| schema_error(name, e))?;
        }
        Ok(())
    }

    async fn check_format_version(&self) -> Result<(), DatabaseError> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT value FROM store_meta WHERE key = 'format_version'")
                .fetch_optional(&self.pool)
                .await?;

        match found {
            None => {
                sqlx::query("INSERT INTO store_meta (key, value) VALUES ('format_version', ?)")
                    .bind(FORMAT_VERSION)
                    .execute(&self.pool)
                    .await?;
                Ok(())
            }
            Some(version) if is_compatible(&version, FORMAT_VERSION) => Ok(()),
            Some(version) => Err(DatabaseError::IncompatibleVersion {
                expected: FORMAT_VERSION.to_string(),
                found: version,
            }),
        }
    }

    /// Read the complete store. Rows that could not have been written by
    /// [`Database::save_store`] are reported as corruption.
    pub async fn load_store(&self) -> Result<PostStore, DatabaseError> {
        let mut seen_in: HashMap<String, BTreeSet<Feed>> = HashMap::new();
        for row in sqlx::query("SELECT post_id, feed_name FROM post_feeds")
            .fetch_all(&self.pool)
            .await?
        {
            let post_id: String = row.try_get("post_id")?;
            let feed = parse_feed(&row.try_get::<String, _>("feed_name")?)?;
            seen_in.entry(post_id).or_default().insert(feed);
        }

        let mut posts = Vec::new();
        for row in sqlx::query("SELECT id, title FROM posts")
            .fetch_all(&self.pool)
            .await?
        {
            let id: String = row.try_get("id")?;
            let feeds_seen_in = seen_in.remove(&id).unwrap_or_default();
            posts.push(Post {
                title: row.try_get("title")?,
                id,
                feeds_seen_in,
            });
        }
        if let Some(orphan) = seen_in.keys().next() {
            return Err(corrupt(format!("feed sightings for unknown post '{}'", orphan)));
        }

        let mut states: HashMap<FeedKey, FeedState> = HashMap::new();
        for row in sqlx::query("SELECT subreddit, feed_name, last_refreshed_at FROM feed_states")
            .fetch_all(&self.pool)
            .await?
        {
            let key = row_feed_key(&row)?;
            let last_refreshed_at: DateTime<Utc> = row.try_get("last_refreshed_at")?;
            states.insert(
                key,
                FeedState {
                    post_ids: Vec::new(),
                    last_refreshed_at,
                },
            );
        }

        for row in sqlx::query(
            "SELECT subreddit, feed_name, post_id FROM feed_members \
             ORDER BY subreddit, feed_name, position",
        )
        .fetch_all(&self.pool)
        .await?
        {
            let key = row_feed_key(&row)?;
            let state = states.get_mut(&key).ok_or_else(|| {
                corrupt(format!("members for unknown feed {}/{}", key.subreddit, key.feed))
            })?;
            state.post_ids.push(row.try_get("post_id")?);
        }

        let store = PostStore::from_parts(posts, states)?;
        debug!(
            "Loaded {} posts across {} feeds",
            store.len(),
            store.feed_states().count()
        );
        Ok(store)
    }

    /// Write `store` in one transaction. Existing posts keep their stored
    /// title; feed memberships and refresh times are replaced.
    pub async fn save_store(&self, store: &PostStore) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(classify_sql)?;
        write_store(&mut *tx, store).await.map_err(classify_sql)?;
        tx.commit().await.map_err(|e| match classify_sql(e) {
            DatabaseError::Sql(e) => DatabaseError::TransactionFailed {
                reason: e.to_string(),
            },
            other => other,
        })?;

        info!("Saved {} posts to {}", store.len(), self.path.display());
        Ok(())
    }
}

async fn write_store(conn: &mut SqliteConnection, store: &PostStore) -> Result<(), sqlx::Error> {
    for post in store.posts() {
        sqlx::query("INSERT INTO posts (id, title) VALUES (?, ?) ON CONFLICT(id) DO NOTHING")
            .bind(&post.id)
            .bind(&post.title)
            .execute(&mut *conn)
            .await?;
        for feed in &post.feeds_seen_in {
            sqlx::query("INSERT OR IGNORE INTO post_feeds (post_id, feed_name) VALUES (?, ?)")
                .bind(&post.id)
                .bind(feed.as_str())
                .execute(&mut *conn)
                .await?;
        }
    }

    for (key, state) in store.feed_states() {
        sqlx::query(
            "INSERT INTO feed_states (subreddit, feed_name, last_refreshed_at) VALUES (?, ?, ?) \
             ON CONFLICT(subreddit, feed_name) DO UPDATE SET last_refreshed_at = excluded.last_refreshed_at",
        )
        .bind(&key.subreddit)
        .bind(key.feed.as_str())
        .bind(state.last_refreshed_at)
        .execute(&mut *conn)
        .await?;

        sqlx::query("DELETE FROM feed_members WHERE subreddit = ? AND feed_name = ?")
            .bind(&key.subreddit)
            .bind(key.feed.as_str())
            .execute(&mut *conn)
            .await?;

        for (position, post_id) in state.post_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO feed_members (subreddit, feed_name, position, post_id) VALUES (?, ?, ?, ?)",
            )
            .bind(&key.subreddit)
            .bind(key.feed.as_str())
            .bind(position as i64)
            .bind(post_id)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}

/// Open the store at `path` and load it. A corrupt or incompatible file is
/// moved aside and replaced by an empty store; other failures are returned.
pub async fn open_store(path: &Path) -> Result<(Database, PostStore), DatabaseError> {
    match open_and_load(path).await {
        Ok(opened) => Ok(opened),
        Err(e) if is_corruption(&e) => {
            let moved_to = quarantine(path)?;
            warn!(
                "Cache store {} is unusable ({}); moved to {} and starting empty",
                path.display(),
                e,
                moved_to.display()
            );
            let db = Database::open(path).await?;
            Ok((db, PostStore::new()))
        }
        Err(e) => Err(e),
    }
}

async fn open_and_load(path: &Path) -> Result<(Database, PostStore), DatabaseError> {
    let db = Database::open(path).await?;
    match db.load_store().await {
        Ok(store) => Ok((db, store)),
        Err(e) => {
            db.close().await;
            Err(e)
        }
    }
}

/// Whether `found` can be read by a build writing `ours`: same major, and a
/// minor no older than ours.
pub fn is_compatible(found: &str, ours: &str) -> bool {
    match (parse_version(found), parse_version(ours)) {
        (Some((found_major, found_minor)), Some((major, minor))) => {
            found_major == major && found_minor >= minor
        }
        _ => false,
    }
}

fn parse_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.trim().split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

pub fn is_corruption(error: &DatabaseError) -> bool {
    match error {
        DatabaseError::CorruptDatabase { .. } | DatabaseError::IncompatibleVersion { .. } => true,
        DatabaseError::Sql(sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) => true,
        DatabaseError::Sql(e) => matches!(sqlite_code(e), Some(SQLITE_CORRUPT | SQLITE_NOTADB)),
        _ => false,
    }
}

/// Primary SQLite result code of `error`, extended codes folded in.
fn sqlite_code(error: &sqlx::Error) -> Option<i32> {
    match error {
        sqlx::Error::Database(db_error) => db_error
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| code & 0xff),
        _ => None,
    }
}

fn classify_sql(error: sqlx::Error) -> DatabaseError {
    match sqlite_code(&error) {
        Some(SQLITE_BUSY | SQLITE_LOCKED) => DatabaseError::DatabaseLocked,
        _ => DatabaseError::Sql(error),
    }
}

/// Corruption stays a plain SQL error so `open_store` can still move the file aside.
fn schema_error(name: &str, error: sqlx::Error) -> DatabaseError {
    match classify_sql(error) {
        DatabaseError::Sql(e) if !matches!(sqlite_code(&e), Some(SQLITE_CORRUPT | SQLITE_NOTADB)) => {
            DatabaseError::MigrationFailed {
                migration: name.to_string(),
                reason: e.to_string(),
            }
        }
        other => other,
    }
}

fn quarantine(path: &Path) -> Result<PathBuf, DatabaseError> {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".corrupt-{}", Utc::now().timestamp()));
    let target = PathBuf::from(name);

    std::fs::rename(path, &target).map_err(|e| DatabaseError::ConnectionFailed {
        reason: format!("cannot move {} aside: {}", path.display(), e),
    })?;
    for suffix in ["-journal", "-wal", "-shm"] {
        let mut side = path.as_os_str().to_os_string();
        side.push(suffix);
        let _ = std::fs::remove_file(PathBuf::from(side));
    }
    Ok(target)
}

fn parse_feed(name: &str) -> Result<Feed, DatabaseError> {
    name.parse()
        .map_err(|_| corrupt(format!("unknown feed name '{}'", name)))
}

fn row_feed_key(row: &SqliteRow) -> Result<FeedKey, DatabaseError> {
    let subreddit: String = row.try_get("subreddit")?;
    let feed_name: String = row.try_get("feed_name")?;
    if subreddit.trim().is_empty() {
        return Err(corrupt("feed state with empty subreddit".to_string()));
    }
    Ok(FeedKey::new(&subreddit, parse_feed(&feed_name)?))
}

fn corrupt(details: String) -> DatabaseError {
    DatabaseError::CorruptDatabase { details }
}
