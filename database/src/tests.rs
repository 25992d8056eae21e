#[cfg(test)]
mod tests {
    use crate::{is_compatible, open_store, Database, FORMAT_VERSION};
    use chrono::{Duration, TimeZone, Utc};
    use seddit_core::{DatabaseError, Feed, FetchedPost, PostStore};
    use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
    use sqlx::Connection;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn test_db_path(dir: &TempDir) -> PathBuf {
        dir.path()
            .join("cache")
            .join(format!("test_seddit_{}.db", uuid::Uuid::new_v4()))
    }

    fn sample_store() -> PostStore {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut store = PostStore::new();
        store.upsert_feed_result(
            "KerbalSpaceProgram",
            Feed::Hot,
            vec![
                FetchedPost::new("a", "KSP Mun Duna KSP"),
                FetchedPost::new("b", "Landed on Minmus"),
            ],
            t0,
        );
        store.upsert_feed_result(
            "KerbalSpaceProgram",
            Feed::Top,
            vec![
                FetchedPost::new("b", "Landed on Minmus"),
                FetchedPost::new("c", "Jool five"),
            ],
            t0 + Duration::minutes(5),
        );
        store
    }

    fn quarantined_files(path: &Path) -> Vec<PathBuf> {
        let prefix = format!(
            "{}.corrupt-",
            path.file_name().unwrap().to_string_lossy()
        );
        std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| p.file_name().unwrap().to_string_lossy().starts_with(&prefix))
            .collect()
    }

    #[tokio::test]
    async fn test_open_creates_directory_and_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = test_db_path(&dir);

        let (db, store) = open_store(&path).await.expect("Failed to open store");
        assert!(path.exists());
        assert!(store.is_empty());
        assert_eq!(db.path(), path.as_path());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = test_db_path(&dir);
        let store = sample_store();

        let db = Database::open(&path).await.unwrap();
        db.save_store(&store).await.expect("Failed to save store");
        db.close().await;

        let (_db, loaded) = open_store(&path).await.unwrap();
        assert_eq!(loaded, store);
        assert_eq!(
            loaded.feed_state("kerbalspaceprogram", Feed::Top).unwrap().post_ids,
            vec!["b".to_string(), "c".to_string()]
        );
    }

    #[tokio::test]
    async fn test_resave_replaces_membership_and_keeps_posts() {
        let dir = TempDir::new().unwrap();
        let path = test_db_path(&dir);
        let db = Database::open(&path).await.unwrap();

        let mut store = sample_store();
        db.save_store(&store).await.unwrap();

        let later = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        store.upsert_feed_result(
            "kerbalspaceprogram",
            Feed::Hot,
            vec![FetchedPost::new("d", "Eve return")],
            later,
        );
        db.save_store(&store).await.unwrap();

        let loaded = db.load_store().await.unwrap();
        assert_eq!(loaded.len(), 4);
        assert!(loaded.post("a").is_some());
        let hot = loaded.feed_state("kerbalspaceprogram", Feed::Hot).unwrap();
        assert_eq!(hot.post_ids, vec!["d".to_string()]);
        assert_eq!(hot.last_refreshed_at, later);
    }

    #[tokio::test]
    async fn test_garbage_file_is_moved_aside() {
        let dir = TempDir::new().unwrap();
        let path = test_db_path(&dir);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"this is not a sqlite database, not even close......").unwrap();

        let (db, store) = open_store(&path).await.expect("Corrupt store must not fail the run");
        assert!(store.is_empty());
        assert_eq!(quarantined_files(&path).len(), 1);

        // The replacement file is usable.
        db.save_store(&sample_store()).await.unwrap();
        assert_eq!(db.load_store().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_dangling_member_is_treated_as_corruption() {
        let dir = TempDir::new().unwrap();
        let path = test_db_path(&dir);

        let db = Database::open(&path).await.unwrap();
        db.save_store(&sample_store()).await.unwrap();
        sqlx::query(
            "INSERT INTO feed_members (subreddit, feed_name, position, post_id) \
             VALUES ('kerbalspaceprogram', 'hot', 99, 'missing')",
        )
        .execute(db.pool())
        .await
        .unwrap();
        db.close().await;

        let (_db, store) = open_store(&path).await.unwrap();
        assert!(store.is_empty());
        assert_eq!(quarantined_files(&path).len(), 1);
    }

    #[tokio::test]
    async fn test_incompatible_version_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let path = test_db_path(&dir);

        let db = Database::open(&path).await.unwrap();
        db.save_store(&sample_store()).await.unwrap();
        sqlx::query("UPDATE store_meta SET value = '2.0' WHERE key = 'format_version'")
            .execute(db.pool())
            .await
            .unwrap();
        db.close().await;

        let (db, store) = open_store(&path).await.unwrap();
        assert!(store.is_empty());
        let version: String =
            sqlx::query_scalar("SELECT value FROM store_meta WHERE key = 'format_version'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(version, FORMAT_VERSION);
    }

    #[tokio::test]
    async fn test_save_reports_lock_held_by_another_writer() {
        let dir = TempDir::new().unwrap();
        let path = test_db_path(&dir);
        let db = Database::open(&path).await.unwrap();

        let mut other = SqliteConnection::connect_with(&SqliteConnectOptions::new().filename(&path))
            .await
            .unwrap();
        sqlx::query("BEGIN IMMEDIATE").execute(&mut other).await.unwrap();

        let result = db.save_store(&sample_store()).await;
        assert!(matches!(result, Err(DatabaseError::DatabaseLocked)));

        sqlx::query("ROLLBACK").execute(&mut other).await.unwrap();
        other.close().await.unwrap();
        db.save_store(&sample_store()).await.unwrap();
        assert_eq!(db.load_store().await.unwrap().len(), 3);
    }

    #[test]
    fn test_version_compatibility() {
        assert!(is_compatible("1.0", "1.0"));
        assert!(is_compatible("1.3", "1.0"));
        assert!(!is_compatible("1.0", "1.2"));
        assert!(!is_compatible("2.0", "1.0"));
        assert!(!is_compatible("garbage", "1.0"));
    }
}
