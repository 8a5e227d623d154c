//! Integration tests for the filesystem backend.

use mudlink_storage::{FileStorage, Storage, WriteBatch};
use rand::Rng;

/// A fresh directory under the system temp dir.
fn scratch_dir() -> std::path::PathBuf {
    let suffix: u64 = rand::rng().random();
    std::env::temp_dir().join(format!("mudlink-storage-test-{suffix:016x}"))
}

#[tokio::test]
async fn test_file_storage_save_then_load() {
    let storage = FileStorage::open(scratch_dir()).await.unwrap();

    storage.save("friends", &vec!["a", "b"]).await.unwrap();
    let loaded: Option<Vec<String>> = storage.load("friends").await.unwrap();

    assert_eq!(loaded, Some(vec!["a".to_string(), "b".to_string()]));
    let _ = tokio::fs::remove_dir_all(storage.root()).await;
}

#[tokio::test]
async fn test_file_storage_survives_reopen() {
    let dir = scratch_dir();
    {
        let storage = FileStorage::open(&dir).await.unwrap();
        storage.save("worlds/w1/characters", &42u32).await.unwrap();
    }

    let reopened = FileStorage::open(&dir).await.unwrap();
    let loaded: Option<u32> = reopened.load("worlds/w1/characters").await.unwrap();

    assert_eq!(loaded, Some(42));
    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn test_file_storage_missing_key_and_remove() {
    let storage = FileStorage::open(scratch_dir()).await.unwrap();

    assert!(storage.load_raw("absent").await.unwrap().is_none());
    storage.remove("absent").await.unwrap();

    storage.save_raw("k", b"1".to_vec()).await.unwrap();
    storage.remove("k").await.unwrap();
    assert!(storage.load_raw("k").await.unwrap().is_none());
    let _ = tokio::fs::remove_dir_all(storage.root()).await;
}

#[tokio::test]
async fn test_file_storage_commit_applies_puts_and_deletes() {
    let storage = FileStorage::open(scratch_dir()).await.unwrap();
    storage.save_raw("gone", b"x".to_vec()).await.unwrap();

    let mut batch = WriteBatch::new();
    batch.put("a", b"1".to_vec()).delete("gone");
    storage.commit(batch).await.unwrap();

    assert_eq!(storage.load_raw("a").await.unwrap(), Some(b"1".to_vec()));
    assert!(storage.load_raw("gone").await.unwrap().is_none());
    let _ = tokio::fs::remove_dir_all(storage.root()).await;
}

#[tokio::test]
async fn test_file_storage_commit_failed_stage_changes_nothing() {
    let storage = FileStorage::open(scratch_dir()).await.unwrap();
    storage.save_raw("a", b"old".to_vec()).await.unwrap();
    // A directory where the second put's staging file goes makes the
    // batch fail before any rename.
    tokio::fs::create_dir(storage.root().join("b.json.1.tmp"))
        .await
        .unwrap();

    let mut batch = WriteBatch::new();
    batch.put("a", b"new".to_vec()).put("b", b"1".to_vec());
    let result = storage.commit(batch).await;

    assert!(result.is_err());
    assert_eq!(storage.load_raw("a").await.unwrap(), Some(b"old".to_vec()));
    assert!(storage.load_raw("b").await.unwrap().is_none());
    assert!(!storage.root().join("a.json.0.tmp").exists());
    let _ = tokio::fs::remove_dir_all(storage.root()).await;
}

#[tokio::test]
async fn test_file_storage_commit_failed_rename_stops_batch() {
    let storage = FileStorage::open(scratch_dir()).await.unwrap();
    storage.save_raw("b", b"old".to_vec()).await.unwrap();
    tokio::fs::create_dir(storage.root().join("a.json"))
        .await
        .unwrap();

    let mut batch = WriteBatch::new();
    batch.put("a", b"1".to_vec()).put("b", b"new".to_vec());
    let result = storage.commit(batch).await;

    assert!(result.is_err());
    assert_eq!(storage.load_raw("b").await.unwrap(), Some(b"old".to_vec()));
    assert!(!storage.root().join("b.json.1.tmp").exists());
    let _ = tokio::fs::remove_dir_all(storage.root()).await;
}
