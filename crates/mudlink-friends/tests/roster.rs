//! Integration tests for the friends roster.

use std::sync::Arc;

use mudlink_friends::{
    Friend, FriendWorld, FriendsError, FriendsRoster, Presence, RosterConfig, unreadable_key,
};
use mudlink_protocol::{Character, CharacterId, PeerId, WorldId};
use mudlink_storage::{FileStorage, MemoryStorage, Storage, StorageError};
use rand::Rng;
use serde_json::{Value, json};

type Store = Arc<MemoryStorage>;

async fn fresh() -> (Store, FriendsRoster<Store>) {
    let storage = Arc::new(MemoryStorage::new());
    let roster = FriendsRoster::load(storage.clone(), RosterConfig::default()).await;
    (storage, roster)
}

async fn reopen(storage: &Store) -> FriendsRoster<Store> {
    FriendsRoster::load(storage.clone(), RosterConfig::default()).await
}

async fn raw_doc(storage: &Store, key: &str) -> Value {
    let bytes = storage.load_raw(key).await.unwrap().unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn peer(id: &str) -> PeerId {
    PeerId::from(id)
}

fn world(id: &str) -> WorldId {
    WorldId::from(id)
}

// =========================================================================
// Friends and bans
// =========================================================================

#[tokio::test]
async fn test_add_friend_persists_and_reloads() {
    let (storage, mut roster) = fresh().await;

    roster.add_friend(Friend::new("p1", "Ayla")).await.unwrap();

    let reloaded = reopen(&storage).await;
    let friend = reloaded.get_friend(&peer("p1")).unwrap();
    assert_eq!(friend.player_name, "Ayla");
    assert!(friend.worlds.is_empty());

    let doc = raw_doc(&storage, "roster/friends").await;
    assert_eq!(doc["version"], 1);
    assert_eq!(doc["entries"][0]["peerId"], "p1");
}

#[tokio::test]
async fn test_add_friend_twice_fails() {
    let (_storage, mut roster) = fresh().await;
    roster.add_friend(Friend::new("p1", "Ayla")).await.unwrap();

    let err = roster.add_friend(Friend::new("p1", "Again")).await.unwrap_err();

    assert!(matches!(err, FriendsError::AlreadyExists(_)));
    assert_eq!(roster.get_friend(&peer("p1")).unwrap().player_name, "Ayla");
}

#[tokio::test]
async fn test_update_friend_replaces_record() {
    let (_storage, mut roster) = fresh().await;
    roster.add_friend(Friend::new("p1", "Ayla")).await.unwrap();

    let mut changed = Friend::new("p1", "Ayla");
    changed.notes = "met in the tavern".into();
    roster.update_friend(changed).await.unwrap();

    assert_eq!(roster.get_friend(&peer("p1")).unwrap().notes, "met in the tavern");
}

#[tokio::test]
async fn test_update_unknown_friend_is_ignored() {
    let (_storage, mut roster) = fresh().await;

    roster.update_friend(Friend::new("ghost", "Nobody")).await.unwrap();

    assert!(!roster.is_friend(&peer("ghost")));
}

#[tokio::test]
async fn test_set_presence() {
    let (_storage, mut roster) = fresh().await;
    roster.add_friend(Friend::new("p1", "Ayla")).await.unwrap();

    roster.set_presence(&peer("p1"), Presence::Online).await.unwrap();
    roster.set_presence(&peer("nobody"), Presence::Away).await.unwrap();

    assert_eq!(
        roster.get_friend(&peer("p1")).unwrap().presence,
        Some(Presence::Online)
    );
}

#[tokio::test]
async fn test_remove_friend_missing_is_noop() {
    let (_storage, mut roster) = fresh().await;
    roster.add_friend(Friend::new("p1", "Ayla")).await.unwrap();

    roster.remove_friend(&peer("p2")).await.unwrap();
    roster.remove_friend(&peer("p1")).await.unwrap();

    assert!(roster.get_friends().is_empty());
}

#[tokio::test]
async fn test_ban_then_unban_restores_friend() {
    let (storage, mut roster) = fresh().await;
    let mut ayla = Friend::new("p1", "Ayla");
    ayla.notes = "keep".into();
    roster.add_friend(ayla.clone()).await.unwrap();

    roster.ban_peer(&peer("p1"), ayla.clone()).await.unwrap();
    assert!(roster.is_banned(&peer("p1")));
    assert!(!roster.is_friend(&peer("p1")));

    let reloaded = reopen(&storage).await;
    assert!(reloaded.is_banned(&peer("p1")));
    assert!(reloaded.get_friends().is_empty());

    roster.unban_peer(&peer("p1")).await.unwrap();
    assert!(!roster.is_banned(&peer("p1")));
    assert_eq!(roster.get_friend(&peer("p1")), Some(ayla));
}

#[tokio::test]
async fn test_ban_non_friend_uses_snapshot() {
    let (_storage, mut roster) = fresh().await;

    roster
        .ban_peer(&peer("troll"), Friend::new("troll", "Troll"))
        .await
        .unwrap();

    let banned = roster.get_banned_peer(&peer("troll")).unwrap();
    assert_eq!(banned.friend.player_name, "Troll");
    assert_eq!(roster.get_banned_peers().len(), 1);
}

#[tokio::test]
async fn test_add_banned_peer_as_friend_fails() {
    let (_storage, mut roster) = fresh().await;
    roster
        .ban_peer(&peer("troll"), Friend::new("troll", "Troll"))
        .await
        .unwrap();

    let err = roster.add_friend(Friend::new("troll", "Troll")).await.unwrap_err();

    assert!(matches!(err, FriendsError::Banned(_)));
}

#[tokio::test]
async fn test_unban_unknown_is_noop() {
    let (_storage, mut roster) = fresh().await;
    roster.unban_peer(&peer("nobody")).await.unwrap();
    assert!(roster.get_friends().is_empty());
}

// =========================================================================
// Loading and migration
// =========================================================================

#[tokio::test]
async fn test_legacy_friends_document_is_migrated() {
    let storage: Store = Arc::new(MemoryStorage::new());
    let legacy = json!([{ "peerId": "p1", "playerName": "Ayla", "notes": "" }]);
    storage.save("roster/friends", &legacy).await.unwrap();

    let roster = reopen(&storage).await;

    assert!(roster.get_friend_worlds(&peer("p1")).unwrap().is_empty());
    let doc = raw_doc(&storage, "roster/friends").await;
    assert_eq!(doc["version"], 1);
    assert_eq!(doc["entries"][0]["worlds"], json!([]));
}

#[tokio::test]
async fn test_corrupt_friends_does_not_block_banned() {
    let storage: Store = Arc::new(MemoryStorage::new());
    storage
        .save_raw("roster/friends", b"{ not json".to_vec())
        .await
        .unwrap();
    let banned = json!({
        "version": 1,
        "entries": [{
            "friend": { "peerId": "troll", "playerName": "Troll", "worlds": [] },
            "bannedAt": 17
        }]
    });
    storage.save("roster/banned", &banned).await.unwrap();

    let roster = reopen(&storage).await;

    assert!(roster.get_friends().is_empty());
    assert!(roster.is_banned(&peer("troll")));
    assert_eq!(roster.get_banned_peer(&peer("troll")).unwrap().banned_at, 17);
}

#[tokio::test]
async fn test_current_document_with_record_missing_worlds_loads_every_friend() {
    let storage: Store = Arc::new(MemoryStorage::new());
    let doc = json!({
        "version": 1,
        "entries": [
            { "peerId": "p1", "playerName": "Ayla", "worlds": [] },
            { "peerId": "p2", "playerName": "Bram" }
        ]
    });
    storage.save("roster/friends", &doc).await.unwrap();

    let mut roster = reopen(&storage).await;
    roster.add_friend(Friend::new("p3", "Cole")).await.unwrap();

    assert!(roster.get_friend_worlds(&peer("p2")).unwrap().is_empty());
    let reloaded = reopen(&storage).await;
    let ids: Vec<String> = reloaded
        .get_friends()
        .into_iter()
        .map(|f| f.peer_id.to_string())
        .collect();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
}

#[tokio::test]
async fn test_unreadable_document_is_copied_aside_before_overwrite() {
    let storage: Store = Arc::new(MemoryStorage::new());
    storage
        .save_raw("roster/friends", b"{ not json".to_vec())
        .await
        .unwrap();

    let mut roster = reopen(&storage).await;
    roster.add_friend(Friend::new("p1", "Ayla")).await.unwrap();

    let aside = storage
        .load_raw(&unreadable_key("roster/friends"))
        .await
        .unwrap();
    assert_eq!(aside, Some(b"{ not json".to_vec()));
    assert_eq!(raw_doc(&storage, "roster/friends").await["entries"][0]["peerId"], "p1");
}

#[tokio::test]
async fn test_unreadable_document_that_cannot_be_copied_is_never_overwritten() {
    let storage: Store = Arc::new(MemoryStorage::new());
    storage
        .save_raw("roster/friends", b"{ not json".to_vec())
        .await
        .unwrap();
    storage.set_read_only(true);
    let mut roster = reopen(&storage).await;
    storage.set_read_only(false);

    let err = roster.add_friend(Friend::new("p1", "Ayla")).await.unwrap_err();

    assert!(matches!(
        err,
        FriendsError::Storage(StorageError::CorruptDocument { .. })
    ));
    assert_eq!(
        storage.load_raw("roster/friends").await.unwrap(),
        Some(b"{ not json".to_vec())
    );
    assert!(
        roster
            .ban_peer(&peer("troll"), Friend::new("troll", "Troll"))
            .await
            .is_err()
    );
    assert!(storage.load_raw("roster/banned").await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_ban_on_file_storage_keeps_friend() {
    let suffix: u64 = rand::rng().random();
    let dir = std::env::temp_dir().join(format!("mudlink-roster-test-{suffix:016x}"));
    let storage = FileStorage::open(&dir).await.unwrap();
    let mut roster = FriendsRoster::load(storage.clone(), RosterConfig::default()).await;
    roster.add_friend(Friend::new("p1", "Ayla")).await.unwrap();
    tokio::fs::create_dir(dir.join("roster%2Fbanned.json"))
        .await
        .unwrap();

    let result = roster.ban_peer(&peer("p1"), Friend::new("p1", "Ayla")).await;

    assert!(result.is_err());
    let reloaded = FriendsRoster::load(storage, RosterConfig::default()).await;
    assert!(reloaded.is_friend(&peer("p1")));
    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn test_peer_in_both_documents_stays_banned() {
    let storage: Store = Arc::new(MemoryStorage::new());
    let friend = json!({ "peerId": "p1", "playerName": "Ayla", "worlds": [] });
    storage
        .save("roster/friends", &json!({ "version": 1, "entries": [friend.clone()] }))
        .await
        .unwrap();
    storage
        .save(
            "roster/banned",
            &json!({ "version": 1, "entries": [{ "friend": friend, "bannedAt": 1 }] }),
        )
        .await
        .unwrap();

    let roster = reopen(&storage).await;

    assert!(roster.is_banned(&peer("p1")));
    assert!(!roster.is_friend(&peer("p1")));
}

// =========================================================================
// Worlds and characters
// =========================================================================

async fn with_world(host: &str) -> (Store, FriendsRoster<Store>) {
    let (storage, mut roster) = fresh().await;
    roster.add_friend(Friend::new("p1", "Ayla")).await.unwrap();
    roster
        .add_friend_world(&peer("p1"), FriendWorld::new("w1", "Lantern Keep", host))
        .await
        .unwrap();
    (storage, roster)
}

#[tokio::test]
async fn test_add_friend_world_for_unknown_friend_fails() {
    let (_storage, mut roster) = fresh().await;

    let err = roster
        .add_friend_world(&peer("p1"), FriendWorld::new("w1", "Keep", "p1"))
        .await
        .unwrap_err();

    assert!(matches!(err, FriendsError::NotFound(_)));
}

#[tokio::test]
async fn test_add_friend_world_twice_fails() {
    let (_storage, mut roster) = with_world("p1").await;

    let err = roster
        .add_friend_world(&peer("p1"), FriendWorld::new("w1", "Other", "p1"))
        .await
        .unwrap_err();

    assert!(matches!(err, FriendsError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_friend_world_queries() {
    let (_storage, mut roster) = with_world("p1").await;
    roster.set_local_peer_id(peer("me"));
    roster
        .add_friend_world(&peer("p1"), FriendWorld::new("w2", "My Place", "me"))
        .await
        .unwrap();

    let hosted = roster.get_friend_hosted_worlds(&peer("p1")).unwrap();
    let mine = roster.get_my_worlds_with_friend(&peer("p1")).unwrap();

    assert_eq!(hosted.len(), 1);
    assert_eq!(hosted[0].world_id, world("w1"));
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].world_id, world("w2"));
    assert!(roster.get_friend_world(&peer("p1"), &world("w9")).unwrap().is_none());
    assert!(matches!(
        roster.get_friend_worlds(&peer("nobody")),
        Err(FriendsError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_my_worlds_without_local_id_is_empty() {
    let (_storage, roster) = with_world("p1").await;

    assert!(roster.get_my_worlds_with_friend(&peer("p1")).unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_friend_world() {
    let (_storage, mut roster) = with_world("p1").await;

    roster.remove_friend_world(&peer("p1"), &world("w1")).await.unwrap();
    roster.remove_friend_world(&peer("p1"), &world("w1")).await.unwrap();

    assert!(roster.get_friend_worlds(&peer("p1")).unwrap().is_empty());
}

#[tokio::test]
async fn test_friend_character_lifecycle() {
    let (storage, mut roster) = with_world("p1").await;
    let hero = Character::new("c1", "Brannoc").with("hp", 12);

    roster
        .add_friend_character(&peer("p1"), &world("w1"), hero.clone())
        .await
        .unwrap();
    assert!(roster.verify_friend_character(&peer("p1"), &world("w1"), &hero));

    let tampered = hero.clone().with("hp", 999);
    assert!(!roster.verify_friend_character(&peer("p1"), &world("w1"), &tampered));

    roster
        .update_friend_character(&peer("p1"), &world("w1"), tampered.clone())
        .await
        .unwrap();
    let reloaded = reopen(&storage).await;
    assert!(reloaded.verify_friend_character(&peer("p1"), &world("w1"), &tampered));
    assert!(!reloaded.verify_friend_character(&peer("p1"), &world("w1"), &hero));

    roster
        .remove_friend_character(&peer("p1"), &world("w1"), &CharacterId::from("c1"))
        .await
        .unwrap();
    assert!(!roster.verify_friend_character(&peer("p1"), &world("w1"), &tampered));
}

#[tokio::test]
async fn test_add_friend_character_errors() {
    let (_storage, mut roster) = with_world("p1").await;
    let hero = Character::new("c1", "Brannoc");

    let missing_world = roster
        .add_friend_character(&peer("p1"), &world("w9"), hero.clone())
        .await
        .unwrap_err();
    assert!(matches!(missing_world, FriendsError::NotFound(_)));

    roster
        .add_friend_character(&peer("p1"), &world("w1"), hero.clone())
        .await
        .unwrap();
    let dup = roster
        .add_friend_character(&peer("p1"), &world("w1"), hero)
        .await
        .unwrap_err();
    assert!(matches!(dup, FriendsError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_update_missing_character_is_ignored() {
    let (_storage, mut roster) = with_world("p1").await;
    let hero = Character::new("c1", "Brannoc");

    roster
        .update_friend_character(&peer("p1"), &world("w1"), hero.clone())
        .await
        .unwrap();
    roster
        .update_friend_character(&peer("nobody"), &world("w1"), hero.clone())
        .await
        .unwrap();

    assert!(!roster.verify_friend_character(&peer("p1"), &world("w1"), &hero));
}

#[tokio::test]
async fn test_write_failure_surfaces_storage_error() {
    let (storage, mut roster) = fresh().await;
    storage.set_read_only(true);

    let err = roster.add_friend(Friend::new("p1", "Ayla")).await.unwrap_err();

    assert!(matches!(err, FriendsError::Storage(_)));
}
