//! Integration tests for the client facade: roster filtering, presence,
//! and world lifecycle over an in-memory mesh.

use std::sync::Arc;
use std::time::Duration;

use mudlink::prelude::*;

// =========================================================================
// Mock engine
// =========================================================================

struct Echo;

struct EchoSession;

impl MudEngine for Echo {
    type Session = EchoSession;

    fn open_session(&self, _peer: Option<&PeerId>) -> EchoSession {
        EchoSession
    }
}

impl MudSession for EchoSession {
    fn handle_command(&mut self, text: &str) -> Vec<String> {
        vec![text.to_uppercase()]
    }
}

type Client = MudlinkClient<MemoryTransport, Echo, Arc<MemoryStorage>>;

async fn client(net: &MemoryNetwork, id: &str) -> (Client, OutputReceiver, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let (mut client, output) = MudlinkClientBuilder::new()
        .build(net.endpoint_with_id(id), Echo, storage.clone())
        .await;
    client.start().await.unwrap();
    (client, output, storage)
}

async fn pump_until_idle(client: &mut Client) {
    while let Ok(true) =
        tokio::time::timeout(Duration::from_millis(20), client.process_next_event()).await
    {}
}

async fn guest(net: &MemoryNetwork, id: &str) -> SessionAdapter<MemoryTransport, Echo> {
    let (mut adapter, _output) = SessionAdapter::new(net.endpoint_with_id(id), Echo);
    adapter.start().await.unwrap();
    adapter
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_start_sets_roster_local_id() {
    let net = MemoryNetwork::new();
    let (client, _out, _) = client(&net, "me").await;

    assert_eq!(client.roster().local_peer_id(), Some(&PeerId::from("me")));
    assert_eq!(client.adapter().role(), &Role::Solo);
}

#[tokio::test]
async fn test_banned_peer_cannot_join() {
    let net = MemoryNetwork::new();
    let (mut host, _out, _) = client(&net, "host").await;
    host.roster_mut()
        .ban_peer(&PeerId::from("troll"), Friend::new("troll", "Troll"))
        .await
        .unwrap();
    host.adapter_mut().start_hosting().unwrap();

    let mut troll = guest(&net, "troll").await;
    let mut friend = guest(&net, "friend").await;
    troll.join_session(PeerId::from("host")).await.unwrap();
    friend.join_session(PeerId::from("host")).await.unwrap();
    pump_until_idle(&mut host).await;

    assert_eq!(host.adapter().guest_peers(), vec![PeerId::from("friend")]);
}

#[tokio::test]
async fn test_friend_presence_follows_connection() {
    let net = MemoryNetwork::new();
    let (mut host, _out, _) = client(&net, "host").await;
    host.roster_mut()
        .add_friend(Friend::new("alice", "Alice"))
        .await
        .unwrap();

    let mut alice = guest(&net, "alice").await;
    pump_until_idle(&mut host).await;
    let online = host.roster().get_friend(&PeerId::from("alice")).unwrap();
    assert_eq!(online.presence, Some(Presence::Online));

    alice.shutdown().await.unwrap();
    pump_until_idle(&mut host).await;
    let offline = host.roster().get_friend(&PeerId::from("alice")).unwrap();
    assert_eq!(offline.presence, Some(Presence::Offline));
}

#[tokio::test]
async fn test_disconnect_drops_world_connections() {
    let net = MemoryNetwork::new();
    let (mut host, _out, _) = client(&net, "host").await;
    let mut bob = guest(&net, "bob").await;
    pump_until_idle(&mut host).await;

    let keep = WorldId::from("keep");
    let world = host.open_world(keep.clone()).await.unwrap();
    world
        .enter_world(EnterWorld {
            character: Character::new("c-bob", "Bob"),
            thing_name: "Bob".into(),
            location: None,
            peer: Some(PeerId::from("bob")),
            display_name: "Bob".into(),
        })
        .await
        .unwrap();

    bob.shutdown().await.unwrap();
    pump_until_idle(&mut host).await;

    let world = host.world(&keep).unwrap();
    assert!(world.connections_for(Some(&PeerId::from("bob"))).is_empty());
    assert!(world.get_character(&CharacterId::from("c-bob")).is_some());
}

#[tokio::test]
async fn test_guest_leave_drops_world_connections() {
    let net = MemoryNetwork::new();
    let (mut host, _out, _) = client(&net, "host").await;
    host.adapter_mut().start_hosting().unwrap();
    let mut bob = guest(&net, "bob").await;
    bob.join_session(PeerId::from("host")).await.unwrap();
    pump_until_idle(&mut host).await;

    let keep = WorldId::from("keep");
    let world = host.open_world(keep.clone()).await.unwrap();
    world
        .enter_world(EnterWorld {
            character: Character::new("c-bob", "Bob"),
            thing_name: "Bob".into(),
            location: None,
            peer: Some(PeerId::from("bob")),
            display_name: "Bob".into(),
        })
        .await
        .unwrap();

    bob.reset().await;
    pump_until_idle(&mut host).await;

    assert_eq!(host.adapter().guest_count(), 0);
    let world = host.world(&keep).unwrap();
    assert!(world.connections_for(Some(&PeerId::from("bob"))).is_empty());
    assert_eq!(bob.role(), &Role::Solo);
}

#[tokio::test]
async fn test_ban_evicts_connected_guest() {
    let net = MemoryNetwork::new();
    let (mut host, _out, _) = client(&net, "host").await;
    host.adapter_mut().start_hosting().unwrap();
    let mut troll = guest(&net, "troll").await;
    troll.join_session(PeerId::from("host")).await.unwrap();
    pump_until_idle(&mut host).await;
    assert_eq!(host.adapter().guest_count(), 1);

    host.ban_peer(&PeerId::from("troll"), Friend::new("troll", "Troll"))
        .await
        .unwrap();
    troll.command("look").await.unwrap();
    pump_until_idle(&mut host).await;

    assert_eq!(host.adapter().guest_count(), 0);
    assert!(host.roster().is_banned(&PeerId::from("troll")));
}

#[tokio::test]
async fn test_close_world_persists_and_reopens() {
    let net = MemoryNetwork::new();
    let (mut host, _out, _) = client(&net, "host").await;
    let keep = WorldId::from("keep");

    let world = host.open_world(keep.clone()).await.unwrap();
    world
        .enter_world(EnterWorld {
            character: Character::new("c1", "Brannoc"),
            thing_name: "Brannoc".into(),
            location: None,
            peer: None,
            display_name: "Bran".into(),
        })
        .await
        .unwrap();

    host.close_world(&keep).await.unwrap();
    assert!(host.world(&keep).is_none());
    host.close_world(&keep).await.unwrap();

    let reopened = host.open_world(keep).await.unwrap();
    assert!(reopened.connections().is_empty());
    assert_eq!(reopened.characters().len(), 1);
}

#[tokio::test]
async fn test_run_ends_after_shutdown() {
    let net = MemoryNetwork::new();
    let (mut host, _out, _) = client(&net, "host").await;

    host.shutdown().await.unwrap();
    host.run().await;

    assert_eq!(host.adapter().role(), &Role::Uninitialized);
}
