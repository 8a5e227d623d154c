use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use mudlink::prelude::*;

// ---------------------------------------------------------------------------
// World logic: one dark room and a lantern everybody shares
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct LanternEngine {
    lit: Arc<AtomicBool>,
}

struct Player {
    name: String,
    lit: Arc<AtomicBool>,
}

impl MudEngine for LanternEngine {
    type Session = Player;

    fn open_session(&self, peer: Option<&PeerId>) -> Player {
        let name = peer.map_or_else(|| "the keeper".to_string(), |p| format!("visitor {p}"));
        Player {
            name,
            lit: Arc::clone(&self.lit),
        }
    }
}

impl MudSession for Player {
    fn on_join(&mut self) -> Vec<String> {
        vec![format!("Welcome, {}. Type 'look'.", self.name)]
    }

    fn handle_command(&mut self, text: &str) -> Vec<String> {
        let (verb, rest) = text.trim().split_once(' ').unwrap_or((text.trim(), ""));
        match verb {
            "look" if self.lit.load(Ordering::Relaxed) => {
                vec!["A stone hall, warm in lantern light. A door leads north.".into()]
            }
            "look" => vec!["It is pitch dark. You feel a lantern by your feet.".into()],
            "light" => {
                if self.lit.swap(true, Ordering::Relaxed) {
                    vec!["The lantern is already burning.".into()]
                } else {
                    vec!["You light the lantern.".into()]
                }
            }
            "say" if !rest.is_empty() => vec![format!("You say: {rest}")],
            "who" => vec![format!("You are {}.", self.name)],
            _ => vec![format!("You can't '{verb}' here.")],
        }
    }
}

// ---------------------------------------------------------------------------
// Demo: a host and one guest on an in-process network
// ---------------------------------------------------------------------------

async fn settle(host: &mut MudlinkClient<MemoryTransport, LanternEngine, Arc<MemoryStorage>>) {
    while let Ok(true) =
        tokio::time::timeout(Duration::from_millis(20), host.process_next_event()).await
    {}
}

async fn settle_guest(
    guest: &mut SessionAdapter<MemoryTransport, LanternEngine>,
) -> Result<(), MudlinkError> {
    while let Ok(more) = tokio::time::timeout(Duration::from_millis(20), guest.pump()).await {
        if !more? {
            break;
        }
    }
    Ok(())
}

fn print_lines(who: &str, output: &mut OutputReceiver) {
    while let Ok(line) = output.try_recv() {
        println!("[{who}] {line}");
    }
}

#[tokio::main]
async fn main() -> Result<(), MudlinkError> {
    mudlink::logging::init_with_default("warn");

    let net = MemoryNetwork::new();
    let storage = Arc::new(MemoryStorage::new());

    let (mut host, mut host_out) = MudlinkClientBuilder::new()
        .build(net.endpoint_with_id("keeper"), LanternEngine::default(), storage)
        .await;
    host.start().await?;
    host.adapter_mut().start_hosting()?;

    let keep = host.open_world(WorldId::from("lantern-keep")).await?;
    let hall = keep.transaction(|tx| tx.add_thing("Stone Hall", None, None)).await?;
    let (_, keeper_conn) = keep
        .enter_world(EnterWorld {
            character: Character::new("keeper", "The Keeper").with("hp", 10),
            thing_name: "The Keeper".into(),
            location: Some(hall),
            peer: None,
            display_name: "Keeper".into(),
        })
        .await?;
    tracing::info!(connection = %keeper_conn, "keeper in the hall");

    host.roster_mut().add_friend(Friend::new("wren", "Wren")).await?;

    let (mut guest, mut guest_out) =
        SessionAdapter::new(net.endpoint_with_id("wren"), LanternEngine::default());
    guest.start().await?;
    guest.join_session(PeerId::from("keeper")).await?;
    print_lines("wren", &mut guest_out);

    for line in ["look", "light", "look", "say hello there", "who"] {
        guest.command(line).await?;
    }
    settle(&mut host).await;
    settle_guest(&mut guest).await?;
    print_lines("wren", &mut guest_out);

    host.adapter_mut().command("look").await?;
    print_lines("keeper", &mut host_out);

    guest.reset().await;
    settle(&mut host).await;
    println!(
        "guests left: {}, wren is {:?}",
        host.adapter().guest_count(),
        host.roster()
            .get_friend(&PeerId::from("wren"))
            .and_then(|f| f.presence)
    );

    guest.shutdown().await?;
    host.shutdown().await?;
    Ok(())
}
