//! Scripted bot for poking a running server: opens a room, starts it, drops a
//! bomb, walks away from it and prints what comes back.

use futures_util::{SinkExt, StreamExt};
use shared::{ClientEvent, Direction, ServerEvent};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:3000".to_string());

    println!("Connecting to {}", url);
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    let (mut write, mut read) = ws_stream.split();

    let script = [
        ClientEvent::CreateRoom {
            player_name: Some("Bot".to_string()),
            avatar: None,
            settings: None,
        },
        ClientEvent::StartGame,
        ClientEvent::PlaceBomb,
        ClientEvent::Move(Direction::Right),
        ClientEvent::Move(Direction::Right),
        ClientEvent::Move(Direction::Right),
        ClientEvent::Move(Direction::Down),
        ClientEvent::Move(Direction::Down),
    ];

    for event in script {
        println!("-> {:?}", event);
        write.send(Message::Text(serde_json::to_string(&event)?)).await?;
        sleep(Duration::from_millis(100)).await;
    }

    // Watch long enough for the fuse to burn down.
    let mut updates = 0;
    while let Ok(Some(frame)) = timeout(Duration::from_secs(5), read.next()).await {
        let Message::Text(text) = frame? else {
            continue;
        };
        match serde_json::from_str::<ServerEvent>(&text)? {
            ServerEvent::Init(snapshot) => {
                println!("Joined room {} as host {:?}", snapshot.room_code, snapshot.host_id);
            }
            ServerEvent::StateUpdate(snapshot) => {
                updates += 1;
                if updates % 15 == 0 {
                    let me = snapshot.players.first();
                    println!(
                        "[{}] {:?}: me at {:?}, {} bombs, {} explosions",
                        updates,
                        snapshot.game_state,
                        me.map(|p| (p.x, p.y, p.alive)),
                        snapshot.bombs.len(),
                        snapshot.explosions.len()
                    );
                }
            }
            ServerEvent::Error(message) => println!("Server error: {}", message),
            ServerEvent::ServerStats(stats) => println!(
                "Stats: {} online, {} rooms, {} ranked",
                stats.online_players,
                stats.active_rooms,
                stats.leaderboard.len()
            ),
        }
    }

    write.send(Message::Close(None)).await?;
    println!("Received {} state updates", updates);
    Ok(())
}
