//! Integration tests for the bomb arena server
//!
//! These tests drive rooms, sessions and the real WebSocket listener across
//! crate boundaries.

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::client_manager::ClientManager;
use server::grid::spiral_cell;
use server::leaderboard::Leaderboard;
use server::registry::RoomRegistry;
use server::room::{Room, RoomSettings};
use server::session::GameSession;
use shared::{Cell, ClientEvent, Direction, RoomStatus, ServerEvent, GRID_HEIGHT, GRID_WIDTH};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const DT: f32 = 1000.0 / 30.0;

fn open_room(settings: RoomSettings) -> Room {
    Room::with_rng(
        "ARENA".to_string(),
        RoomSettings {
            soft_block_density: 0.0,
            ..settings
        },
        StdRng::seed_from_u64(11),
    )
}

/// Steps in one direction until something solid is in the way.
fn walk_until_blocked(room: &mut Room, id: u32, direction: Direction) -> usize {
    let mut steps = 0;
    while steps < 500 && room.move_player(id, direction) {
        steps += 1;
    }
    steps
}

/// Ticks at 30 Hz until the round leaves PLAYING or `max_ms` passes.
fn run_until_round_over(room: &mut Room, start: Instant, max_ms: f32) -> Instant {
    let mut now = start;
    let mut elapsed = 0.0;
    while elapsed < max_ms && room.status() == RoomStatus::Playing {
        now += Duration::from_secs_f32(DT / 1000.0);
        room.update(DT, now);
        elapsed += DT;
    }
    now
}

/// GAMEPLAY SCENARIOS
mod gameplay_tests {
    use super::*;

    /// A bombs the corridor B is standing in, walks away and wins.
    #[test]
    fn two_player_bomb_kill() {
        let mut room = open_room(RoomSettings::default());
        room.add_player(1, Some("A".to_string()), None).unwrap();
        room.add_player(2, Some("B".to_string()), None).unwrap();
        let start = Instant::now();
        assert!(room.start_game(1, start));

        assert!(room.place_bomb(1));
        assert!(walk_until_blocked(&mut room, 1, Direction::Down) > 0);
        assert_eq!(room.player(1).unwrap().cell(), (1, 11));

        walk_until_blocked(&mut room, 2, Direction::Up);
        walk_until_blocked(&mut room, 2, Direction::Left);
        assert_eq!(room.player(2).unwrap().cell(), (2, 1));

        run_until_round_over(&mut room, start, 5000.0);

        assert_eq!(room.status(), RoomStatus::Ended);
        assert_eq!(room.winner(), Some(1));
        assert_eq!(room.match_winner(), Some(1));
        assert_eq!(room.player(1).unwrap().kills, 1);
        assert!(!room.player(2).unwrap().alive);
        assert_eq!(room.player(1).unwrap().active_bombs, 0);
    }

    /// Sudden death walls the map in from the top-left corner.
    #[test]
    fn sudden_death_spiral_order() {
        assert_eq!(spiral_cell(GRID_WIDTH, GRID_HEIGHT, 0), Some((0, 0)));
        assert_eq!(spiral_cell(GRID_WIDTH, GRID_HEIGHT, 14), Some((14, 0)));

        let mut room = open_room(RoomSettings {
            sudden_death_delay: Duration::ZERO,
            ..RoomSettings::default()
        });
        room.add_player(1, None, None).unwrap();
        room.add_player(2, None, None).unwrap();
        let start = Instant::now();
        assert!(room.start_game(1, start));

        run_until_round_over(&mut room, start, 2000.0);

        let index = room.sudden_death_index();
        assert!((4..=5).contains(&index), "index {index}");
        assert_eq!(room.grid().get(0, 0), Some(Cell::Wall));
        assert_eq!(room.status(), RoomStatus::Playing);
    }

    /// Best of three: two straight round wins settle the match.
    #[test]
    fn best_of_three_match() {
        let mut room = open_room(RoomSettings {
            match_format: 3,
            ..RoomSettings::default()
        });
        room.add_player(1, None, None).unwrap();
        room.add_player(2, None, None).unwrap();
        room.add_player(3, None, None).unwrap();

        for round in 1..=2 {
            assert!(room.start_game(1, Instant::now()));
            assert_eq!(room.current_round(), round);
            room.remove_player(3);
            room.remove_player(2);
            assert_eq!(room.round_wins(1), round);

            if round == 1 {
                assert_eq!(room.status(), RoomStatus::RoundEnd);
                assert_eq!(room.winner(), Some(1));
                room.add_player(2, None, None).unwrap_err();
                assert!(room.next_round(1));
                room.add_player(2, None, None).unwrap();
                room.add_player(3, None, None).unwrap();
            }
        }

        assert_eq!(room.status(), RoomStatus::Ended);
        assert_eq!(room.match_winner(), Some(1));
        assert!(room.restart_match(1));
        assert_eq!(room.current_round(), 1);
        assert_eq!(room.round_wins(1), 0);
    }
}

/// SESSION FLOW TESTS
mod session_tests {
    use super::*;

    fn connect(session: &mut GameSession) -> (u32, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (session.connect(tx).unwrap(), rx)
    }

    fn errors(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<String> {
        let mut found = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ServerEvent::Error(message) = event {
                found.push(message);
            }
        }
        found
    }

    #[test]
    fn unknown_room_code() {
        let mut session = GameSession::new(
            RoomRegistry::new(),
            ClientManager::new(8),
            Leaderboard::in_memory(),
        );
        let (id, mut rx) = connect(&mut session);

        session.handle_event(
            id,
            ClientEvent::JoinRoom {
                room_code: "NOPE".to_string(),
                player_name: Some("Ada".to_string()),
                avatar: None,
            },
            Instant::now(),
        );

        assert_eq!(errors(&mut rx), vec!["Coordinates not found".to_string()]);
    }

    #[test]
    fn finished_match_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaderboard.json");

        let mut session = GameSession::new(
            RoomRegistry::with_rng(StdRng::seed_from_u64(5)),
            ClientManager::new(8),
            Leaderboard::load(&path),
        );
        let (a, _rx_a) = connect(&mut session);
        let (b, _rx_b) = connect(&mut session);

        session.handle_event(
            a,
            ClientEvent::CreateRoom {
                player_name: Some("Ada".to_string()),
                avatar: Some("🐙".to_string()),
                settings: None,
            },
            Instant::now(),
        );
        let code = session.clients().room_of(a).unwrap().to_string();
        session.handle_event(
            b,
            ClientEvent::JoinRoom {
                room_code: code.clone(),
                player_name: Some("Bo".to_string()),
                avatar: None,
            },
            Instant::now(),
        );
        session.handle_event(a, ClientEvent::StartGame, Instant::now());
        session.handle_event(b, ClientEvent::LeaveRoom, Instant::now());

        assert_eq!(
            session.rooms().get(&code).map(|r| r.status()),
            Some(RoomStatus::Ended)
        );

        let reloaded = Leaderboard::load(&path);
        assert_eq!(reloaded.get("Ada").map(|r| r.wins), Some(1));
        assert_eq!(session.stats().leaderboard[0].name, "Ada");
    }
}

/// WEBSOCKET TESTS
mod network_tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use server::config::ServerConfig;
    use server::network::{Server, ServerMessage};
    use tokio::time::timeout;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message;

    /// Reads frames until one decodes to an event matching `pick`.
    async fn next_matching<S, T>(read: &mut S, pick: impl Fn(ServerEvent) -> Option<T>) -> T
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + Unpin,
    {
        loop {
            let frame = timeout(Duration::from_secs(2), read.next())
                .await
                .expect("timed out waiting for server")
                .expect("connection closed")
                .expect("websocket error");
            if let Message::Text(text) = frame {
                let event: ServerEvent = serde_json::from_str(&text).unwrap();
                if let Some(found) = pick(event) {
                    return found;
                }
            }
        }
    }

    #[tokio::test]
    async fn websocket_create_and_join() {
        let config = ServerConfig {
            port: 0,
            leaderboard_path: None,
            ..ServerConfig::default()
        };
        let mut server = Server::new(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.handle();
        let server_task = tokio::spawn(async move { server.run().await.is_ok() });

        let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        let (mut write, mut read) = ws.split();

        let online = next_matching(&mut read, |e| match e {
            ServerEvent::ServerStats(stats) => Some(stats.online_players),
            _ => None,
        })
        .await;
        assert_eq!(online, 1);

        write
            .send(Message::Text("not json".to_string()))
            .await
            .unwrap();
        write
            .send(Message::Text(
                r#"{"event":"createRoom","data":{"playerName":"Ada"}}"#.to_string(),
            ))
            .await
            .unwrap();

        let snapshot = next_matching(&mut read, |e| match e {
            ServerEvent::Init(snapshot) => Some(snapshot),
            _ => None,
        })
        .await;
        assert_eq!(snapshot.players[0].name, "Ada");
        assert_eq!(snapshot.game_state, RoomStatus::Lobby);
        assert_eq!(snapshot.grid.len(), GRID_HEIGHT);

        write
            .send(Message::Text(
                r#"{"event":"joinRoom","data":{"roomCode":"!!!!"}}"#.to_string(),
            ))
            .await
            .unwrap();
        let error = next_matching(&mut read, |e| match e {
            ServerEvent::Error(message) => Some(message),
            _ => None,
        })
        .await;
        assert_eq!(error, "Coordinates not found");

        handle.send(ServerMessage::Shutdown).unwrap();
        assert!(timeout(Duration::from_secs(2), server_task)
            .await
            .unwrap()
            .unwrap());
    }
}
