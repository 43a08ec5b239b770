//! Headless bot that joins a running arena and plays randomly.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use rand::Rng;
use shared::{decode_server_event, encode_client_event, ClientEvent, PlayerId, ServerEvent};
use std::time::Duration;
use tokio::time::interval;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server WebSocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:3000")]
    url: String,

    /// Display name
    #[arg(short, long, default_value = "bot")]
    name: String,

    /// Milliseconds between bot actions
    #[arg(short, long, default_value = "250")]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let (ws_stream, _) = connect_async(args.url.as_str()).await?;
    info!("Connected to {}", args.url);
    let (mut write, mut read) = ws_stream.split();

    let join = ClientEvent::JoinGame {
        name: Some(args.name.clone()),
    };
    write.send(Message::Text(encode_client_event(&join)?)).await?;

    let mut my_id: Option<PlayerId> = None;
    let mut ammo = 0u32;
    let mut actions = interval(Duration::from_millis(args.interval_ms.max(10)));
    let mut updates = 0u64;

    loop {
        tokio::select! {
            message = read.next() => {
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Server closed the connection");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("Connection error: {}", e);
                        break;
                    }
                };

                match decode_server_event(&text) {
                    Ok(ServerEvent::GameFull) => {
                        info!("Game is full");
                        break;
                    }
                    Ok(ServerEvent::GameState(snapshot)) => {
                        if let Some(me) = snapshot.players.iter().find(|p| p.name == args.name) {
                            my_id = Some(me.id);
                            ammo = me.ammo;
                        }
                        info!("Joined as {:?}, {} players present", my_id, snapshot.players.len());
                    }
                    Ok(ServerEvent::GameUpdate(snapshot)) => {
                        updates += 1;
                        if let Some(me) = my_id.and_then(|id| snapshot.players.iter().find(|p| p.id == id)) {
                            ammo = me.ammo;
                            if updates % 50 == 0 {
                                info!(
                                    "t={}ms health={} ammo={} score={} kills={}",
                                    snapshot.game_time, me.health, me.ammo, me.score, me.kills
                                );
                            }
                        }
                    }
                    Ok(event) => info!("<- {}", event.name()),
                    Err(e) => warn!("Undecodable frame: {}", e),
                }
            }

            _ = actions.tick() => {
                if my_id.is_none() {
                    continue;
                }
                let event = {
                    let mut rng = rand::thread_rng();
                    match rng.gen_range(0..10) {
                        0..=5 => ClientEvent::PlayerMove {
                            x: rng.gen_range(100.0..900.0),
                            y: rng.gen_range(100.0..700.0),
                            z: 0.0,
                            rotation: rng.gen_range(0.0..std::f32::consts::TAU),
                            crouching: rng.gen_bool(0.2),
                        },
                        6..=8 if ammo > 0 => ClientEvent::Shoot {},
                        6..=8 => ClientEvent::Reload {},
                        _ => ClientEvent::ChatMessage {
                            text: "beep boop".to_string(),
                        },
                    }
                };
                write.send(Message::Text(encode_client_event(&event)?)).await?;
            }
        }
    }

    Ok(())
}
