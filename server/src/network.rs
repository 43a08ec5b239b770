//! Server network layer: WebSocket connections and the single-writer game loop

use crate::client_manager::{ClientId, ClientManager};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::session::{Effect, GameSession, PendingSpawn};
use crate::spawner::SpawnScheduler;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{decode_client_event, encode_server_event, ClientEvent};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Messages sent from connection tasks and timers to the server loop
#[derive(Debug)]
pub enum ServerMessage {
    Connected {
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<String>,
        reply: oneshot::Sender<Option<ClientId>>,
    },
    Event {
        client_id: ClientId,
        event: ClientEvent,
    },
    Disconnected {
        client_id: ClientId,
    },
    SpawnDue(PendingSpawn),
    Shutdown,
}

/// Cloneable handle for stopping a running server.
///
/// Handles stay valid after the server exits; shutting down a stopped
/// server is a no-op.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ServerHandle {
    /// Asks the server loop to stop after the message it is processing.
    /// Pending respawn timers are cancelled and the listener is closed.
    pub fn shutdown(&self) {
        if self.tx.send(ServerMessage::Shutdown).is_err() {
            debug!("Server already stopped");
        }
    }
}

/// Owns the game session and every connection. All state mutation happens on
/// the task running [`Server::run`].
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    clients: ClientManager,
    session: GameSession,
    spawner: SpawnScheduler<ServerMessage>,
    tick_duration: Duration,
    listener_task: Option<JoinHandle<()>>,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    /// Binds the listener and builds an idle session.
    ///
    /// Nothing is accepted until [`Server::run`] is awaited. Binding to port 0
    /// picks an ephemeral port; [`Server::local_addr`] reports the real one.
    ///
    /// # Errors
    /// [`ServerError::Bind`] if the address is invalid or in use.
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(ServerError::Bind)?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on ws://{}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let tick_duration = config.game.tick_period;
        let session = match config.seed {
            Some(seed) => GameSession::with_seed(config.game, seed),
            None => GameSession::new(config.game),
        };

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: ClientManager::new(config.max_connections),
            session,
            spawner: SpawnScheduler::new(server_tx.clone(), ServerMessage::SpawnDue),
            tick_duration,
            listener_task: None,
            server_tx,
            server_rx,
        })
    }

    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns a handle that can stop the server from another task.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            tx: self.server_tx.clone(),
        }
    }

    /// Spawns the task accepting TCP connections
    fn spawn_listener(&mut self) -> Result<(), ServerError> {
        let listener = self.listener.take().ok_or(ServerError::LoopClosed)?;
        let server_tx = self.server_tx.clone();

        self.listener_task = Some(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        tokio::spawn(Self::serve_connection(stream, addr, server_tx.clone()));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }));
        Ok(())
    }

    /// Runs one connection: handshake, registration, then a reader loop
    /// forwarding decoded events while a writer task drains the outbound queue.
    async fn serve_connection(
        stream: TcpStream,
        addr: SocketAddr,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!("WebSocket handshake failed for {}: {}", addr, e);
                return;
            }
        };
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<String>();
        let (reply_tx, reply_rx) = oneshot::channel();
        let registered = server_tx
            .send(ServerMessage::Connected {
                addr,
                sender: frame_tx,
                reply: reply_tx,
            })
            .is_ok();

        let client_id = match reply_rx.await {
            Ok(Some(id)) if registered => id,
            _ => {
                info!("Refusing connection from {}", addr);
                let _ = ws_sender.send(Message::Close(None)).await;
                return;
            }
        };

        let writer = tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                if ws_sender.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        while let Some(message) = ws_receiver.next().await {
            match message {
                Ok(Message::Text(text)) => match decode_client_event(&text) {
                    Ok(event) => {
                        if server_tx
                            .send(ServerMessage::Event { client_id, event })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => debug!("Invalid event from client {}: {}", client_id, e),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("WebSocket error for client {}: {}", client_id, e);
                    break;
                }
            }
        }

        let _ = server_tx.send(ServerMessage::Disconnected { client_id });
        writer.abort();
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Connected {
                addr,
                sender,
                reply,
            } => {
                let client_id = self.clients.add_client(addr, sender);
                if client_id.is_none() {
                    warn!("Connection limit reached, rejecting {}", addr);
                }
                let _ = reply.send(client_id);
            }
            ServerMessage::Event { client_id, event } => {
                self.session.handle_event(client_id, event, Instant::now());
            }
            ServerMessage::Disconnected { client_id } => {
                self.clients.remove_client(&client_id);
                self.session.leave(client_id);
            }
            ServerMessage::SpawnDue(spawn) => self.session.spawn_due(spawn),
            ServerMessage::Shutdown => {}
        }
        self.apply_effects();
    }

    /// Carries out everything the session asked for, in order
    fn apply_effects(&mut self) {
        for effect in self.session.take_effects() {
            match effect {
                Effect::Send { target, event } => match encode_server_event(&event) {
                    Ok(frame) => {
                        self.clients.deliver(target, &frame);
                    }
                    Err(e) => error!("Failed to encode {}: {}", event.name(), e),
                },
                Effect::ScheduleSpawn { spawn, delay } => self.spawner.schedule(spawn, delay),
                Effect::CancelSpawns => self.spawner.cancel_all(),
            }
        }
    }

    /// Main server loop: inbound events, respawn timers and the fixed tick are
    /// all handled here, one at a time.
    ///
    /// Returns once a shutdown is requested. Connections still open at that
    /// point see their socket close when the process exits.
    pub async fn run(mut self) -> Result<(), ServerError> {
        self.spawn_listener()?;

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Server started, ticking every {}ms",
            self.tick_duration.as_millis()
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                        Some(message) => self.handle_message(message),
                    }
                },

                _ = tick_interval.tick() => {
                    self.session.tick(Instant::now());
                    self.apply_effects();
                },
            }
        }

        self.spawner.cancel_all();
        if let Some(task) = self.listener_task.take() {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::session::SpawnKind;
    use shared::{decode_server_event, ServerEvent};

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            max_connections: 2,
            seed: Some(3),
            game: GameConfig::default(),
        }
    }

    fn connect(
        server: &mut Server,
        port: u16,
    ) -> (Option<ClientId>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (reply_tx, mut reply_rx) = oneshot::channel();
        server.handle_message(ServerMessage::Connected {
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            sender: tx,
            reply: reply_tx,
        });
        (reply_rx.try_recv().unwrap(), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            events.push(decode_server_event(&frame).unwrap());
        }
        events
    }

    #[tokio::test]
    async fn test_bind_reports_ephemeral_port() {
        let server = Server::new(test_config()).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let mut config = test_config();
        config.bind_addr = "not an address".to_string();
        assert!(matches!(
            Server::new(config).await,
            Err(ServerError::Bind(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let mut server = Server::new(test_config()).await.unwrap();
        assert_eq!(connect(&mut server, 5000).0, Some(1));
        assert_eq!(connect(&mut server, 5001).0, Some(2));
        assert_eq!(connect(&mut server, 5002).0, None);
    }

    #[tokio::test]
    async fn test_join_routes_frames_to_connections() {
        let mut server = Server::new(test_config()).await.unwrap();
        let (a, mut rx_a) = connect(&mut server, 5000);
        let (b, mut rx_b) = connect(&mut server, 5001);
        let (a, b) = (a.unwrap(), b.unwrap());

        server.handle_message(ServerMessage::Event {
            client_id: a,
            event: ClientEvent::JoinGame {
                name: Some("alpha".to_string()),
            },
        });

        let to_a = drain(&mut rx_a);
        let to_b = drain(&mut rx_b);
        assert_eq!(to_a.len(), 1);
        assert_eq!(to_a[0].name(), "gameState");
        assert_eq!(to_b.len(), 1);
        assert_eq!(to_b[0].name(), "playerJoined");

        server.handle_message(ServerMessage::Event {
            client_id: b,
            event: ClientEvent::JoinGame { name: None },
        });
        let to_a: Vec<_> = drain(&mut rx_a).iter().map(|e| e.name()).collect();
        let to_b: Vec<_> = drain(&mut rx_b).iter().map(|e| e.name()).collect();
        assert_eq!(to_a, vec!["playerJoined", "gameStarted"]);
        assert_eq!(to_b, vec!["gameState", "gameStarted"]);
    }

    #[tokio::test]
    async fn test_disconnect_announces_departure() {
        let mut server = Server::new(test_config()).await.unwrap();
        let (a, _rx_a) = connect(&mut server, 5000);
        let (b, mut rx_b) = connect(&mut server, 5001);
        let (a, b) = (a.unwrap(), b.unwrap());
        for client_id in [a, b] {
            server.handle_message(ServerMessage::Event {
                client_id,
                event: ClientEvent::JoinGame { name: None },
            });
        }
        drain(&mut rx_b);

        server.handle_message(ServerMessage::Disconnected { client_id: a });
        assert_eq!(drain(&mut rx_b), vec![ServerEvent::PlayerLeft(a)]);
        assert_eq!(server.clients.len(), 1);
    }

    #[tokio::test]
    async fn test_spawn_due_broadcasts() {
        let mut server = Server::new(test_config()).await.unwrap();
        let (_, mut rx) = connect(&mut server, 5000);

        let round = server.session.round();
        server.handle_message(ServerMessage::SpawnDue(PendingSpawn {
            kind: SpawnKind::Brainrot,
            round,
        }));
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "newBrainrotSpawned");
    }

    fn join(server: &mut Server, client_id: ClientId) {
        server.handle_message(ServerMessage::Event {
            client_id,
            event: ClientEvent::JoinGame { name: None },
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_respawn_is_discarded_after_reset() {
        let mut server = Server::new(test_config()).await.unwrap();
        let (a, _rx_a) = connect(&mut server, 5000);
        let (b, _rx_b) = connect(&mut server, 5001);
        let (a, b) = (a.unwrap(), b.unwrap());
        join(&mut server, a);
        join(&mut server, b);

        let brainrot_id = server.session.state().brainrots[0].id;
        server.handle_message(ServerMessage::Event {
            client_id: a,
            event: ClientEvent::CollectBrainrot { brainrot_id },
        });

        // Let the respawn timer post into the loop's queue without draining it
        tokio::time::sleep(Duration::from_secs(3)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        server.handle_message(ServerMessage::Disconnected { client_id: a });
        server.handle_message(ServerMessage::Disconnected { client_id: b });
        let (c, mut rx_c) = connect(&mut server, 5002);
        let (d, _rx_d) = connect(&mut server, 5003);
        let (c, d) = (c.unwrap(), d.unwrap());
        join(&mut server, c);
        join(&mut server, d);
        drain(&mut rx_c);
        assert_eq!(server.session.state().live_brainrots(), 10);

        let mut queued = 0;
        while let Ok(message) = server.server_rx.try_recv() {
            queued += 1;
            server.handle_message(message);
        }
        assert_eq!(queued, 1);
        assert_eq!(server.session.state().live_brainrots(), 10);
        assert_eq!(server.session.state().brainrots.len(), 10);
        assert!(drain(&mut rx_c)
            .iter()
            .all(|event| event.name() != "newBrainrotSpawned"));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let server = Server::new(test_config()).await.unwrap();
        let handle = server.handle();
        let task = tokio::spawn(server.run());

        handle.shutdown();
        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
