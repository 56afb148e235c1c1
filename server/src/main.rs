use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use clap::Parser;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use planning_poker_protocol::{ClientToServer, ServerToClient};
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

mod config;
mod error;
mod peers;
mod room;

use config::Args;
use error::ServerError;
use peers::Peers;
use room::{short, ConnId, Outcome, Room};

/// The room together with the connections it talks to. One lock guards both,
/// so every client event is applied and broadcast as a single step.
#[derive(Debug, Default)]
struct Hub {
    room: Room,
    peers: Peers,
}

#[derive(Clone, Default)]
struct AppState {
    inner: Arc<Mutex<Hub>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let addr = args.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    tracing::info!("server listening on ws://{addr}/ws");

    axum::serve(listener, router(AppState::default()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!("server stopped");
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let (tx_out, mut rx_out) = tokio::sync::mpsc::unbounded_channel::<ServerToClient>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx_out.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(event = msg.event_name(), "serialize failed: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let my_id: ConnId = Uuid::new_v4();
    {
        let mut hub = state.inner.lock();
        hub.peers.insert(my_id, tx_out);
        let Hub { room, peers } = &*hub;
        room.connect(my_id, peers);
        tracing::info!(conn = %short(my_id), connections = peers.len(), "connected");
    }

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(t)) => match serde_json::from_str::<ClientToServer>(&t) {
                Ok(cmd) => route_cmd(cmd, &state, my_id),
                Err(e) => tracing::debug!(conn = %short(my_id), "ignoring frame: {e}"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn = %short(my_id), "transport error: {e}");
                break;
            }
        }
    }

    {
        let mut hub = state.inner.lock();
        let Hub { room, peers } = &mut *hub;
        room.leave(my_id, &*peers);
        peers.remove(my_id);
        tracing::info!(
            conn = %short(my_id),
            connections = peers.len(),
            players = room.participants().len(),
            revealed = room.is_revealed(),
            pending = room.is_reveal_pending(),
            "disconnected"
        );
    }
    writer.abort();
}

fn route_cmd(cmd: ClientToServer, state: &AppState, my_id: ConnId) {
    tracing::debug!(conn = %short(my_id), ?cmd, "event");

    let mut hub = state.inner.lock();
    let Hub { room, peers } = &mut *hub;
    let peers = &*peers;

    let outcome = match cmd {
        ClientToServer::Join { name, role } => match room.join(my_id, &name, role, peers) {
            Ok(joined) => {
                tracing::debug!(
                    conn = %short(my_id),
                    role = %joined.role,
                    downgraded = joined.downgraded,
                    "join applied"
                );
                Outcome::Applied
            }
            Err(e) => {
                tracing::debug!(conn = %short(my_id), "join refused: {e}");
                return;
            }
        },
        ClientToServer::SelectCard(card) => room.select_card(my_id, card, peers),
        ClientToServer::Reveal => room.reveal(my_id, peers),
        ClientToServer::NewRound => room.new_round(my_id, peers),
        ClientToServer::LeaveRoom => room.leave(my_id, peers),
    };

    if let Outcome::Ignored(reason) = outcome {
        tracing::debug!(conn = %short(my_id), ?reason, "event ignored");
    }
}
