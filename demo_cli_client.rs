use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use planning_poker_protocol::{Card, ClientToServer, PublicRoom, Role, ServerToClient};
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Scripted planning poker player
#[derive(Parser, Debug)]
#[command(name = "demo_cli")]
struct Cli {
    /// Display name; defaults to Bot<pid>
    name: Option<String>,
    /// Room server WebSocket URL
    #[arg(long, default_value = "ws://127.0.0.1:3000/ws")]
    url: String,
    /// Take the admin seat and drive the rounds
    #[arg(long)]
    admin: bool,
    /// Seconds the results stay on screen before the admin starts a new round
    #[arg(long, default_value_t = 5)]
    pause: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let player_name = cli
        .name
        .clone()
        .unwrap_or_else(|| format!("Bot{}", std::process::id()));
    let role = if cli.admin { Role::Admin } else { Role::User };

    println!("🤖 Planning Poker demo bot");
    println!("==========================");
    println!("Player: {} ({})", player_name, role);

    println!("🔗 Connecting to {}...", cli.url);
    let (ws_stream, _) = connect_async(cli.url.as_str()).await?;
    println!("✅ Connected to server!");

    let (mut write, mut read) = ws_stream.split();

    let join = ClientToServer::Join { name: player_name.clone(), role };
    write.send(Message::Text(serde_json::to_string(&join)?)).await?;

    let mut bot = Bot::new(&player_name, Duration::from_secs(cli.pause));
    let mut rng = rand::thread_rng();

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let Ok(server_msg) = serde_json::from_str::<ServerToClient>(&text) else {
                    continue;
                };
                println!("📨 [{}] {}", player_name, server_msg.event_name());
                if let Some((delay, response)) = bot.on_event(&server_msg, &mut rng) {
                    tokio::time::sleep(delay).await;
                    println!("➡️  [{}] {:?}", player_name, response);
                    write.send(Message::Text(serde_json::to_string(&response)?)).await?;
                }
            }
            Ok(Message::Close(_)) => {
                println!("🔌 Connection closed by server");
                break;
            }
            Err(e) => {
                println!("❌ WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    println!("👋 {} disconnected!", player_name);
    Ok(())
}

/// Decides what the bot sends next, one event at a time.
struct Bot {
    name: String,
    pause: Duration,
    is_admin: bool,
    wants_pick: bool,
    reveal_sent: bool,
}

impl Bot {
    fn new(name: &str, pause: Duration) -> Self {
        Bot {
            name: name.to_string(),
            pause,
            is_admin: false,
            wants_pick: true,
            reveal_sent: false,
        }
    }

    fn on_event<R: Rng>(
        &mut self,
        event: &ServerToClient,
        rng: &mut R,
    ) -> Option<(Duration, ClientToServer)> {
        match event {
            ServerToClient::ClearSelections => {
                self.wants_pick = true;
                self.reveal_sent = false;
                None
            }
            ServerToClient::PickCardWarning { .. } => {
                self.wants_pick = true;
                None
            }
            ServerToClient::RevealResults(_) if self.is_admin => {
                Some((self.pause, ClientToServer::NewRound))
            }
            ServerToClient::PlayersUpdate(room) => self.on_room(room, rng),
            _ => None,
        }
    }

    fn on_room<R: Rng>(&mut self, room: &PublicRoom, rng: &mut R) -> Option<(Duration, ClientToServer)> {
        let me = room.player(&self.name)?;
        self.is_admin = me.role == Role::Admin;
        if room.revealed {
            return None;
        }

        if self.wants_pick && !me.selected {
            self.wants_pick = false;
            let card = *Card::ALL.choose(rng)?;
            let think = Duration::from_millis(rng.gen_range(300..1500));
            return Some((think, ClientToServer::SelectCard(Some(card))));
        }

        if self.is_admin && !self.reveal_sent && room.missing().is_empty() {
            self.reveal_sent = true;
            return Some((Duration::from_millis(500), ClientToServer::Reveal));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planning_poker_protocol::{PublicPlayer, Tally};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn room(players: &[(&str, Role, Option<Card>)]) -> PublicRoom {
        PublicRoom {
            players: players
                .iter()
                .map(|(n, r, c)| PublicPlayer {
                    name: n.to_string(),
                    role: *r,
                    selected: c.is_some(),
                    selected_card: *c,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn picks_once_per_round() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut bot = Bot::new("bob", Duration::ZERO);
        let r = room(&[("bob", Role::User, None)]);

        let first = bot.on_event(&ServerToClient::PlayersUpdate(r.clone()), &mut rng);
        assert!(matches!(first, Some((_, ClientToServer::SelectCard(Some(_))))));
        assert!(bot.on_event(&ServerToClient::PlayersUpdate(r.clone()), &mut rng).is_none());

        bot.on_event(&ServerToClient::ClearSelections, &mut rng);
        assert!(bot.on_event(&ServerToClient::PlayersUpdate(r), &mut rng).is_some());
    }

    #[test]
    fn admin_reveals_when_everyone_picked_then_starts_over() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut bot = Bot::new("amy", Duration::from_secs(3));
        let r = room(&[("amy", Role::Admin, Some(Card::Five)), ("bob", Role::User, Some(Card::Eight))]);
        bot.wants_pick = false;

        let next = bot.on_event(&ServerToClient::PlayersUpdate(r.clone()), &mut rng);
        assert!(matches!(next, Some((_, ClientToServer::Reveal))));
        assert!(bot.on_event(&ServerToClient::PlayersUpdate(r), &mut rng).is_none());

        let results = ServerToClient::RevealResults(Tally::from_selections([Card::Five, Card::Eight]));
        assert_eq!(
            bot.on_event(&results, &mut rng),
            Some((Duration::from_secs(3), ClientToServer::NewRound))
        );
    }

    #[test]
    fn user_never_reveals() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut bot = Bot::new("bob", Duration::ZERO);
        bot.wants_pick = false;
        let r = room(&[("bob", Role::User, Some(Card::One))]);
        assert!(bot.on_event(&ServerToClient::PlayersUpdate(r), &mut rng).is_none());
        let results = ServerToClient::RevealResults(Tally::default());
        assert!(bot.on_event(&results, &mut rng).is_none());
    }
}
