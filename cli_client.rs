use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use planning_poker_protocol::{Card, ClientToServer, PublicRoom, Role, ServerToClient, Tally};
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Planning poker terminal client
#[derive(Parser, Debug)]
#[command(name = "poker_cli")]
struct Cli {
    /// Room server WebSocket URL
    #[arg(long, default_value = "ws://127.0.0.1:3000/ws")]
    url: String,
    /// Display name; asked for when missing
    #[arg(short, long)]
    name: Option<String>,
    /// Ask for the admin seat
    #[arg(long)]
    admin: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    println!("🃏 Planning Poker CLI Client");
    println!("============================");

    let player_name = match cli.name {
        Some(n) => n.trim().to_string(),
        None => {
            print!("Enter your name: ");
            io::stdout().flush()?;
            let mut n = String::new();
            io::stdin().read_line(&mut n)?;
            n.trim().to_string()
        }
    };

    if player_name.is_empty() {
        println!("❌ Name cannot be empty");
        return Ok(());
    }
    let role = if cli.admin { Role::Admin } else { Role::User };

    println!("🔗 Connecting to {}...", cli.url);
    let (ws_stream, _) = connect_async(cli.url.as_str()).await?;
    println!("✅ Connected to server!");

    let (mut write, mut read) = ws_stream.split();

    let join = ClientToServer::Join { name: player_name.clone(), role };
    write.send(Message::Text(serde_json::to_string(&join)?)).await?;
    println!("🚪 Joining as {} ({})...", player_name, role);

    tokio::spawn({
        let player_name = player_name.clone();
        async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Ok(server_msg) = serde_json::from_str::<ServerToClient>(&text) {
                            handle_server_message(server_msg, &player_name);
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
        }
    });

    print_help();

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "help" => {
                print_help();
                continue;
            }
            "cards" => {
                let deck: Vec<&str> = Card::ALL.iter().map(|c| c.label()).collect();
                println!("🂠 {}", deck.join("  "));
                continue;
            }
            _ => {}
        }

        match parse_command(line, &player_name, role) {
            Some(msg) => {
                let json = serde_json::to_string(&msg)?;
                write.send(Message::Text(json)).await?;
            }
            None => println!("❓ Unknown command: {} (try `help`)", line),
        }
    }

    let _ = write.send(Message::Close(None)).await;
    println!("👋 Goodbye!");
    Ok(())
}

fn print_help() {
    println!("\n📋 Commands available:");
    println!("  pick <card> - Pick a card (same card again clears it)");
    println!("  clear       - Clear your pick");
    println!("  reveal      - Reveal the estimates (admin)");
    println!("  new         - Start a new round (admin)");
    println!("  leave       - Leave the room");
    println!("  join        - Join again after leaving");
    println!("  cards       - Show the deck");
    println!("  quit        - Exit");
    println!();
}

fn handle_server_message(msg: ServerToClient, player_name: &str) {
    match msg {
        ServerToClient::AdminStatus { admin_taken, admin_name } => match (admin_taken, admin_name) {
            (true, Some(name)) => println!("🎩 Admin: {}", name),
            _ => println!("🎩 The admin seat is free"),
        },
        ServerToClient::RoleDowngraded { message } => println!("⚠️  {}", message),
        ServerToClient::JoinError { message } => println!("❌ Join failed: {}", message),
        ServerToClient::PlayersUpdate(room) => print_room(&room, player_name),
        ServerToClient::ClearSelections => println!("\n🔄 New round, pick a card!"),
        ServerToClient::RevealError { message } => println!("⏳ {}", message),
        ServerToClient::PickCardWarning { message } => println!("🔔 {}", message),
        ServerToClient::RevealResults(tally) => print_tally(&tally),
    }
}

fn print_room(room: &PublicRoom, player_name: &str) {
    let phase = if room.revealed {
        "revealed"
    } else if room.reveal_pending {
        "waiting for picks"
    } else {
        "picking"
    };
    println!("\n🎲 === ROOM ({}) ===", phase);
    for p in &room.players {
        let mark = if room.revealed {
            p.selected_card.map(|c| c.label()).unwrap_or("-").to_string()
        } else if p.selected {
            "✓".to_string()
        } else if room.reveal_pending {
            "⏳".to_string()
        } else {
            String::new()
        };
        let admin = if p.role == Role::Admin { " 🎩" } else { "" };
        let me = if p.name.to_lowercase() == player_name.to_lowercase() { " 👈 you" } else { "" };
        println!("  {}{}{}  {}", p.name, admin, me, mark);
    }
    if !room.revealed {
        if let Some(card) = room.player(player_name).and_then(|p| p.selected_card) {
            println!("  your pick: {}", card);
        }
    }
    println!("==================");
}

fn print_tally(tally: &Tally) {
    if tally.is_empty() {
        return;
    }
    println!("\n📊 RESULTS");
    for (card, count) in tally.iter() {
        println!("  {:>4} │ {} {}", card.label(), "█".repeat(count as usize), count);
    }
    match tally.average() {
        Some(avg) => println!("  average: {:.1}", avg),
        None => println!("  average: n/a"),
    }
    if tally.is_unanimous() {
        println!("🎉 Consensus!");
    }
}

fn parse_command(input: &str, player_name: &str, role: Role) -> Option<ClientToServer> {
    let parts: Vec<&str> = input.split_whitespace().collect();
    if parts.is_empty() {
        return None;
    }

    match parts[0].to_lowercase().as_str() {
        "pick" | "p" => {
            let card: Card = parts.get(1)?.parse().ok()?;
            Some(ClientToServer::SelectCard(Some(card)))
        }
        "clear" => Some(ClientToServer::SelectCard(None)),
        "reveal" | "r" => Some(ClientToServer::Reveal),
        "new" | "n" => Some(ClientToServer::NewRound),
        "leave" => Some(ClientToServer::LeaveRoom),
        "join" => Some(ClientToServer::Join {
            name: player_name.to_string(),
            role,
        }),
        _ => None,
    }
}
