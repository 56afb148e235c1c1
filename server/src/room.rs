//! The single estimation room: participants, the admin seat and the round state.
//!
//! Every operation validates the intent, mutates the room and pushes the
//! resulting events through a [`Notifier`]. Rejected intents never touch the
//! room; they come back as [`Outcome::Ignored`] or a [`JoinError`] so callers
//! can tell the two apart without an event being sent.

use planning_poker_protocol::{
    AdminInfo, Card, PublicPlayer, PublicRoom, Role, ServerToClient, Tally,
};
use uuid::Uuid;

/// Opaque identity of one transport connection.
pub type ConnId = Uuid;

/// Delivery surface the room depends on. Implementations must not block.
pub trait Notifier {
    /// Send to one connection.
    fn notify(&self, to: ConnId, event: ServerToClient);
    /// Send to every open connection.
    fn broadcast(&self, event: ServerToClient);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ConnId,
    pub name: String,
    pub role: Role,
    pub selected: Option<Card>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Ignored(Ignored),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// The connection has no participant in the room.
    NotJoined,
    /// Reveal and new round belong to the admin.
    NotAdmin,
    /// Selections are locked until the next round.
    Revealed,
    /// The round is already revealed.
    AlreadyRevealed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Joined {
    pub role: Role,
    /// Admin was requested but the seat was taken.
    pub downgraded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("name is empty")]
    EmptyName,
    #[error("the name {0:?} is already in use")]
    NameTaken(String),
    #[error("this connection already joined the room")]
    AlreadyJoined,
}

#[derive(Debug, Default)]
pub struct Room {
    participants: Vec<Participant>,
    admin: Option<ConnId>,
    revealed: bool,
    reveal_pending: bool,
}

impl Room {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, id: ConnId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn admin(&self) -> Option<&Participant> {
        self.admin.and_then(|id| self.participant(id))
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn is_reveal_pending(&self) -> bool {
        self.reveal_pending
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Participants that still have to pick a card this round.
    pub fn missing(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.selected.is_none())
    }

    pub fn tally(&self) -> Tally {
        Tally::from_selections(self.participants.iter().filter_map(|p| p.selected))
    }

    pub fn public_room(&self) -> PublicRoom {
        PublicRoom {
            revealed: self.revealed,
            reveal_pending: self.reveal_pending,
            players: self
                .participants
                .iter()
                .map(|p| PublicPlayer {
                    name: p.name.clone(),
                    role: p.role,
                    selected: p.selected.is_some(),
                    selected_card: p.selected,
                })
                .collect(),
            admin: self.admin().map(|a| AdminInfo { name: a.name.clone() }),
        }
    }

    pub fn admin_status(&self) -> ServerToClient {
        ServerToClient::AdminStatus {
            admin_taken: self.admin.is_some(),
            admin_name: self.admin().map(|a| a.name.clone()),
        }
    }

    /// A fresh connection learns whether the admin seat is free.
    pub fn connect(&self, id: ConnId, out: &impl Notifier) {
        tracing::debug!(conn = %short(id), admin_taken = self.admin.is_some(), "connect");
        out.notify(id, self.admin_status());
    }

    pub fn join(
        &mut self,
        id: ConnId,
        name: &str,
        requested: Role,
        out: &impl Notifier,
    ) -> Result<Joined, JoinError> {
        let name = name.trim();
        if name.is_empty() {
            tracing::debug!(conn = %short(id), "join ignored: empty name");
            return Err(JoinError::EmptyName);
        }
        if self.participant(id).is_some() {
            tracing::debug!(conn = %short(id), "join ignored: already joined");
            return Err(JoinError::AlreadyJoined);
        }
        if self.name_taken(name) {
            tracing::info!(conn = %short(id), name, "join rejected: name taken");
            out.notify(
                id,
                ServerToClient::JoinError {
                    message: format!("The name \"{name}\" is already in use."),
                },
            );
            return Err(JoinError::NameTaken(name.to_string()));
        }

        let downgraded = requested == Role::Admin && self.admin.is_some();
        let role = if downgraded { Role::User } else { requested };

        self.participants.push(Participant {
            id,
            name: name.to_string(),
            role,
            selected: None,
        });
        tracing::info!(conn = %short(id), name, %role, downgraded, players = self.participants.len(), "joined");

        if downgraded {
            let holder = self.admin().map(|a| a.name.as_str()).unwrap_or_default();
            out.notify(
                id,
                ServerToClient::RoleDowngraded {
                    message: format!("{holder} is already the admin. You joined as a user."),
                },
            );
        }

        if role == Role::Admin {
            self.admin = Some(id);
            out.broadcast(self.admin_status());
        } else {
            out.notify(id, self.admin_status());
        }

        self.broadcast_state(out);
        Ok(Joined { role, downgraded })
    }

    pub fn select_card(&mut self, id: ConnId, card: Option<Card>, out: &impl Notifier) -> Outcome {
        if self.revealed {
            return Outcome::Ignored(Ignored::Revealed);
        }
        let Some(p) = self.participants.iter_mut().find(|p| p.id == id) else {
            return Outcome::Ignored(Ignored::NotJoined);
        };

        p.selected = match card {
            Some(c) if p.selected == Some(c) => None,
            other => other,
        };
        tracing::debug!(name = %p.name, selected = ?p.selected, "select");

        if self.reveal_pending && self.missing().next().is_none() {
            tracing::info!("last pick arrived, completing pending reveal");
            self.finish_reveal(out);
        }

        self.broadcast_state(out);
        Outcome::Applied
    }

    pub fn reveal(&mut self, id: ConnId, out: &impl Notifier) -> Outcome {
        if self.admin != Some(id) {
            tracing::debug!(conn = %short(id), "reveal ignored: not admin");
            return Outcome::Ignored(Ignored::NotAdmin);
        }
        if self.revealed {
            return Outcome::Ignored(Ignored::AlreadyRevealed);
        }

        self.reveal_pending = true;

        let missing: Vec<ConnId> = self.missing().map(|p| p.id).collect();
        if !missing.is_empty() {
            tracing::info!(waiting = missing.len(), "reveal pending");
            out.notify(
                id,
                ServerToClient::RevealError {
                    message: waiting_message(missing.len()),
                },
            );
            for pid in missing {
                out.notify(
                    pid,
                    ServerToClient::PickCardWarning {
                        message: "The admin wants to reveal. Please pick a card.".to_string(),
                    },
                );
            }
            self.broadcast_state(out);
            return Outcome::Applied;
        }

        self.finish_reveal(out);
        self.broadcast_state(out);
        Outcome::Applied
    }

    pub fn new_round(&mut self, id: ConnId, out: &impl Notifier) -> Outcome {
        if self.admin != Some(id) {
            tracing::debug!(conn = %short(id), "new round ignored: not admin");
            return Outcome::Ignored(Ignored::NotAdmin);
        }
        tracing::info!("new round");
        self.reset_round();
        out.broadcast(ServerToClient::ClearSelections);
        self.broadcast_state(out);
        Outcome::Applied
    }

    /// Explicit leave and transport disconnect both end up here.
    pub fn leave(&mut self, id: ConnId, out: &impl Notifier) -> Outcome {
        let Some(pos) = self.participants.iter().position(|p| p.id == id) else {
            return Outcome::Ignored(Ignored::NotJoined);
        };
        let gone = self.participants.remove(pos);
        tracing::info!(name = %gone.name, role = %gone.role, players = self.participants.len(), "left");

        if self.admin == Some(id) {
            self.admin = None;
            self.reset_round();
            out.broadcast(ServerToClient::ClearSelections);
            out.broadcast(self.admin_status());
        }

        if self.participants.is_empty() {
            self.reset_round();
        }

        self.broadcast_state(out);
        Outcome::Applied
    }

    fn name_taken(&self, name: &str) -> bool {
        let wanted = name.to_lowercase();
        self.participants
            .iter()
            .any(|p| p.name.to_lowercase() == wanted)
    }

    fn finish_reveal(&mut self, out: &impl Notifier) {
        self.revealed = true;
        self.reveal_pending = false;
        let tally = self.tally();
        tracing::info!(picks = tally.total(), "revealed");
        out.broadcast(ServerToClient::RevealResults(tally));
    }

    fn reset_round(&mut self) {
        self.revealed = false;
        self.reveal_pending = false;
        for p in self.participants.iter_mut() {
            p.selected = None;
        }
    }

    fn broadcast_state(&self, out: &impl Notifier) {
        out.broadcast(ServerToClient::PlayersUpdate(self.public_room()));
    }
}

fn waiting_message(n: usize) -> String {
    if n == 1 {
        "Waiting for 1 player to pick a card.".to_string()
    } else {
        format!("Waiting for {n} players to pick a card.")
    }
}

/// First block of a connection id, enough to tell connections apart in logs.
pub fn short(id: ConnId) -> String {
    id.to_string()[..8].to_string()
}
