use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// ---- Cards ----
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum Card {
    Zero,
    Half,
    One,
    Two,
    Three,
    Five,
    Eight,
    Thirteen,
    TwentyOne,
    ThirtyFour,
    FiftyFive,
    Unknown,
}

impl Card {
    /// The whole deck, in display order.
    pub const ALL: [Card; 12] = [
        Card::Zero,
        Card::Half,
        Card::One,
        Card::Two,
        Card::Three,
        Card::Five,
        Card::Eight,
        Card::Thirteen,
        Card::TwentyOne,
        Card::ThirtyFour,
        Card::FiftyFive,
        Card::Unknown,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Card::Zero => "0",
            Card::Half => "1/2",
            Card::One => "1",
            Card::Two => "2",
            Card::Three => "3",
            Card::Five => "5",
            Card::Eight => "8",
            Card::Thirteen => "13",
            Card::TwentyOne => "21",
            Card::ThirtyFour => "34",
            Card::FiftyFive => "55",
            Card::Unknown => "?",
        }
    }

    /// Story points carried by the card. `?` has none and never enters an average.
    pub fn points(&self) -> Option<f32> {
        match self {
            Card::Zero => Some(0.0),
            Card::Half => Some(0.5),
            Card::One => Some(1.0),
            Card::Two => Some(2.0),
            Card::Three => Some(3.0),
            Card::Five => Some(5.0),
            Card::Eight => Some(8.0),
            Card::Thirteen => Some(13.0),
            Card::TwentyOne => Some(21.0),
            Card::ThirtyFour => Some(34.0),
            Card::FiftyFive => Some(55.0),
            Card::Unknown => None,
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown card label {0:?}")]
pub struct CardParseError(pub String);

impl FromStr for Card {
    type Err = CardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Card::ALL
            .iter()
            .copied()
            .find(|c| c.label() == s)
            .ok_or_else(|| CardParseError(s.to_string()))
    }
}

impl TryFrom<String> for Card {
    type Error = CardParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Card> for String {
    fn from(card: Card) -> Self {
        card.label().to_string()
    }
}

/// ---- Roles ----
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

fn role_or_user<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw.as_ref().and_then(|v| v.as_str()) {
        Some("admin") => Role::Admin,
        _ => Role::User,
    })
}

/// ---- Tally ----
/// Count of participants per card, computed when a round is revealed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Tally(pub BTreeMap<Card, u32>);

impl Tally {
    pub fn from_selections<I: IntoIterator<Item = Card>>(cards: I) -> Self {
        let mut counts = BTreeMap::new();
        for card in cards {
            *counts.entry(card).or_insert(0) += 1;
        }
        Tally(counts)
    }

    pub fn get(&self, card: Card) -> u32 {
        self.0.get(&card).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Mean of the numeric picks; `?` is left out.
    pub fn average(&self) -> Option<f32> {
        let (sum, n) = self
            .0
            .iter()
            .filter_map(|(card, &count)| card.points().map(|p| (p * count as f32, count)))
            .fold((0.0f32, 0u32), |(s, n), (p, c)| (s + p, n + c));
        if n == 0 {
            None
        } else {
            Some(sum / n as f32)
        }
    }

    /// Everybody who picked, picked the same card.
    pub fn is_unanimous(&self) -> bool {
        self.0.values().filter(|&&c| c > 0).count() == 1
    }

    pub fn iter(&self) -> impl Iterator<Item = (Card, u32)> + '_ {
        self.0.iter().map(|(c, n)| (*c, *n))
    }
}

/// ---- Room snapshot ----
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicPlayer {
    pub name: String,
    pub role: Role,
    pub selected: bool,
    pub selected_card: Option<Card>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminInfo {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicRoom {
    pub revealed: bool,
    pub reveal_pending: bool,
    pub players: Vec<PublicPlayer>,
    pub admin: Option<AdminInfo>,
}

impl PublicRoom {
    pub fn player(&self, name: &str) -> Option<&PublicPlayer> {
        let wanted = name.to_lowercase();
        self.players.iter().find(|p| p.name.to_lowercase() == wanted)
    }

    /// Names of the players that still have to pick a card.
    pub fn missing(&self) -> Vec<&str> {
        self.players
            .iter()
            .filter(|p| !p.selected)
            .map(|p| p.name.as_str())
            .collect()
    }
}

/// ---- Events ----
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientToServer {
    Join {
        name: String,
        /// Anything but `"admin"`, or no role at all, joins as a user.
        #[serde(default, deserialize_with = "role_or_user")]
        role: Role,
    },
    /// `None` clears the selection.
    SelectCard(Option<Card>),
    Reveal,
    NewRound,
    LeaveRoom,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerToClient {
    #[serde(rename_all = "camelCase")]
    AdminStatus {
        admin_taken: bool,
        admin_name: Option<String>,
    },
    RoleDowngraded {
        message: String,
    },
    JoinError {
        message: String,
    },
    PlayersUpdate(PublicRoom),
    ClearSelections,
    RevealError {
        message: String,
    },
    PickCardWarning {
        message: String,
    },
    RevealResults(Tally),
}

impl ServerToClient {
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerToClient::AdminStatus { .. } => "adminStatus",
            ServerToClient::RoleDowngraded { .. } => "roleDowngraded",
            ServerToClient::JoinError { .. } => "joinError",
            ServerToClient::PlayersUpdate(_) => "playersUpdate",
            ServerToClient::ClearSelections => "clearSelections",
            ServerToClient::RevealError { .. } => "revealError",
            ServerToClient::PickCardWarning { .. } => "pickCardWarning",
            ServerToClient::RevealResults(_) => "revealResults",
        }
    }
}
