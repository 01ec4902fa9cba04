use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Parse an `HH:MM` time of day (hour 0–23, minute 0–59).
///
/// Single-digit fields are accepted (`8:05`); anything else returns `None`.
pub fn parse_hm(input: &str) -> Option<NaiveTime> {
    let (hour, minute) = input.trim().split_once(':')?;
    let valid = |s: &str| (1..=2).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit());
    if !valid(hour) || !valid(minute) {
        return None;
    }
    NaiveTime::from_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)
}

// ──────────────────── Chat Types ────────────────────

/// Kind of chat an event originated from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    /// Whether member activity in this chat is tracked.
    pub fn is_group(self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

/// The chat an inbound event belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRef {
    pub id: i64,
    pub kind: ChatKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Role of a member inside a chat, as reported by the platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    Owner,
    Admin,
    Member,
    Restricted,
    Left,
    Banned,
}

impl ChatRole {
    /// Admin-only commands require `Owner` or `Admin`.
    pub fn is_admin(self) -> bool {
        matches!(self, ChatRole::Owner | ChatRole::Admin)
    }
}

// ──────────────────── Domain Records ────────────────────

/// A member seen in a tracked group. Keyed by `(group_id, member_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub group_id: i64,
    pub member_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
}

impl Member {
    /// Name shown in reports and in the allow-toggle keyboard.
    pub fn display_name(&self) -> String {
        display_name(
            self.member_id,
            self.handle.as_deref(),
            self.given_name.as_deref(),
            self.family_name.as_deref(),
        )
    }
}

/// Display-name fallback: handle, then "given family" trimmed, then `user_<id>`.
///
/// Empty strings count as missing.
pub fn display_name(
    member_id: i64,
    handle: Option<&str>,
    given_name: Option<&str>,
    family_name: Option<&str>,
) -> String {
    if let Some(handle) = handle.filter(|h| !h.is_empty()) {
        return handle.to_string();
    }
    let full = format!(
        "{} {}",
        given_name.unwrap_or_default(),
        family_name.unwrap_or_default()
    );
    let full = full.trim();
    if full.is_empty() {
        format!("user_{member_id}")
    } else {
        full.to_string()
    }
}

/// A stored location check-in. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    pub group_id: i64,
    pub member_id: i64,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

/// A registered group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group_id: i64,
    pub title: String,
}

// ──────────────────── Inbound Events ────────────────────

/// The user behind an inbound event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sender {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl Sender {
    /// Member record for this sender in the given group.
    pub fn to_member(&self, group_id: i64) -> Member {
        Member {
            group_id,
            member_id: self.id,
            handle: self.username.clone(),
            given_name: self.first_name.clone(),
            family_name: self.last_name.clone(),
        }
    }
}

/// A shared location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// A message received from the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub chat: ChatRef,
    pub sender: Sender,
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Platform timestamp of the message.
    pub timestamp: DateTime<Utc>,
}

/// A keyboard button press.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackPress {
    /// Platform id used to answer the press.
    pub callback_id: String,
    pub chat: ChatRef,
    pub sender: Sender,
    /// Message carrying the keyboard.
    pub message_id: i64,
    pub data: String,
}

/// Everything the platform layer forwards to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Message(InboundMessage),
    Callback(CallbackPress),
}

/// One inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardButton {
    pub text: String,
    pub callback_data: String,
}
