//! Shared fixtures: a recording platform mock, a fixed clock and message
//! builders.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Asia::Tashkent;

use locbot_config::LocBotConfig;
use locbot_cron::scheduler::Clock;
use locbot_storage::LocBotStorage;
use locbot_types::{
    CallbackPress, ChatKind, ChatRef, ChatRole, InboundMessage, KeyboardButton, Location, Sender,
};

use crate::LocBot;
use crate::channel::{Messenger, RoleLookup};

pub const GROUP: i64 = -100;
pub const ADMIN: i64 = 1;
pub const MEMBER: i64 = 2;

pub type SentKeyboard = (i64, Option<i64>, String, Vec<Vec<KeyboardButton>>);
pub type Answer = (String, Option<String>, bool);

/// Records every outbound call. `ADMIN` is an admin of `GROUP`.
#[derive(Default)]
pub struct MockPlatform {
    sent: Mutex<Vec<(i64, String)>>,
    keyboards: Mutex<Vec<SentKeyboard>>,
    answers: Mutex<Vec<Answer>>,
    admins: Mutex<HashSet<(i64, i64)>>,
    failing: Mutex<HashSet<i64>>,
    hanging: Mutex<HashSet<i64>>,
    roles_down: Mutex<bool>,
}

impl MockPlatform {
    pub fn new() -> Self {
        let platform = Self::default();
        platform.make_admin(GROUP, ADMIN);
        platform
    }

    pub fn make_admin(&self, chat_id: i64, member_id: i64) {
        self.admins.lock().unwrap().insert((chat_id, member_id));
    }

    pub fn fail_chat(&self, chat_id: i64) {
        self.failing.lock().unwrap().insert(chat_id);
    }

    pub fn hang_chat(&self, chat_id: i64) {
        self.hanging.lock().unwrap().insert(chat_id);
    }

    pub fn fail_role_lookups(&self) {
        *self.roles_down.lock().unwrap() = true;
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn keyboards(&self) -> Vec<SentKeyboard> {
        self.keyboards.lock().unwrap().clone()
    }

    pub fn answers(&self) -> Vec<Answer> {
        self.answers.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
        self.keyboards.lock().unwrap().clear();
        self.answers.lock().unwrap().clear();
    }
}

#[async_trait::async_trait]
impl Messenger for MockPlatform {
    async fn send_text(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        let hangs = self.hanging.lock().unwrap().contains(&chat_id);
        if hangs {
            std::future::pending::<()>().await;
        }
        if self.failing.lock().unwrap().contains(&chat_id) {
            bail!("chat {chat_id} unreachable");
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Vec<Vec<KeyboardButton>>,
    ) -> anyhow::Result<()> {
        self.keyboards
            .lock()
            .unwrap()
            .push((chat_id, None, text.to_string(), keyboard));
        Ok(())
    }

    async fn edit_keyboard(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Vec<Vec<KeyboardButton>>,
    ) -> anyhow::Result<()> {
        self.keyboards
            .lock()
            .unwrap()
            .push((chat_id, Some(message_id), text.to_string(), keyboard));
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> anyhow::Result<()> {
        self.answers.lock().unwrap().push((
            callback_id.to_string(),
            text.map(String::from),
            show_alert,
        ));
        Ok(())
    }
}

#[async_trait::async_trait]
impl RoleLookup for MockPlatform {
    async fn get_role(&self, chat_id: i64, member_id: i64) -> anyhow::Result<ChatRole> {
        if *self.roles_down.lock().unwrap() {
            bail!("getChatMember unavailable");
        }
        if self.admins.lock().unwrap().contains(&(chat_id, member_id)) {
            Ok(ChatRole::Admin)
        } else {
            Ok(ChatRole::Member)
        }
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// 2024-05-06 at `h:m` in Tashkent, as UTC.
pub fn tashkent(h: u32, m: u32) -> DateTime<Utc> {
    Tashkent
        .with_ymd_and_hms(2024, 5, 6, h, m, 0)
        .unwrap()
        .with_timezone(&Utc)
}

/// Nothing at all was written for `GROUP`.
pub async fn assert_untouched(bot: &LocBot) {
    let storage = bot.storage();
    assert!(storage.list_members(GROUP).await.unwrap().is_empty(), "member rows written");
    assert!(storage.allow_list(GROUP).await.unwrap().is_empty(), "allow-list written");
    let checkins = storage
        .list_checkins(GROUP, tashkent(0, 0), tashkent(23, 59))
        .await
        .unwrap();
    assert!(checkins.is_empty(), "check-ins written");
    assert!(storage.list_groups().await.unwrap().is_empty(), "group registered");
}

pub fn make_bot() -> (Arc<LocBot>, Arc<MockPlatform>) {
    make_bot_with_timeout(Duration::from_secs(30))
}

pub fn make_bot_with_timeout(timeout: Duration) -> (Arc<LocBot>, Arc<MockPlatform>) {
    let config = LocBotConfig {
        timezone: Tashkent,
        delivery_timeout_secs: timeout.as_secs(),
        ..LocBotConfig::default()
    };
    let platform = Arc::new(MockPlatform::new());
    let bot = LocBot::new(
        &config,
        LocBotStorage::open_in_memory().unwrap(),
        platform.clone(),
        platform.clone(),
    )
    .with_clock(Arc::new(FixedClock(tashkent(19, 0))))
    .with_bot_username("locbot");
    (Arc::new(bot), platform)
}

fn sender(id: i64) -> Sender {
    let username = match id {
        ADMIN => "boss",
        MEMBER => "worker",
        _ => "someone",
    };
    Sender {
        id,
        username: Some(username.into()),
        first_name: None,
        last_name: None,
    }
}

fn group_chat() -> ChatRef {
    ChatRef {
        id: GROUP,
        kind: ChatKind::Supergroup,
        title: Some("Field team".into()),
    }
}

pub fn group_message(from: i64, text: &str) -> InboundMessage {
    InboundMessage {
        chat: group_chat(),
        sender: sender(from),
        message_id: 10,
        text: Some(text.into()),
        location: None,
        timestamp: tashkent(12, 0),
    }
}

pub fn private_message(from: i64, text: &str) -> InboundMessage {
    InboundMessage {
        chat: ChatRef {
            id: from,
            kind: ChatKind::Private,
            title: None,
        },
        ..group_message(from, text)
    }
}

pub fn checkin_message(from: i64, at: DateTime<Utc>) -> InboundMessage {
    InboundMessage {
        text: None,
        location: Some(Location {
            latitude: 41.31,
            longitude: 69.28,
        }),
        timestamp: at,
        ..group_message(from, "")
    }
}

pub fn press(from: i64, data: &str) -> CallbackPress {
    CallbackPress {
        callback_id: "cb".into(),
        chat: group_chat(),
        sender: sender(from),
        message_id: 500,
        data: data.into(),
    }
}
