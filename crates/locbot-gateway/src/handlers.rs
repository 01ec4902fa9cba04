//! Inbound event handling: member registration, check-ins, commands and
//! allow-list toggles.

use tracing::{debug, info, warn};

use locbot_report::ReportSpan;
use locbot_storage::StorageError;
use locbot_types::{
    CallbackPress, CheckIn, GroupInfo, InboundEvent, InboundMessage, KeyboardButton, Location,
};

use crate::commands::{Command, allow_callback_data, parse_allow_callback};
use crate::{CommandError, LocBot, REPORT_USAGE};

pub const HELP_TEXT: &str = "Hi! I track location check-ins in this group.\n\
    Register the group: /setgroup\n\
    On-demand report: /report HH:MM HH:MM\n\
    Choose whose check-ins count (admins): /allow";

pub const ALLOW_PROMPT: &str = "✅ Choose who may check in:";

const CHECKIN_ACCEPTED: &str = "📍 Location received!";
const CHECKIN_PENDING: &str =
    "📍 Location saved. It will be counted once an admin allows you (/allow).";

impl LocBot {
    /// Entry point for everything the platform forwards.
    pub async fn handle_event(&self, event: InboundEvent) {
        match event {
            InboundEvent::Message(msg) => self.handle_message(msg).await,
            InboundEvent::Callback(press) => self.handle_callback(press).await,
        }
    }

    /// Run a command, or register the sender and record a check-in.
    ///
    /// Commands never write member rows; a rejected or malformed command
    /// leaves storage untouched.
    pub async fn handle_message(&self, msg: InboundMessage) {
        let chat_id = msg.chat.id;

        let command = msg
            .text
            .as_deref()
            .and_then(|text| Command::parse_for(text, self.bot_username.as_deref()));
        if let Some(command) = command {
            debug!(chat_id, sender = msg.sender.id, ?command, "Handling command");
            match self.handle_command(&msg, command).await {
                Ok(Some(text)) => self.reply(chat_id, &text).await,
                Ok(None) => {}
                Err(e) => {
                    info!(chat_id, sender = msg.sender.id, "Command rejected: {e:?}");
                    self.reply(chat_id, &e.to_string()).await;
                }
            }
            return;
        }

        if !msg.chat.kind.is_group() {
            return;
        }

        let member = msg.sender.to_member(chat_id);
        if let Err(e) = self.storage.upsert_member(&member).await {
            warn!(
                group_id = chat_id,
                member_id = msg.sender.id,
                "Failed to register member: {e}"
            );
        }

        if let Some(location) = msg.location {
            self.record_checkin(&msg, location).await;
        }
    }

    /// Run a command. `Ok(Some(text))` is a reply still to be sent.
    pub async fn handle_command(
        &self,
        msg: &InboundMessage,
        command: Command,
    ) -> Result<Option<String>, CommandError> {
        let chat_id = msg.chat.id;
        match command {
            Command::Start => Ok(Some(HELP_TEXT.to_string())),
            Command::SetGroup => {
                self.require_admin(chat_id, msg.sender.id).await?;
                if !msg.chat.kind.is_group() {
                    return Err(CommandError::NotAGroup);
                }
                let title = msg
                    .chat
                    .title
                    .clone()
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "No title".to_string());
                let previous = self.storage.get_group(chat_id).await?;
                self.storage
                    .save_group(&GroupInfo {
                        group_id: chat_id,
                        title: title.clone(),
                    })
                    .await?;
                match previous {
                    Some(old) => info!(
                        group_id = chat_id,
                        old_title = %old.title,
                        %title,
                        "Group re-registered"
                    ),
                    None => info!(group_id = chat_id, %title, "Group registered"),
                }
                Ok(Some(format!("✅ Group registered! Chat ID: {chat_id}")))
            }
            Command::Report(args) => {
                self.require_admin(chat_id, msg.sender.id).await?;
                let [start, end] = args.as_slice() else {
                    return Err(CommandError::Usage(REPORT_USAGE.to_string()));
                };
                let span = ReportSpan::window(start, end)?;
                let text = self.compose_report(chat_id, &span, self.today()).await?;
                if let Err(e) = self.deliver(chat_id, &text).await {
                    warn!(group_id = chat_id, "On-demand report delivery failed: {e:#}");
                }
                Ok(None)
            }
            Command::Allow => {
                self.require_admin(chat_id, msg.sender.id).await?;
                let keyboard = self.allow_keyboard(chat_id).await?;
                if let Err(e) = self
                    .messenger
                    .send_keyboard(chat_id, ALLOW_PROMPT, keyboard)
                    .await
                {
                    warn!(group_id = chat_id, "Failed to send allow keyboard: {e:#}");
                }
                Ok(None)
            }
        }
    }

    /// Toggle a member from the allow keyboard and re-render it.
    pub async fn handle_callback(&self, press: CallbackPress) {
        let chat_id = press.chat.id;

        let Some(member_id) = parse_allow_callback(&press.data) else {
            debug!(chat_id, data = %press.data, "Ignoring unknown callback");
            self.answer(&press.callback_id, None, false).await;
            return;
        };

        if let Err(e) = self.require_admin(chat_id, press.sender.id).await {
            self.answer(&press.callback_id, Some(&e.to_string()), true).await;
            return;
        }

        let keyboard = match self.toggle_and_render(chat_id, member_id).await {
            Ok(keyboard) => keyboard,
            Err(e) => {
                warn!(group_id = chat_id, member_id, "Allow toggle failed: {e}");
                let text = CommandError::Storage(e).to_string();
                self.answer(&press.callback_id, Some(&text), true).await;
                return;
            }
        };

        if let Err(e) = self
            .messenger
            .edit_keyboard(chat_id, press.message_id, ALLOW_PROMPT, keyboard)
            .await
        {
            warn!(group_id = chat_id, "Failed to refresh allow keyboard: {e:#}");
        }
        self.answer(&press.callback_id, None, false).await;
    }

    /// One button per member in first-seen order, checked when allowed.
    pub async fn allow_keyboard(
        &self,
        group_id: i64,
    ) -> Result<Vec<Vec<KeyboardButton>>, StorageError> {
        let members = self.storage.list_members(group_id).await?;
        let allowed = self.storage.allow_list(group_id).await?;
        Ok(members
            .iter()
            .map(|m| {
                let name = m.display_name();
                let text = if allowed.contains(&m.member_id) {
                    format!("{name} ✅")
                } else {
                    name
                };
                vec![KeyboardButton {
                    text,
                    callback_data: allow_callback_data(m.member_id),
                }]
            })
            .collect())
    }

    async fn toggle_and_render(
        &self,
        group_id: i64,
        member_id: i64,
    ) -> Result<Vec<Vec<KeyboardButton>>, StorageError> {
        self.storage.toggle_allowed(group_id, member_id).await?;
        self.allow_keyboard(group_id).await
    }

    async fn record_checkin(&self, msg: &InboundMessage, location: Location) {
        let checkin = CheckIn {
            group_id: msg.chat.id,
            member_id: msg.sender.id,
            timestamp: msg.timestamp,
            latitude: location.latitude,
            longitude: location.longitude,
        };
        if let Err(e) = self.storage.insert_checkin(&checkin).await {
            warn!(
                group_id = checkin.group_id,
                member_id = checkin.member_id,
                "Failed to store check-in: {e}"
            );
            self.reply(checkin.group_id, &CommandError::Storage(e).to_string())
                .await;
            return;
        }

        let allowed = match self
            .storage
            .is_allowed(checkin.group_id, checkin.member_id)
            .await
        {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(group_id = checkin.group_id, "Allow-list lookup failed: {e}");
                false
            }
        };
        debug!(
            group_id = checkin.group_id,
            member_id = checkin.member_id,
            allowed,
            "Check-in stored"
        );
        let ack = if allowed { CHECKIN_ACCEPTED } else { CHECKIN_PENDING };
        self.reply(checkin.group_id, ack).await;
    }

    async fn require_admin(&self, chat_id: i64, member_id: i64) -> Result<(), CommandError> {
        let role = self
            .roles
            .get_role(chat_id, member_id)
            .await
            .map_err(|e| CommandError::RoleLookup(format!("{e:#}")))?;
        if role.is_admin() {
            Ok(())
        } else {
            Err(CommandError::PermissionDenied)
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.deliver(chat_id, text).await {
            warn!(chat_id, "Failed to send reply: {e:#}");
        }
    }

    async fn answer(&self, callback_id: &str, text: Option<&str>, show_alert: bool) {
        if let Err(e) = self
            .messenger
            .answer_callback(callback_id, text, show_alert)
            .await
        {
            warn!(callback_id, "Failed to answer callback: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        ADMIN, GROUP, MEMBER, assert_untouched, checkin_message, group_message, make_bot, press,
        private_message, tashkent,
    };
    use locbot_types::ChatKind;

    #[tokio::test]
    async fn test_start_replies_help() {
        let (bot, platform) = make_bot();
        bot.handle_message(private_message(MEMBER, "/start")).await;
        assert_eq!(platform.sent(), vec![(MEMBER, HELP_TEXT.to_string())]);
    }

    #[tokio::test]
    async fn test_setgroup_requires_admin() {
        let (bot, platform) = make_bot();
        bot.handle_message(group_message(MEMBER, "/setgroup")).await;

        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("Only group admins"));
        assert_untouched(&bot).await;
    }

    #[tokio::test]
    async fn test_setgroup_registers_group() {
        let (bot, platform) = make_bot();
        bot.handle_message(group_message(ADMIN, "/setgroup@locbot")).await;

        let groups = bot.storage().list_groups().await.unwrap();
        assert_eq!(
            groups,
            vec![GroupInfo {
                group_id: GROUP,
                title: "Field team".into(),
            }]
        );
        assert_eq!(platform.sent()[0].1, format!("✅ Group registered! Chat ID: {GROUP}"));
        // commands do not register the issuer as a member
        assert!(bot.storage().list_members(GROUP).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_setgroup_again_overwrites_title() {
        let (bot, platform) = make_bot();
        bot.handle_message(group_message(ADMIN, "/setgroup")).await;
        let mut renamed = group_message(ADMIN, "/setgroup");
        renamed.chat.title = None;
        bot.handle_message(renamed).await;

        let groups = bot.storage().list_groups().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].title, "No title");
        assert_eq!(platform.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_setgroup_outside_group() {
        let (bot, platform) = make_bot();
        platform.make_admin(ADMIN, ADMIN);
        bot.handle_message(private_message(ADMIN, "/setgroup")).await;

        assert_eq!(platform.sent()[0].1, "This command only works in groups.");
        assert_untouched(&bot).await;
    }

    #[tokio::test]
    async fn test_group_activity_registers_member() {
        let (bot, _platform) = make_bot();
        bot.handle_message(group_message(MEMBER, "good morning")).await;
        bot.handle_message(private_message(99, "hi")).await;

        let members = bot.storage().list_members(GROUP).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].member_id, MEMBER);
        assert!(bot.storage().list_members(99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkin_stored_even_when_not_allowed() {
        let (bot, platform) = make_bot();
        bot.handle_message(checkin_message(MEMBER, tashkent(8, 10))).await;

        let stored = bot
            .storage()
            .list_checkins(GROUP, tashkent(0, 0), tashkent(23, 0))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(platform.sent(), vec![(GROUP, CHECKIN_PENDING.to_string())]);
    }

    #[tokio::test]
    async fn test_checkin_from_allowed_member() {
        let (bot, platform) = make_bot();
        bot.storage().toggle_allowed(GROUP, MEMBER).await.unwrap();
        bot.handle_message(checkin_message(MEMBER, tashkent(8, 10))).await;
        assert_eq!(platform.sent(), vec![(GROUP, CHECKIN_ACCEPTED.to_string())]);
    }

    #[tokio::test]
    async fn test_checkin_in_private_chat_ignored() {
        let (bot, platform) = make_bot();
        let mut msg = checkin_message(MEMBER, tashkent(8, 10));
        msg.chat.kind = ChatKind::Private;
        msg.chat.id = MEMBER;
        bot.handle_message(msg).await;
        assert!(platform.sent().is_empty());
        assert!(
            bot.storage()
                .list_checkins(MEMBER, tashkent(0, 0), tashkent(23, 0))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_report_invalid_time_touches_nothing() {
        let (bot, platform) = make_bot();
        bot.handle_message(group_message(ADMIN, "/report 25:99 10:00")).await;

        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("Invalid time `25:99`"));
        assert!(sent[0].1.contains(REPORT_USAGE));
        assert_untouched(&bot).await;
    }

    #[tokio::test]
    async fn test_report_wrong_argument_count() {
        let (bot, platform) = make_bot();
        bot.handle_message(group_message(ADMIN, "/report 08:00")).await;
        assert_eq!(platform.sent()[0].1, format!("❌ {REPORT_USAGE}"));
        assert_untouched(&bot).await;
    }

    #[tokio::test]
    async fn test_report_requires_admin() {
        let (bot, platform) = make_bot();
        bot.handle_message(group_message(MEMBER, "/report 08:00 09:30")).await;
        assert!(platform.sent()[0].1.contains("Only group admins"));
        assert_untouched(&bot).await;
    }

    #[tokio::test]
    async fn test_allow_requires_admin() {
        let (bot, platform) = make_bot();
        bot.handle_message(group_message(MEMBER, "/allow")).await;
        assert!(platform.sent()[0].1.contains("Only group admins"));
        assert!(platform.keyboards().is_empty());
        assert_untouched(&bot).await;
    }

    #[tokio::test]
    async fn test_command_for_another_bot_ignored() {
        let (bot, platform) = make_bot();
        bot.handle_message(group_message(ADMIN, "/setgroup@otherbot")).await;
        bot.handle_message(group_message(ADMIN, "/report@OtherBot 08:00 09:30")).await;

        assert!(platform.sent().is_empty());
        assert!(bot.storage().list_groups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_on_demand_report_counts_retroactively_allowed_checkins() {
        let (bot, platform) = make_bot();
        bot.handle_message(checkin_message(MEMBER, tashkent(8, 10))).await;
        bot.handle_message(checkin_message(MEMBER, tashkent(8, 40))).await;
        bot.storage().toggle_allowed(GROUP, MEMBER).await.unwrap();
        platform.clear();

        bot.handle_message(group_message(ADMIN, "/report 08:00 09:30")).await;

        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "📅 Report (08:00–09:30):\n\nworker: 2 check-ins\n");
    }

    #[tokio::test]
    async fn test_allow_keyboard_marks_allowed() {
        let (bot, platform) = make_bot();
        bot.handle_message(group_message(MEMBER, "hello")).await;
        bot.handle_message(group_message(ADMIN, "/allow")).await;

        let keyboards = platform.keyboards();
        assert_eq!(keyboards.len(), 1);
        let (chat_id, message_id, text, rows) = &keyboards[0];
        assert_eq!(*chat_id, GROUP);
        assert!(message_id.is_none());
        assert_eq!(text, ALLOW_PROMPT);
        // the admin only issued a command, so only the worker is listed
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0].text, "worker");
        assert_eq!(rows[0][0].callback_data, format!("allow_{MEMBER}"));
    }

    #[tokio::test]
    async fn test_callback_toggle_round_trip() {
        let (bot, platform) = make_bot();
        bot.handle_message(group_message(MEMBER, "hello")).await;

        bot.handle_callback(press(ADMIN, &format!("allow_{MEMBER}"))).await;
        assert!(bot.storage().is_allowed(GROUP, MEMBER).await.unwrap());
        let keyboards = platform.keyboards();
        assert_eq!(keyboards[0].1, Some(500));
        assert_eq!(keyboards[0].3[0][0].text, "worker ✅");

        bot.handle_callback(press(ADMIN, &format!("allow_{MEMBER}"))).await;
        assert!(!bot.storage().is_allowed(GROUP, MEMBER).await.unwrap());
        assert_eq!(platform.keyboards()[1].3[0][0].text, "worker");
        assert_eq!(platform.answers().len(), 2);
    }

    #[tokio::test]
    async fn test_callback_from_non_admin_rejected() {
        let (bot, platform) = make_bot();
        bot.handle_callback(press(MEMBER, &format!("allow_{MEMBER}"))).await;

        assert!(!bot.storage().is_allowed(GROUP, MEMBER).await.unwrap());
        assert!(platform.keyboards().is_empty());
        let answers = platform.answers();
        assert_eq!(answers.len(), 1);
        assert!(answers[0].2, "rejection should be an alert");
        assert!(answers[0].1.as_deref().unwrap().contains("Only group admins"));
    }

    #[tokio::test]
    async fn test_malformed_callback_answered_and_ignored() {
        let (bot, platform) = make_bot();
        bot.handle_callback(press(ADMIN, "allow_abc")).await;
        assert_eq!(platform.answers(), vec![("cb".to_string(), None, false)]);
        assert!(bot.storage().allow_list(GROUP).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_role_lookup_failure_is_reported() {
        let (bot, platform) = make_bot();
        platform.fail_role_lookups();
        bot.handle_message(group_message(ADMIN, "/allow")).await;
        assert!(platform.sent()[0].1.contains("Could not verify your permissions"));
        assert!(platform.keyboards().is_empty());
        assert_untouched(&bot).await;
    }
}
