//! Bot command parsing.

/// Prefix of allow-toggle callback data.
pub const ALLOW_CALLBACK_PREFIX: &str = "allow_";

/// A recognised bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    SetGroup,
    /// `/report <start> <end>`; argument count is checked by the handler.
    Report(Vec<String>),
    Allow,
}

impl Command {
    /// Parse a message text like `/report@my_bot 08:00 09:30`, accepting
    /// any `@` suffix.
    ///
    /// Returns `None` for plain text and unknown commands.
    pub fn parse(text: &str) -> Option<Self> {
        Self::parse_for(text, None)
    }

    /// Like [`parse`](Self::parse), but when `bot_username` is known a
    /// command addressed to a different bot (`/report@other_bot`) is `None`.
    pub fn parse_for(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let mut words = text.split_whitespace();
        let head = words.next()?.strip_prefix('/')?;
        let (name, target) = match head.split_once('@') {
            Some((name, target)) => (name, Some(target)),
            None => (head, None),
        };
        if let (Some(target), Some(own)) = (target, bot_username) {
            if !target.eq_ignore_ascii_case(own) {
                return None;
            }
        }
        match name.to_ascii_lowercase().as_str() {
            "start" | "help" => Some(Command::Start),
            "setgroup" => Some(Command::SetGroup),
            "report" => Some(Command::Report(words.map(String::from).collect())),
            "allow" => Some(Command::Allow),
            _ => None,
        }
    }
}

/// Callback data for toggling `member_id`.
pub fn allow_callback_data(member_id: i64) -> String {
    format!("{ALLOW_CALLBACK_PREFIX}{member_id}")
}

/// Member id from allow-toggle callback data.
pub fn parse_allow_callback(data: &str) -> Option<i64> {
    data.strip_prefix(ALLOW_CALLBACK_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/setgroup@locbot"), Some(Command::SetGroup));
        assert_eq!(Command::parse("/allow"), Some(Command::Allow));
        assert_eq!(
            Command::parse("/report 08:00  09:30"),
            Some(Command::Report(vec!["08:00".into(), "09:30".into()]))
        );
        assert_eq!(Command::parse("/report"), Some(Command::Report(vec![])));
    }

    #[test]
    fn test_parse_non_commands() {
        assert_eq!(Command::parse("hello /start"), None);
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("/"), None);
    }

    #[test]
    fn test_parse_for_own_username() {
        let own = Some("locbot");
        assert_eq!(Command::parse_for("/allow@LocBot", own), Some(Command::Allow));
        assert_eq!(Command::parse_for("/allow", own), Some(Command::Allow));
        assert_eq!(Command::parse_for("/allow@otherbot", own), None);
        assert_eq!(Command::parse_for("/report@other 08:00 09:30", own), None);
        // username unknown: any suffix is accepted
        assert_eq!(Command::parse_for("/allow@otherbot", None), Some(Command::Allow));
    }

    #[test]
    fn test_allow_callback_data() {
        assert_eq!(allow_callback_data(-42), "allow_-42");
        assert_eq!(parse_allow_callback("allow_123"), Some(123));
        assert_eq!(parse_allow_callback(&allow_callback_data(7)), Some(7));
        assert_eq!(parse_allow_callback("allow_x"), None);
        assert_eq!(parse_allow_callback("deny_1"), None);
    }
}
