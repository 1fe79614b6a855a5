/// Default identity used as the prefix of every server reply
pub const DEFAULT_SERVER_NAME: &str = "ircd.twist.moe";

/// Nickname a session uses until the client sends NICK
pub const DEFAULT_NICKNAME: &str = "anon";

/// Host reported for every episode in WHO replies
pub const EPISODE_HOST: &str = "twist.moe";

/// Marker for a prefix or a trailing, space-containing parameter
pub const MARKER: char = ':';

/// Marker in front of a channel name
pub const CHANNEL_MARKER: char = '#';

/// Separator between the series slug and the episode number in a display token
pub const TOKEN_SEPARATOR: &str = "--";

/// Internal-only command that tells the writer task to stop
const SHUTDOWN_COMMAND: &str = ":::";

/// Numeric reply codes
pub mod reply {
    pub const RPL_WELCOME: &str = "001";
    pub const RPL_YOURHOST: &str = "002";
    pub const RPL_CREATED: &str = "003";
    pub const RPL_MYINFO: &str = "004";
    pub const RPL_ENDOFWHO: &str = "315";
    pub const RPL_LIST: &str = "322";
    pub const RPL_LISTEND: &str = "323";
    pub const RPL_CHANNELMODEIS: &str = "324";
    pub const RPL_TOPIC: &str = "332";
    pub const RPL_WHOREPLY: &str = "352";
    pub const RPL_NAMREPLY: &str = "353";
    pub const RPL_ENDOFNAMES: &str = "366";
    pub const ERR_NOSUCHNICK: &str = "401";
    pub const ERR_NOSUCHCHANNEL: &str = "403";
    pub const ERR_NONICKNAMEGIVEN: &str = "431";
    pub const ERR_ERRONEUSNICKNAME: &str = "432";
    pub const ERR_USERNOTINCHANNEL: &str = "441";
    pub const ERR_NEEDMOREPARAMS: &str = "461";
    pub const ERR_UNKNOWNMODE: &str = "472";
}

/// A single protocol message
///
/// `prefix` is kept exactly as received (including its marker when parsed
/// from the wire); the encoder adds the marker if it is missing. Parameters
/// keep their order, and a trailing parameter parsed from the wire keeps its
/// leading marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl Message {
    /// Create a message without a prefix
    pub fn new(command: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            prefix: None,
            command: command.into(),
            params,
        }
    }

    /// Create a message carrying `prefix` as its source
    pub fn with_prefix(
        prefix: impl Into<String>,
        command: impl Into<String>,
        params: Vec<String>,
    ) -> Self {
        Self {
            prefix: Some(prefix.into()),
            command: command.into(),
            params,
        }
    }

    /// The sentinel that stops a session's writer task without being written
    pub fn shutdown() -> Self {
        Self::new(SHUTDOWN_COMMAND, Vec::new())
    }

    pub fn is_shutdown(&self) -> bool {
        self.command == SHUTDOWN_COMMAND
    }

    /// Parameter at `index`, if present
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Parameter at `index` with a trailing marker removed
    ///
    /// `JOIN :#naruto` and `JOIN #naruto` name the same channel.
    pub fn bare_param(&self, index: usize) -> Option<&str> {
        self.param(index)
            .map(|param| param.strip_prefix(MARKER).unwrap_or(param))
    }
}

/// Mark `text` as the trailing parameter of a message
pub fn trailing(text: &str) -> String {
    format!("{}{}", MARKER, text)
}

/// Strip a leading channel marker, yielding the series slug
pub fn channel_slug(channel: &str) -> &str {
    channel.strip_prefix(CHANNEL_MARKER).unwrap_or(channel)
}

/// Channel name for a series slug
pub fn slug_channel(slug: &str) -> String {
    format!("{}{}", CHANNEL_MARKER, slug)
}

/// Split a display token into `(slug, episode)` on its first separator
pub fn split_token(token: &str) -> Option<(&str, &str)> {
    token.split_once(TOKEN_SEPARATOR)
}
