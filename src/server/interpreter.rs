//! Per-connection command interpreter
//!
//! Turns inbound messages into replies on the outbound queue. The only state
//! is the nickname; channels are rebuilt from the catalog on every JOIN and
//! WHO, so sessions never see each other.

use crate::catalog::{CatalogProvider, EpisodeEntry};
use crate::player::{PlaybackLauncher, spawn_playback};
use crate::protocol::{
    DEFAULT_NICKNAME, EPISODE_HOST, Message, channel_slug, reply, slug_channel,
    split_token, trailing,
};
use crate::transport::TransportError;
use std::sync::Arc;
use tokio::sync::mpsc;

type Outbound = mpsc::Sender<Message>;
type SendResult = Result<(), TransportError>;

/// Byte budget for the names carried by one 353 reply
const NAMES_LINE_BUDGET: usize = 400;

/// Limit field reported for every LIST entry
const LIST_ENTRY_LIMIT: &str = "10";

pub struct CommandInterpreter {
    nickname: String,
    server_name: String,
    catalog: Arc<dyn CatalogProvider>,
    launcher: Arc<dyn PlaybackLauncher>,
}

impl CommandInterpreter {
    pub fn new(
        server_name: String,
        catalog: Arc<dyn CatalogProvider>,
        launcher: Arc<dyn PlaybackLauncher>,
    ) -> Self {
        Self {
            nickname: DEFAULT_NICKNAME.to_string(),
            server_name,
            catalog,
            launcher,
        }
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Process inbound messages until the queue closes or the writer is gone
    pub async fn run(mut self, mut inbound: mpsc::Receiver<Message>, outbound: Outbound) {
        while let Some(message) = inbound.recv().await {
            if let Err(e) = self.handle(message, &outbound).await {
                log::debug!("Interpreter for {} stopped: {}", self.nickname(), e);
                break;
            }
        }
    }

    /// Handle one message, pushing every reply onto `out` in order
    pub async fn handle(&mut self, message: Message, out: &Outbound) -> SendResult {
        match message.command.to_ascii_uppercase().as_str() {
            "NICK" => self.nick(&message, out).await,
            "USER" => self.user(out).await,
            "LIST" => self.list(out).await,
            "JOIN" => self.join(&message, out).await,
            "WHO" => self.who(&message, out).await,
            "PART" => self.part(&message, out).await,
            "MODE" => self.mode(&message, out).await,
            "CAP" => Ok(()),
            _ => {
                log::warn!("Unknown message: {:?}", message);
                Ok(())
            }
        }
    }

    async fn nick(&mut self, message: &Message, out: &Outbound) -> SendResult {
        let name = message.bare_param(0).unwrap_or_default();
        if name.trim().is_empty() {
            return self
                .numeric(out, reply::ERR_NONICKNAMEGIVEN, &["No nickname given"])
                .await;
        }
        // Only the last parameter of a reply may carry spaces
        if name.contains(' ') {
            let shown = name.split_whitespace().next().unwrap_or(name);
            return self
                .numeric(
                    out,
                    reply::ERR_ERRONEUSNICKNAME,
                    &[shown, "Erroneous nickname"],
                )
                .await;
        }
        log::debug!("Nickname {} -> {}", self.nickname, name);
        self.nickname = name.to_string();
        Ok(())
    }

    async fn user(&self, out: &Outbound) -> SendResult {
        let host = format!("Your host is {}, running in the 90s", self.server_name);
        self.numeric(out, reply::RPL_WELCOME, &["Welcome to PlotTwist IRCD"])
            .await?;
        self.numeric(out, reply::RPL_YOURHOST, &[host.as_str()]).await?;
        self.numeric(out, reply::RPL_CREATED, &["This server was created right now tbh"])
            .await?;
        self.numeric(
            out,
            reply::RPL_MYINFO,
            &[self.server_name.as_str(), "PlotTwist", "o", "vo"],
        )
        .await
    }

    async fn list(&self, out: &Outbound) -> SendResult {
        match self.catalog.list_series().await {
            Ok(series) => {
                for entry in series {
                    let channel = slug_channel(&entry.slug);
                    let topic = trailing(&entry.topic);
                    self.numeric(
                        out,
                        reply::RPL_LIST,
                        &[channel.as_str(), LIST_ENTRY_LIMIT, topic.as_str()],
                    )
                    .await?;
                }
            }
            Err(e) => log::error!("Error while listing series: {}", e),
        }
        self.numeric(out, reply::RPL_LISTEND, &["End of LIST"]).await
    }

    async fn join(&self, message: &Message, out: &Outbound) -> SendResult {
        let Some(channels) = message.bare_param(0) else {
            return self.need_more_params(out, "JOIN").await;
        };

        for channel in channels.split(',').filter(|c| !c.is_empty()) {
            let slug = channel_slug(channel);
            let detail = match self.catalog.get_episodes(slug).await {
                Ok(detail) => detail,
                Err(e) => {
                    if !e.is_not_found() {
                        log::error!("Error while fetching {}: {}", slug, e);
                    }
                    self.numeric(out, reply::ERR_NOSUCHCHANNEL, &[slug]).await?;
                    continue;
                }
            };

            send(
                out,
                Message::with_prefix(self.nickname.as_str(), "JOIN", vec![channel.to_string()]),
            )
            .await?;
            let topic = trailing(&detail.topic());
            self.numeric(out, reply::RPL_TOPIC, &[channel, topic.as_str()])
                .await?;
            for names in names_lines(&self.nickname, &detail.episodes) {
                let names = trailing(&names);
                self.numeric(out, reply::RPL_NAMREPLY, &["=", channel, names.as_str()])
                    .await?;
            }
            self.numeric(out, reply::RPL_ENDOFNAMES, &[channel, ":End of names"])
                .await?;
        }

        Ok(())
    }

    async fn who(&self, message: &Message, out: &Outbound) -> SendResult {
        let Some(mask) = message.bare_param(0) else {
            return self.need_more_params(out, "WHO").await;
        };
        let slug = channel_slug(mask);
        let channel = slug_channel(slug);

        let detail = match self.catalog.get_episodes(slug).await {
            Ok(detail) => detail,
            Err(e) => {
                if !e.is_not_found() {
                    log::error!("Error while fetching {}: {}", slug, e);
                }
                return self
                    .numeric(out, reply::ERR_NOSUCHCHANNEL, &[channel.as_str()])
                    .await;
            }
        };

        for episode in &detail.episodes {
            let token = episode.display_token();
            self.numeric(
                out,
                reply::RPL_WHOREPLY,
                &[
                    channel.as_str(),
                    token.as_str(),
                    EPISODE_HOST,
                    EPISODE_HOST,
                    token.as_str(),
                    "H",
                    ":0 Episode",
                ],
            )
            .await?;
        }
        self.numeric(out, reply::RPL_ENDOFWHO, &[channel.as_str(), ":End of who"])
            .await
    }

    async fn part(&self, message: &Message, out: &Outbound) -> SendResult {
        let Some(channel) = message.bare_param(0) else {
            return self.need_more_params(out, "PART").await;
        };
        send(
            out,
            Message::with_prefix(self.nickname.as_str(), "PART", vec![channel.to_string()]),
        )
        .await
    }

    async fn mode(&self, message: &Message, out: &Outbound) -> SendResult {
        let Some(channel) = message.bare_param(0) else {
            return self.need_more_params(out, "MODE").await;
        };
        let Some(mode) = message.bare_param(1) else {
            return self
                .numeric(out, reply::RPL_CHANNELMODEIS, &[channel, "+"])
                .await;
        };

        if mode != "+v" {
            let name = mode.strip_prefix(['+', '-']).unwrap_or(mode);
            return self
                .numeric(out, reply::ERR_UNKNOWNMODE, &[name, "is unknown mode"])
                .await;
        }

        let Some(target) = message.bare_param(2) else {
            return self.need_more_params(out, "MODE").await;
        };

        let expected = channel_slug(channel);
        let (actual, episode) = match split_token(target) {
            Some((slug, episode)) if slug == expected => (slug, episode),
            other => {
                let slug = other.map_or(target, |(slug, _)| slug);
                return self
                    .numeric(
                        out,
                        reply::ERR_USERNOTINCHANNEL,
                        &[slug, channel, "not gonna happen"],
                    )
                    .await;
            }
        };

        let Ok(number) = episode.parse::<u32>() else {
            return self
                .numeric(out, reply::ERR_NOSUCHNICK, &[target, "No such episode"])
                .await;
        };

        send(
            out,
            Message::with_prefix(self.nickname.as_str(), "MODE", message.params.clone()),
        )
        .await?;

        let url = self.catalog.episode_url(actual, number);
        log::info!("{} voiced {}, playing {}", self.nickname, target, url);
        spawn_playback(Arc::clone(&self.launcher), url);

        send(
            out,
            Message::with_prefix(
                self.server_name.as_str(),
                "MODE",
                vec![channel.to_string(), "-v".to_string(), target.to_string()],
            ),
        )
        .await
    }

    async fn need_more_params(&self, out: &Outbound, command: &str) -> SendResult {
        self.numeric(out, reply::ERR_NEEDMOREPARAMS, &[command, "Not enough parameters"])
            .await
    }

    /// Send a numeric reply from the server addressed to the current nickname
    async fn numeric(&self, out: &Outbound, code: &str, params: &[&str]) -> SendResult {
        let mut all = Vec::with_capacity(params.len() + 1);
        all.push(self.nickname.clone());
        all.extend(params.iter().map(|p| p.to_string()));
        send(out, Message::with_prefix(self.server_name.as_str(), code, all)).await
    }
}

async fn send(out: &Outbound, message: Message) -> SendResult {
    out.send(message).await.map_err(|_| TransportError::Closed)
}

/// Names of a channel: the joining user as operator, then every episode,
/// split so no single reply grows past the byte budget
fn names_lines(nickname: &str, episodes: &[EpisodeEntry]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = format!("@{}", nickname);

    for episode in episodes {
        let token = episode.display_token();
        if !line.is_empty() && line.len() + 1 + token.len() > NAMES_LINE_BUDGET {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&token);
    }

    lines.push(line);
    lines
}
