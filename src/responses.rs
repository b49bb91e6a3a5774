use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use poise::serenity_prelude::{CacheHttp as _, Context as SerenityContext, Message};
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct RawRule {
    pattern: String,
    response: String,
    #[serde(default)]
    mention_required: bool,
}

#[derive(Debug)]
struct ResponseRule {
    pattern: Regex,
    response: String,
    mention_required: bool,
}

/// Pattern-matched canned replies, loaded from a JSON rule file. The first
/// matching rule wins.
#[derive(Debug, Default)]
pub struct ResponseSet {
    rules: Vec<ResponseRule>,
}

impl ResponseSet {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&text)
    }

    /// Parses the rule file. Rules with invalid patterns are logged and
    /// skipped rather than failing the whole set.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: Vec<RawRule> = serde_json::from_str(text).context("Invalid response rules")?;

        let mut rules = Vec::with_capacity(raw.len());
        for rule in raw {
            match Regex::new(&format!("(?i){}", rule.pattern)) {
                Ok(pattern) => rules.push(ResponseRule {
                    pattern,
                    response: rule.response,
                    mention_required: rule.mention_required,
                }),
                Err(err) => warn!("Skipping response rule {:?}: {err}", rule.pattern),
            }
        }

        Ok(ResponseSet { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.pattern.as_str())
    }

    /// Picks the reply for a message, if any rule matches. `mention` replaces
    /// the `{mention}` placeholder in the response text.
    pub fn reply_to(&self, content: &str, mentions_bot: bool, mention: &str) -> Option<String> {
        self.rules
            .iter()
            .filter(|rule| mentions_bot || !rule.mention_required)
            .find(|rule| rule.pattern.is_match(content))
            .map(|rule| rule.response.replace("{mention}", mention))
    }
}

pub async fn handle_message(ctx: &SerenityContext, msg: &Message) -> Result<()> {
    if msg.author.bot() {
        return Ok(());
    }

    let bot_id = ctx.cache.current_user().id;
    let mentions_bot = msg.mentions.iter().any(|user| user.id == bot_id);
    let mention = format!("<@{}>", msg.author.id);

    let data = ctx.data::<crate::shared::BotData>();
    let reply = {
        let responder = data.responder.read().await;
        responder.reply_to(&msg.content, mentions_bot, &mention)
    };

    if let Some(reply) = reply {
        msg.reply(ctx.http(), reply).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ResponseSet {
        ResponseSet::from_json(
            r#"[
                {"pattern": "\\bhello\\b", "response": "Hi there, {mention}!"},
                {"pattern": "help", "response": "Ask in the support channel", "mention_required": true}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn first_matching_rule_wins_case_insensitively() {
        let set = rules();
        assert_eq!(
            set.reply_to("HELLO world", false, "<@1>"),
            Some("Hi there, <@1>!".to_string())
        );
        assert_eq!(set.reply_to("hellos", false, "<@1>"), None);
    }

    #[test]
    fn mention_required_rules_are_gated() {
        let set = rules();
        assert_eq!(set.reply_to("I need help", false, "<@1>"), None);
        assert_eq!(
            set.reply_to("I need help", true, "<@1>"),
            Some("Ask in the support channel".to_string())
        );
    }

    #[test]
    fn invalid_patterns_are_skipped() {
        let set = ResponseSet::from_json(
            r#"[
                {"pattern": "([", "response": "broken"},
                {"pattern": "ok", "response": "fine"}
            ]"#,
        )
        .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.reply_to("ok", false, ""), Some("fine".to_string()));
    }
}
