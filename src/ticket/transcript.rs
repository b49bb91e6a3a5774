use anyhow::Result;
use chrono::DateTime;
use poise::serenity_prelude::{GenericChannelId, GetMessages, Http, Message};

use crate::config::TRANSCRIPT_HISTORY_LIMIT;
use crate::shared::csv::CsvBuilder;

/// Exports a channel's history as CSV, oldest message first. Fetches in pages
/// of 100 until the history is exhausted or the export limit is reached.
pub async fn export(http: &Http, channel: GenericChannelId) -> Result<Vec<u8>> {
    let mut messages: Vec<Message> = Vec::new();

    loop {
        let mut filter = GetMessages::new().limit(100);
        if let Some(oldest) = messages.last() {
            filter = filter.before(oldest.id);
        }

        let page = channel.messages(http, filter).await?;
        let exhausted = page.len() < 100;
        messages.extend(page);

        if exhausted || messages.len() >= TRANSCRIPT_HISTORY_LIMIT {
            break;
        }
    }
    messages.truncate(TRANSCRIPT_HISTORY_LIMIT);
    // the API returns newest first
    messages.reverse();

    let mut csv = CsvBuilder::new(&["timestamp", "author", "content", "attachments"]);
    for message in &messages {
        let attachments = message
            .attachments
            .iter()
            .map(|a| a.url.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let timestamp = DateTime::from_timestamp(message.timestamp.timestamp(), 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        csv.row(&[
            &timestamp,
            &message.author.name,
            &message.content,
            &attachments,
        ]);
    }

    Ok(csv.into_bytes())
}
