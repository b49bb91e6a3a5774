use std::time::Duration;

use anyhow::Result;
use chrono::DateTime;
use poise::serenity_prelude::{
    CreateAttachment, CreateMessage, GenericChannelId, GetMessages, Http, Message, async_trait,
};
use tracing::{info, warn};

use crate::config::{PRUNE_DELETE_DELAY_MS, PRUNE_HISTORY_LIMIT};
use crate::pruning::is_image_filename;
use crate::shared::csv::CsvBuilder;

#[derive(Debug, Default, Copy, Clone)]
pub struct PruneOutcome {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Receives progress notices during a prune run. Scheduled runs log them,
/// command-triggered runs relay them to the invoker.
#[async_trait]
pub trait PruneReporter: Send + Sync {
    async fn notify(&self, message: String);
}

pub struct LogReporter;

#[async_trait]
impl PruneReporter for LogReporter {
    async fn notify(&self, message: String) {
        info!("{message}");
    }
}

/// Deletes stale attachment messages from a channel. Individual deletion
/// failures are counted and skipped so one stuck message cannot wedge a run.
pub async fn prune_channel(
    http: &Http,
    channel: GenericChannelId,
    cutoff: i64,
    images_only: bool,
    log_channel: Option<GenericChannelId>,
    reporter: &dyn PruneReporter,
) -> Result<PruneOutcome> {
    reporter
        .notify(format!("Scanning {channel} for stale attachments"))
        .await;

    let mut outcome = PruneOutcome::default();
    let mut candidates: Vec<Message> = Vec::new();
    let mut last_seen = None;

    loop {
        let mut filter = GetMessages::new().limit(100);
        if let Some(before) = last_seen {
            filter = filter.before(before);
        }

        let page = channel.messages(http, filter).await?;
        let exhausted = page.len() < 100;
        outcome.scanned += page.len();
        last_seen = page.last().map(|m| m.id);

        candidates.extend(
            page.into_iter()
                .filter(|message| is_candidate(message, cutoff, images_only)),
        );

        if exhausted || outcome.scanned >= PRUNE_HISTORY_LIMIT {
            break;
        }
    }

    let mut audit = CsvBuilder::new(&["message_id", "author", "posted_at", "attachment"]);
    for message in &candidates {
        match message.delete(http, Some("Stale attachment pruned")).await {
            Ok(()) => {
                outcome.deleted += 1;
                let posted_at = DateTime::from_timestamp(message.timestamp.timestamp(), 0)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
                let attachment = message
                    .attachments
                    .first()
                    .map(|a| a.url.as_str())
                    .unwrap_or_default();
                audit.row(&[
                    &message.id.to_string(),
                    &message.author.name,
                    &posted_at,
                    attachment,
                ]);
            }
            Err(err) => {
                outcome.failed += 1;
                warn!("Failed to delete message {} in {channel}: {err:#}", message.id);
            }
        }
        tokio::time::sleep(Duration::from_millis(PRUNE_DELETE_DELAY_MS)).await;
    }

    if outcome.deleted > 0
        && let Some(log_channel) = log_channel
    {
        let file = CreateAttachment::bytes(audit.into_bytes(), format!("prune-{channel}.csv"));
        if let Err(err) = log_channel
            .send_message(
                http,
                CreateMessage::new()
                    .content(format!(
                        "Pruned {} stale attachment message(s) from <#{channel}>",
                        outcome.deleted,
                    ))
                    .add_file(file),
            )
            .await
        {
            warn!("Failed to post prune audit file: {err:#}");
        }
    }

    reporter
        .notify(format!(
            "Prune finished: scanned {}, deleted {}, failed {}",
            outcome.scanned, outcome.deleted, outcome.failed,
        ))
        .await;
    Ok(outcome)
}

fn is_candidate(message: &Message, cutoff: i64, images_only: bool) -> bool {
    should_prune(
        message.timestamp.timestamp(),
        message.attachments.iter().map(|a| a.filename.as_str()),
        cutoff,
        images_only,
    )
}

fn should_prune<'a>(
    posted_at: i64,
    mut attachments: impl Iterator<Item = &'a str>,
    cutoff: i64,
    images_only: bool,
) -> bool {
    if posted_at >= cutoff {
        return false;
    }
    if images_only {
        attachments.any(is_image_filename)
    } else {
        attachments.next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 86400;
    const CUTOFF: i64 = 1_000_000_000;

    #[test]
    fn old_images_are_pruned_and_fresh_documents_kept() {
        // a month-old image falls to the images-only filter
        assert!(should_prune(
            CUTOFF - 30 * DAY,
            ["photo.png"].into_iter(),
            CUTOFF,
            true
        ));
        // a document from today survives
        assert!(!should_prune(
            CUTOFF + DAY,
            ["report.pdf"].into_iter(),
            CUTOFF,
            true
        ));
    }

    #[test]
    fn images_only_spares_old_documents() {
        let old = CUTOFF - 30 * DAY;
        assert!(!should_prune(old, ["report.pdf"].into_iter(), CUTOFF, true));
        // without the filter any old attachment goes
        assert!(should_prune(old, ["report.pdf"].into_iter(), CUTOFF, false));
    }

    #[test]
    fn messages_without_attachments_are_never_pruned() {
        assert!(!should_prune(CUTOFF - 30 * DAY, [].into_iter(), CUTOFF, false));
        assert!(!should_prune(CUTOFF - 30 * DAY, [].into_iter(), CUTOFF, true));
    }
}
