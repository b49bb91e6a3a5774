use anyhow::Result;
use chrono::Utc;
use poise::serenity_prelude::Context as SerenityContext;
use tracing::info;

use crate::application::db::write::PurgeExpiredDrafts;
use crate::application::review;
use crate::config::DRAFT_TTL_SECS;
use crate::shared::BotData;
use crate::ticket;

#[derive(Debug, Default, Copy, Clone)]
pub struct StartupReport {
    pub purged_drafts: usize,
    pub reviews_reattached: usize,
    pub reviews_skipped: usize,
    pub tickets_reattached: usize,
    pub tickets_skipped: usize,
}

impl StartupReport {
    pub fn summary(&self) -> String {
        format!(
            "Purged {} expired draft(s), re-attached {} review card(s) ({} skipped) and {} ticket control(s) ({} skipped)",
            self.purged_drafts,
            self.reviews_reattached,
            self.reviews_skipped,
            self.tickets_reattached,
            self.tickets_skipped,
        )
    }
}

/// Startup pass: drops abandoned drafts and refreshes the components of every
/// stored review card and ticket control, so buttons posted before a restart
/// keep working. Also runs on demand via a command.
pub async fn run_startup_pass(ctx: &SerenityContext) -> Result<StartupReport> {
    let db = &ctx.data::<BotData>().db_handle;

    let purged_drafts = db
        .request(PurgeExpiredDrafts {
            cutoff: Utc::now().timestamp() - DRAFT_TTL_SECS,
        })
        .await??;

    let (reviews_reattached, reviews_skipped) = review::reattach_review_cards(ctx).await?;
    let (tickets_reattached, tickets_skipped) = ticket::reattach_ticket_controls(ctx).await?;

    let report = StartupReport {
        purged_drafts,
        reviews_reattached,
        reviews_skipped,
        tickets_reattached,
        tickets_skipped,
    };
    info!("{}", report.summary());
    Ok(report)
}
