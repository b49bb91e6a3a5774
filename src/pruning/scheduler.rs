use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use poise::serenity_prelude::{CacheHttp as _, Context as SerenityContext, GenericChannelId};
use tracing::{error, info};

use crate::config::PRUNE_TICK_SECS;
use crate::pruning::prune::{LogReporter, prune_channel};
use crate::pruning::{PruneStore, is_due};
use crate::shared::BotData;

/// Background scheduler loop. Wakes up periodically, re-reads the schedule
/// file and runs a prune when one is due. Tick failures are logged, never
/// fatal.
pub async fn run(ctx: SerenityContext) {
    info!("Prune scheduler started");
    let mut interval = tokio::time::interval(Duration::from_secs(PRUNE_TICK_SECS));

    loop {
        interval.tick().await;
        if let Err(err) = tick(&ctx).await {
            error!("Prune tick failed: {err:#}");
        }
    }
}

async fn tick(ctx: &SerenityContext) -> Result<()> {
    let store: &PruneStore = &ctx.data::<BotData>().prune_store;

    // re-read every tick so /prune config takes effect without a restart
    let config = store.load_config()?;
    let Some(channel_id) = config.channel_id else {
        return Ok(());
    };

    let now = Utc::now().timestamp();
    let threshold = config.threshold_secs();
    if !is_due(now, store.watermark()?, threshold) {
        return Ok(());
    }

    let outcome = prune_channel(
        ctx.http(),
        GenericChannelId::new(channel_id),
        now - threshold as i64,
        config.images_only,
        config.log_channel_id.map(GenericChannelId::new),
        &LogReporter,
    )
    .await?;

    store.set_watermark(now)?;
    info!(
        "Scheduled prune of channel {channel_id} done: deleted {} of {} scanned",
        outcome.deleted, outcome.scanned,
    );
    Ok(())
}
