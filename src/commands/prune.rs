use anyhow::{Result, anyhow};
use chrono::Utc;
use poise::{
    ChoiceParameter as _, CreateReply,
    serenity_prelude::{
        GenericChannelId, Mentionable as _, MessageFlags, async_trait,
        colours::{css::POSITIVE, roles::BLUE},
    },
};
use tracing::warn;

use crate::error::UserError;
use crate::pruning::prune::{PruneReporter, prune_channel};
use crate::pruning::{IntervalUnit, PruneConfig};
use crate::shared::Context;

#[poise::command(
    slash_command,
    subcommand_required,
    guild_only,
    subcommands("config", "now", "next")
)]
pub async fn prune(_ctx: Context<'_>) -> Result<()> {
    unreachable!("This shouldn't be possible to invoke");
}

/// Configure the scheduled pruning of stale attachment messages
#[poise::command(slash_command)]
async fn config(
    ctx: Context<'_>,
    #[description = "Channel to prune"]
    #[channel_types("Text")]
    channel: GenericChannelId,
    #[description = "How many units between runs"]
    #[min = 1]
    #[max = 10000]
    interval: u64,
    #[description = "Unit of the interval"] unit: IntervalUnit,
    #[description = "Channel receiving audit files"]
    #[channel_types("Text")]
    log_channel: Option<GenericChannelId>,
    #[description = "Only delete messages whose attachments are images"] images_only: Option<bool>,
) -> Result<()> {
    let config = PruneConfig {
        channel_id: Some(channel.get()),
        interval,
        unit,
        log_channel_id: log_channel.map(|c| c.get()),
        images_only: images_only.unwrap_or(false),
    };
    ctx.data().prune_store.store_config(&config)?;

    let log_line = match log_channel {
        Some(log_channel) => format!("\nAudit files go to {}.", log_channel.mention()),
        None => String::new(),
    };
    ctx.send(
        CreateReply::new()
            .flags(MessageFlags::IS_COMPONENTS_V2)
            .components(vec![crate::shared::ui::text_container(
                format!(
                    "## Pruning configured\nMessages with {} older than {interval} {} are deleted from {}.{log_line}",
                    if config.images_only { "image attachments" } else { "attachments" },
                    unit.name().to_lowercase(),
                    channel.mention(),
                ),
                POSITIVE,
            )])
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

struct CommandReporter<'a> {
    ctx: Context<'a>,
}

#[async_trait]
impl PruneReporter for CommandReporter<'_> {
    async fn notify(&self, message: String) {
        let reply = CreateReply::new()
            .flags(MessageFlags::IS_COMPONENTS_V2)
            .components(vec![crate::shared::ui::text_container(message, BLUE)])
            .ephemeral(true);
        if let Err(err) = self.ctx.send(reply).await {
            warn!("Failed to relay prune progress: {err:#}");
        }
    }
}

/// Run a prune immediately, regardless of the schedule
#[poise::command(slash_command)]
async fn now(
    ctx: Context<'_>,
    #[description = "Override the configured images-only setting"] images_only: Option<bool>,
) -> Result<()> {
    let store = &ctx.data().prune_store;
    let config = store.load_config()?;
    let Some(channel_id) = config.channel_id else {
        return Err(UserError(anyhow!(
            "Pruning is not configured yet, run `/prune config` first"
        ))
        .into());
    };

    ctx.defer_ephemeral().await?;

    let now = Utc::now().timestamp();
    let reporter = CommandReporter { ctx };
    prune_channel(
        ctx.http(),
        GenericChannelId::new(channel_id),
        now - config.threshold_secs() as i64,
        images_only.unwrap_or(config.images_only),
        config.log_channel_id.map(GenericChannelId::new),
        &reporter,
    )
    .await?;

    store.set_watermark(now)?;
    Ok(())
}

/// Show when the next scheduled prune run is due
#[poise::command(slash_command)]
async fn next(ctx: Context<'_>) -> Result<()> {
    let store = &ctx.data().prune_store;
    let config = store.load_config()?;

    let text = match config.channel_id {
        None => "## Next prune\nPruning is not configured.".to_string(),
        Some(channel_id) => {
            let due_at = store
                .watermark()?
                .map(|mark| mark + config.threshold_secs() as i64);
            let when = match due_at {
                Some(due_at) if due_at > Utc::now().timestamp() => format!("<t:{due_at}:R>"),
                _ => "on the next scheduler pass".to_string(),
            };
            format!(
                "## Next prune\n{} will be pruned {when}.",
                GenericChannelId::new(channel_id).mention(),
            )
        }
    };

    ctx.send(
        CreateReply::new()
            .flags(MessageFlags::IS_COMPONENTS_V2)
            .components(vec![crate::shared::ui::text_container(text, BLUE)])
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
