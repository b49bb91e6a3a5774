use anyhow::{Context as _, Result, anyhow};
use poise::{
    CreateReply,
    serenity_prelude::{
        ButtonStyle, CreateActionRow, CreateButton, CreateComponent, CreateContainer,
        CreateContainerComponent, CreateMessage, CreateTextDisplay, MessageFlags, MessageId,
        colours::{css::POSITIVE, roles::BLUE},
    },
};
use tracing::warn;

use crate::application::db::read::ListPendingReviews;
use crate::application::db::write::RemoveApplication;
use crate::config::{GUILD, STAFF_REVIEW_CHANNEL};
use crate::error::UserError;
use crate::shared::Context;

#[poise::command(
    slash_command,
    subcommand_required,
    guild_only,
    subcommands("panel", "pending", "remove", "reattach")
)]
pub async fn application(_ctx: Context<'_>) -> Result<()> {
    unreachable!("This shouldn't be possible to invoke");
}

/// Post the application panel with the Apply button in this channel
#[poise::command(
    slash_command,
    required_bot_permissions = "VIEW_CHANNEL | SEND_MESSAGES"
)]
async fn panel(ctx: Context<'_>) -> Result<()> {
    let container = CreateComponent::Container(
        CreateContainer::new(vec![
            CreateContainerComponent::TextDisplay(CreateTextDisplay::new(
                "# Join us
Press **Apply** and I'll DM you a short membership application. \
Make sure your DMs are open for members of this server.",
            )),
            CreateContainerComponent::ActionRow(CreateActionRow::Buttons(
                vec![
                    CreateButton::new("app:start")
                        .label("Apply")
                        .style(ButtonStyle::Primary),
                ]
                .into(),
            )),
        ])
        .accent_color(BLUE),
    );

    ctx.channel_id()
        .send_message(
            ctx.http(),
            CreateMessage::new()
                .flags(MessageFlags::IS_COMPONENTS_V2)
                .components(vec![container]),
        )
        .await?;

    ctx.send(
        CreateReply::new()
            .flags(MessageFlags::IS_COMPONENTS_V2)
            .components(vec![crate::shared::ui::text_container(
                "## Panel posted".to_string(),
                POSITIVE,
            )])
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// List every application waiting for a decision
#[poise::command(slash_command)]
async fn pending(ctx: Context<'_>) -> Result<()> {
    let reviews = ctx.data().db_handle.request(ListPendingReviews).await??;

    let text = if reviews.is_empty() {
        "## Pending applications\nNothing is waiting for review.".to_string()
    } else {
        let lines = reviews
            .iter()
            .map(|review| {
                format!(
                    "- <@{}> ({}, {}) – {}",
                    review.user_id,
                    review.application.branch,
                    review.application.status,
                    MessageId::new(review.message_id).link(STAFF_REVIEW_CHANNEL, Some(GUILD)),
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!("## Pending applications\n{lines}")
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

/// Withdraw a pending application, letting the applicant start over
#[poise::command(slash_command)]
async fn remove(
    ctx: Context<'_>,
    #[description = "Message ID of the review card"] message_id: String,
) -> Result<()> {
    let card_id = message_id
        .trim()
        .parse::<u64>()
        .map_err(|_| UserError(anyhow!("{message_id:?} is not a message ID")))?;

    let user_id = ctx
        .data()
        .db_handle
        .request(RemoveApplication {
            message_id: card_id,
        })
        .await??
        .context(UserError(anyhow!(
            "No pending review with that message ID"
        )))?;

    if let Err(err) = ctx
        .http()
        .delete_message(
            STAFF_REVIEW_CHANNEL,
            MessageId::new(card_id),
            Some("Application withdrawn"),
        )
        .await
    {
        warn!("Failed to delete review card {card_id}: {err:#}");
    }

    ctx.send(
        CreateReply::new()
            .flags(MessageFlags::IS_COMPONENTS_V2)
            .components(vec![crate::shared::ui::text_container(
                format!("## Application removed\n<@{user_id}> can apply again."),
                POSITIVE,
            )])
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Re-run the startup pass: purge stale drafts, refresh cards and controls
#[poise::command(slash_command)]
async fn reattach(ctx: Context<'_>) -> Result<()> {
    ctx.defer_ephemeral().await?;

    let report = crate::maintenance::run_startup_pass(ctx.serenity_context()).await?;

    ctx.send(
        CreateReply::new()
            .flags(MessageFlags::IS_COMPONENTS_V2)
            .components(vec![crate::shared::ui::text_container(
                format!("## Maintenance done\n{}", report.summary()),
                POSITIVE,
            )])
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
