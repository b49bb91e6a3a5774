use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use either::Either;
use poise::serenity_prelude::{
    CacheHttp as _, ComponentInteraction, Context as SerenityContext, CreateAttachment,
    CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage, GenericChannelId,
    Mentionable as _, MessageFlags, ModalInteraction, colours::css::WARNING,
};
use tracing::info;

use crate::config::{LOG_CHANNEL, STAFF_ROLE, TICKET_CLOSE_GRACE_SECS};
use crate::error::{UserError, WorkflowError};
use crate::shared::BotData;
use crate::shared::ui::{modal_input_value, paragraph_modal, text_container};
use crate::ticket::db::{DeleteTicket, GetTicket};
use crate::ticket::transcript;

/// Handles `ticket:` interactions on close controls.
pub async fn handle_interaction(
    ctx: &SerenityContext,
    interaction: Either<&ComponentInteraction, &ModalInteraction>,
    mut action: impl Iterator<Item = &str>,
) -> Result<()> {
    match interaction {
        Either::Left(interaction) => match action.next().unwrap_or_default() {
            "close" => request_close(ctx, interaction).await,
            other => Err(anyhow!("Unknown ticket action: {other:?}")),
        },
        Either::Right(interaction) => match action.next().unwrap_or_default() {
            "close_submit" => close_ticket(ctx, interaction, action).await,
            other => Err(anyhow!("Unknown ticket modal action: {other:?}")),
        },
    }
}

async fn request_close(ctx: &SerenityContext, interaction: &ComponentInteraction) -> Result<()> {
    let is_staff = interaction
        .member
        .as_ref()
        .is_some_and(|member| member.roles.contains(&STAFF_ROLE));
    if !is_staff {
        return Err(UserError(anyhow!("Only staff can close a ticket")).into());
    }

    let control_id = interaction.message.id.get();
    let db = &ctx.data::<BotData>().db_handle;
    if db
        .request(GetTicket {
            message_id: control_id,
        })
        .await??
        .is_none()
    {
        return Err(WorkflowError::TicketNotFound.into_user_error());
    }

    let modal = paragraph_modal(
        format!("ticket:close_submit:{control_id}"),
        "Close ticket".to_string(),
        "reason",
        "Closing note (kept with the transcript)".to_string(),
        None,
    );

    interaction
        .create_response(ctx.http(), CreateInteractionResponse::Modal(modal))
        .await?;
    Ok(())
}

async fn close_ticket(
    ctx: &SerenityContext,
    interaction: &ModalInteraction,
    mut action: impl Iterator<Item = &str>,
) -> Result<()> {
    let control_id = action
        .next()
        .unwrap_or_default()
        .parse::<u64>()
        .context("Invalid interaction: Expected control message ID")?;
    let reason = modal_input_value(&interaction.data.components, "reason")?;

    let db = &ctx.data::<BotData>().db_handle;
    let ticket = db
        .request(GetTicket {
            message_id: control_id,
        })
        .await??
        .ok_or_else(|| WorkflowError::TicketNotFound.into_user_error())?;
    let channel = GenericChannelId::new(ticket.channel_id);

    // announce first, then export, so the announcement is part of the record
    interaction
        .create_response(
            ctx.http(),
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::default()
                    .flags(MessageFlags::IS_COMPONENTS_V2)
                    .components(vec![text_container(
                        "## Ticket closing\nA transcript is being saved. This channel will be \
                         deleted shortly."
                            .to_string(),
                        WARNING,
                    )]),
            ),
        )
        .await?;

    let csv = transcript::export(ctx.http(), channel).await?;
    let file = CreateAttachment::bytes(csv, format!("ticket-{}.csv", ticket.channel_id));
    LOG_CHANNEL
        .send_message(
            ctx.http(),
            CreateMessage::new()
                .content(format!(
                    "Ticket {} closed by {}\n**Closing note**: {reason}",
                    channel.mention(),
                    interaction.user.name,
                ))
                .add_file(file),
        )
        .await?;

    tokio::time::sleep(Duration::from_secs(TICKET_CLOSE_GRACE_SECS)).await;
    ctx.http()
        .delete_channel(channel, Some("Ticket closed"))
        .await?;

    db.request(DeleteTicket {
        message_id: control_id,
    })
    .await??;

    info!(
        "{} closed ticket channel {channel}",
        interaction.user.name
    );
    Ok(())
}
