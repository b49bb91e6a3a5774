use anyhow::{Context as _, Result, anyhow};
use chrono::Utc;
use either::Either;
use poise::serenity_prelude::{
    CacheHttp as _, ComponentInteraction, ComponentInteractionDataKind,
    Context as SerenityContext, CreateInteractionResponse, CreateInteractionResponseMessage,
    Mentionable as _, MessageFlags, ModalInteraction,
    colours::css::POSITIVE,
};
use tracing::info;

use crate::application::db::read::{GetDraftSession, GetPendingReview};
use crate::application::db::write::{ApplyDraftField, DeleteDraft};
use crate::application::draft::{self, PromptState};
use crate::application::review;
use crate::application::types::{
    Branch, FieldUpdate, ServiceStatus, TextField, Verdict,
};
use crate::error::{UserError, WorkflowError};
use crate::shared::BotData;
use crate::shared::ui::{ephemeral_notice, modal_input_value, paragraph_modal};

fn log_interaction(interaction: &Either<&ComponentInteraction, &ModalInteraction>) {
    match interaction {
        Either::Left(component_interaction) => {
            info!(
                "{} triggered component interaction: '{}'",
                component_interaction.user.name, component_interaction.data.custom_id
            );
        }
        Either::Right(modal_interaction) => {
            info!(
                "{} triggered modal interaction: '{}'",
                modal_interaction.user.name, modal_interaction.data.custom_id
            );
        }
    }
}

/// Handles `app:` interactions, the applicant-facing side of the workflow.
pub async fn handle_application(
    ctx: &SerenityContext,
    interaction: Either<&ComponentInteraction, &ModalInteraction>,
    mut action: impl Iterator<Item = &str>,
) -> Result<()> {
    log_interaction(&interaction);

    match interaction {
        Either::Left(interaction) => match action.next().unwrap_or_default() {
            "start" => start_application(ctx, interaction).await,
            "field" => open_field_modal(ctx, interaction, action).await,
            "branch" | "status" => apply_selection(ctx, interaction).await,
            "submit" => submit_application(ctx, interaction).await,
            other => Err(anyhow!("Unknown application action: {other:?}")),
        },
        Either::Right(interaction) => match action.next().unwrap_or_default() {
            "field_submit" => store_field_value(ctx, interaction, action).await,
            other => Err(anyhow!("Unknown application modal action: {other:?}")),
        },
    }
}

async fn start_application(ctx: &SerenityContext, interaction: &ComponentInteraction) -> Result<()> {
    draft::open_session(ctx, &interaction.user).await?;

    interaction
        .create_response(
            ctx.http(),
            ephemeral_notice(
                "## Check your DMs\nI've sent you an application form in a direct message."
                    .to_string(),
                POSITIVE,
            ),
        )
        .await?;
    Ok(())
}

async fn open_field_modal(
    ctx: &SerenityContext,
    interaction: &ComponentInteraction,
    mut action: impl Iterator<Item = &str>,
) -> Result<()> {
    let field = action
        .next()
        .and_then(TextField::from_key)
        .context("Invalid interaction: Expected field key")?;

    let db = &ctx.data::<BotData>().db_handle;
    let prefill = db
        .request(GetDraftSession {
            message_id: interaction.message.id.get(),
        })
        .await??
        .and_then(|session| session.fields.text(field).map(str::to_string));

    let modal = paragraph_modal(
        format!("app:field_submit:{}:{}", field.key(), interaction.message.id),
        field.label().to_string(),
        field.key(),
        field.label().to_string(),
        prefill,
    );

    interaction
        .create_response(ctx.http(), CreateInteractionResponse::Modal(modal))
        .await?;
    Ok(())
}

async fn apply_selection(ctx: &SerenityContext, interaction: &ComponentInteraction) -> Result<()> {
    let ComponentInteractionDataKind::StringSelect { values } = &interaction.data.kind else {
        return Err(anyhow!("Expected a select menu interaction"));
    };
    let value = values
        .first()
        .context("Invalid interaction: Empty selection")?;

    let update = match interaction.data.custom_id.as_str() {
        "app:branch" => FieldUpdate::Branch(
            Branch::from_value(value).context("Invalid interaction: Unknown branch")?,
        ),
        "app:status" => FieldUpdate::Status(
            ServiceStatus::from_value(value).context("Invalid interaction: Unknown status")?,
        ),
        other => return Err(anyhow!("Unknown selection: {other:?}")),
    };

    let db = &ctx.data::<BotData>().db_handle;
    let fields = db
        .request(ApplyDraftField {
            message_id: interaction.message.id.get(),
            user_id: interaction.user.id.get(),
            opened_at: Utc::now().timestamp(),
            update,
        })
        .await??;

    interaction
        .create_response(
            ctx.http(),
            CreateInteractionResponse::UpdateMessage(
                CreateInteractionResponseMessage::default()
                    .flags(MessageFlags::IS_COMPONENTS_V2)
                    .components(draft::prompt_components(&fields, PromptState::Editing)),
            ),
        )
        .await?;
    Ok(())
}

async fn store_field_value(
    ctx: &SerenityContext,
    interaction: &ModalInteraction,
    mut action: impl Iterator<Item = &str>,
) -> Result<()> {
    let field = action
        .next()
        .and_then(TextField::from_key)
        .context("Invalid interaction: Expected field key")?;
    let anchor = action
        .next()
        .unwrap_or_default()
        .parse::<u64>()
        .context("Invalid interaction: Expected prompt message ID")?;

    let value = modal_input_value(&interaction.data.components, field.key())?;
    if value.is_empty() {
        return Err(UserError(anyhow!("{} cannot be empty", field.label())).into());
    }

    let db = &ctx.data::<BotData>().db_handle;
    let fields = db
        .request(ApplyDraftField {
            message_id: anchor,
            user_id: interaction.user.id.get(),
            opened_at: Utc::now().timestamp(),
            update: FieldUpdate::Text(field, value),
        })
        .await??;

    // the modal was opened from the prompt message, so an update response
    // re-renders it in place
    interaction
        .create_response(
            ctx.http(),
            CreateInteractionResponse::UpdateMessage(
                CreateInteractionResponseMessage::default()
                    .flags(MessageFlags::IS_COMPONENTS_V2)
                    .components(draft::prompt_components(&fields, PromptState::Editing)),
            ),
        )
        .await?;
    Ok(())
}

async fn submit_application(
    ctx: &SerenityContext,
    interaction: &ComponentInteraction,
) -> Result<()> {
    let db = &ctx.data::<BotData>().db_handle;

    let session = db
        .request(GetDraftSession {
            message_id: interaction.message.id.get(),
        })
        .await??
        .context(UserError(anyhow!(
            "This application form is no longer active. Press Apply in the server to start over."
        )))?;

    let application = match session.fields.complete() {
        Ok(application) => application,
        Err(err) => return Err(UserError(err.into()).into()),
    };

    review::submit_for_review(ctx, interaction.user.id, application).await?;

    db.request(DeleteDraft {
        message_id: session.message_id,
    })
    .await??;

    interaction
        .create_response(
            ctx.http(),
            CreateInteractionResponse::UpdateMessage(
                CreateInteractionResponseMessage::default()
                    .flags(MessageFlags::IS_COMPONENTS_V2)
                    .components(draft::prompt_components(
                        &session.fields,
                        PromptState::Submitted,
                    )),
            ),
        )
        .await?;
    Ok(())
}

/// Handles `review:` interactions on staff review cards.
pub async fn handle_review(
    ctx: &SerenityContext,
    interaction: Either<&ComponentInteraction, &ModalInteraction>,
    mut action: impl Iterator<Item = &str>,
) -> Result<()> {
    log_interaction(&interaction);

    match interaction {
        Either::Left(interaction) => match action.next().unwrap_or_default() {
            verdict_action @ ("approve" | "deny") => {
                open_verdict_modal(ctx, interaction, verdict_action).await
            }
            "ticket" => open_ticket(ctx, interaction).await,
            other => Err(anyhow!("Unknown review action: {other:?}")),
        },
        Either::Right(interaction) => match action.next().unwrap_or_default() {
            "verdict" => record_verdict(ctx, interaction, action).await,
            other => Err(anyhow!("Unknown review modal action: {other:?}")),
        },
    }
}

async fn open_verdict_modal(
    ctx: &SerenityContext,
    interaction: &ComponentInteraction,
    verdict_action: &str,
) -> Result<()> {
    let card_id = interaction.message.id.get();
    let db = &ctx.data::<BotData>().db_handle;

    // the card may have been decided or removed since it was rendered
    if db
        .request(GetPendingReview { message_id: card_id })
        .await??
        .is_none()
    {
        return Err(WorkflowError::ReviewNotFound.into_user_error());
    }

    let title = match verdict_action {
        "approve" => "Approve application",
        _ => "Deny application",
    };

    let modal = paragraph_modal(
        format!("review:verdict:{verdict_action}:{card_id}"),
        title.to_string(),
        "reason",
        "Reason (shared with the applicant)".to_string(),
        None,
    );

    interaction
        .create_response(ctx.http(), CreateInteractionResponse::Modal(modal))
        .await?;
    Ok(())
}

async fn open_ticket(ctx: &SerenityContext, interaction: &ComponentInteraction) -> Result<()> {
    let db = &ctx.data::<BotData>().db_handle;
    let review = db
        .request(GetPendingReview {
            message_id: interaction.message.id.get(),
        })
        .await??
        .ok_or_else(|| WorkflowError::ReviewNotFound.into_user_error())?;

    let channel = crate::ticket::open_ticket(ctx, &interaction.user, &review).await?;

    interaction
        .create_response(
            ctx.http(),
            ephemeral_notice(
                format!(
                    "## Ticket created\nDiscuss this application in {}.",
                    channel.id.widen().mention()
                ),
                POSITIVE,
            ),
        )
        .await?;
    Ok(())
}

async fn record_verdict(
    ctx: &SerenityContext,
    interaction: &ModalInteraction,
    mut action: impl Iterator<Item = &str>,
) -> Result<()> {
    let verdict = action
        .next()
        .and_then(Verdict::from_action)
        .context("Invalid interaction: Expected verdict")?;
    let card_id = action
        .next()
        .unwrap_or_default()
        .parse::<u64>()
        .context("Invalid interaction: Expected card message ID")?;

    let reason = modal_input_value(&interaction.data.components, "reason")?;

    let review = review::apply_decision(ctx, verdict, card_id, &reason, &interaction.user).await?;

    interaction
        .create_response(
            ctx.http(),
            ephemeral_notice(
                format!(
                    "## Application {}\n<@{}> has been notified.",
                    verdict.label().to_lowercase(),
                    review.user_id,
                ),
                POSITIVE,
            ),
        )
        .await?;
    Ok(())
}
