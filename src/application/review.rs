use anyhow::{Context as _, Result};
use chrono::Utc;
use poise::serenity_prelude::{
    ButtonStyle, CacheHttp as _, Context as SerenityContext, CreateActionRow, CreateAttachment,
    CreateButton, CreateComponent, CreateContainer, CreateContainerComponent, CreateMessage,
    CreateTextDisplay, EditMember,
    EditMessage, Mentionable as _, MessageFlags, MessageId, Permissions, User, UserId,
    colours::css::{DANGER, POSITIVE},
    colours::roles::BLUE,
};
use tracing::{info, warn};

use crate::application::db::read::ListPendingReviews;
use crate::application::db::write::{DecideApplication, InsertPendingReview};
use crate::application::types::{Branch, CompletedApplication, PendingReview, Verdict};
use crate::config::{GUILD, LOG_CHANNEL, STAFF_REVIEW_CHANNEL};
use crate::error::WorkflowError;
use crate::shared::BotData;
use crate::shared::csv::CsvBuilder;

/// Whether a review card still offers decision controls.
#[derive(Debug, Copy, Clone)]
pub enum CardState {
    Open,
    Decided(Verdict),
}

/// Renders a review card for the staff channel.
pub fn review_card(
    user_id: UserId,
    application: &CompletedApplication,
    state: CardState,
) -> Vec<CreateComponent<'static>> {
    let mut summary = format!(
        "## Membership Application
Applicant: {}
**Name**: {}
**Pronouns**: {}
**Branch**: {}
**Service status**: {}
**How they found us**: {}",
        user_id.mention(),
        application.name,
        application.pronouns,
        application.branch,
        application.status,
        application.referral,
    );

    let (components, color) = match state {
        CardState::Open => {
            let buttons = CreateContainerComponent::ActionRow(CreateActionRow::Buttons(
                vec![
                    CreateButton::new("review:approve")
                        .label("Approve")
                        .style(ButtonStyle::Success),
                    CreateButton::new("review:deny")
                        .label("Deny")
                        .style(ButtonStyle::Danger),
                    CreateButton::new("review:ticket")
                        .label("Open Ticket")
                        .style(ButtonStyle::Secondary),
                ]
                .into(),
            ));
            let text = CreateContainerComponent::TextDisplay(CreateTextDisplay::new(summary));
            (vec![text, buttons], BLUE)
        }
        CardState::Decided(verdict) => {
            summary.push_str(&format!("\n\n### {}", verdict.label()));
            let text = CreateContainerComponent::TextDisplay(CreateTextDisplay::new(summary));
            let color = match verdict {
                Verdict::Approved => POSITIVE,
                Verdict::Denied => DANGER,
            };
            (vec![text], color)
        }
    };

    vec![CreateComponent::Container(
        CreateContainer::new(components).accent_color(color),
    )]
}

/// Posts the review card and registers the pending review. The applicant
/// record is set to pending in the same transaction as the card insert.
pub async fn submit_for_review(
    ctx: &SerenityContext,
    user_id: UserId,
    application: CompletedApplication,
) -> Result<()> {
    let db = &ctx.data::<BotData>().db_handle;

    let card = STAFF_REVIEW_CHANNEL
        .send_message(
            ctx.http(),
            CreateMessage::new()
                .flags(MessageFlags::IS_COMPONENTS_V2)
                .components(review_card(user_id, &application, CardState::Open)),
        )
        .await
        .context("Failed to post review card")?;

    let inserted = db
        .request(InsertPendingReview {
            review: PendingReview {
                message_id: card.id.get(),
                user_id: user_id.get(),
                application,
            },
            submitted_at: Utc::now().to_rfc3339(),
        })
        .await??;

    if !inserted {
        // lost the race against another submission of the same user
        let _ = card.delete(ctx.http(), Some("Duplicate application")).await;
        return Err(WorkflowError::AlreadyUnderReview.into_user_error());
    }

    info!("Application of user {user_id} submitted for review (card {})", card.id);
    Ok(())
}

/// Resolves a pending review. The status update and review removal are one
/// transaction; everything that follows is best-effort and must not undo a
/// recorded decision.
pub async fn apply_decision(
    ctx: &SerenityContext,
    verdict: Verdict,
    card_id: u64,
    reason: &str,
    reviewer: &User,
) -> Result<PendingReview> {
    let db = &ctx.data::<BotData>().db_handle;

    let review = db
        .request(DecideApplication {
            message_id: card_id,
            verdict,
        })
        .await??
        .ok_or_else(|| WorkflowError::ReviewNotFound.into_user_error())?;

    let applicant = UserId::new(review.user_id);
    info!(
        "{} {} the application of user {applicant}",
        reviewer.name,
        verdict.label().to_lowercase(),
    );

    if verdict == Verdict::Approved {
        if let Err(err) = grant_branch_role(ctx, applicant, review.application.branch).await {
            warn!("Failed to grant branch role to {applicant}: {err:#}");
        }
        if let Err(err) = set_display_name(ctx, applicant, &review.application).await {
            warn!("Failed to update display name of {applicant}: {err:#}");
        }
    }

    if let Err(err) = dm_decision(ctx, applicant, verdict, reason).await {
        warn!("Failed to DM decision to {applicant}: {err:#}");
    }

    let edit = EditMessage::new()
        .flags(MessageFlags::IS_COMPONENTS_V2)
        .components(review_card(
            applicant,
            &review.application,
            CardState::Decided(verdict),
        ));
    if let Err(err) = ctx
        .http()
        .edit_message(STAFF_REVIEW_CHANNEL, MessageId::new(card_id), &edit, vec![])
        .await
    {
        warn!("Failed to update review card {card_id}: {err:#}");
    }

    if let Err(err) = post_audit_record(ctx, &review, verdict, reason, reviewer).await {
        warn!("Failed to post decision audit record: {err:#}");
    }

    Ok(review)
}

/// Grants the role matching the applicant's branch by name. Only roles with
/// empty permissions qualify, so a name collision can never hand out staff
/// rights. A missing role is a no-op.
async fn grant_branch_role(ctx: &SerenityContext, user_id: UserId, branch: Branch) -> Result<()> {
    let role_id = GUILD
        .roles(ctx.http())
        .await?
        .into_iter()
        .find_map(|role| {
            (role.name == branch.label() && role.permissions == Permissions::empty())
                .then_some(role.id)
        });

    let Some(role_id) = role_id else {
        info!("No assignable role named {:?}, skipping grant", branch.label());
        return Ok(());
    };

    let member = GUILD.member(ctx.http(), user_id).await?;
    let mut roles: Vec<_> = member.roles.iter().copied().collect();
    if roles.contains(&role_id) {
        return Ok(());
    }
    roles.push(role_id);

    GUILD
        .edit_member(ctx.http(), user_id, EditMember::new().roles(roles))
        .await?;
    Ok(())
}

// Discord caps nicknames at 32 characters; truncate by char so multi-byte
// names cannot land on a non-boundary byte
fn build_nickname(name: &str, pronouns: &str) -> String {
    format!("{name} ({pronouns})").chars().take(32).collect()
}

async fn set_display_name(
    ctx: &SerenityContext,
    user_id: UserId,
    application: &CompletedApplication,
) -> Result<()> {
    let nickname = build_nickname(&application.name, &application.pronouns);

    GUILD
        .edit_member(ctx.http(), user_id, EditMember::new().nickname(nickname))
        .await?;
    Ok(())
}

async fn dm_decision(
    ctx: &SerenityContext,
    user_id: UserId,
    verdict: Verdict,
    reason: &str,
) -> Result<()> {
    let (headline, color) = match verdict {
        Verdict::Approved => ("## Application approved\nWelcome aboard!", POSITIVE),
        Verdict::Denied => ("## Application denied", DANGER),
    };

    let container = crate::shared::ui::text_container(
        format!("{headline}\n**Reviewer note**: {reason}"),
        color,
    );

    user_id
        .dm(
            ctx.http(),
            CreateMessage::new()
                .flags(MessageFlags::IS_COMPONENTS_V2)
                .components(vec![container]),
        )
        .await?;
    Ok(())
}

async fn post_audit_record(
    ctx: &SerenityContext,
    review: &PendingReview,
    verdict: Verdict,
    reason: &str,
    reviewer: &User,
) -> Result<()> {
    let mut csv = CsvBuilder::new(&[
        "user_id",
        "name",
        "pronouns",
        "branch",
        "service_status",
        "referral",
        "verdict",
        "reason",
        "reviewer",
        "decided_at",
    ]);
    csv.row(&[
        &review.user_id.to_string(),
        &review.application.name,
        &review.application.pronouns,
        review.application.branch.label(),
        review.application.status.label(),
        &review.application.referral,
        verdict.label(),
        reason,
        &reviewer.name,
        &Utc::now().to_rfc3339(),
    ]);

    let file = CreateAttachment::bytes(csv.into_bytes(), format!("decision-{}.csv", review.user_id));

    LOG_CHANNEL
        .send_message(
            ctx.http(),
            CreateMessage::new()
                .content(format!(
                    "Application of <@{}> {} by {}",
                    review.user_id,
                    verdict.label().to_lowercase(),
                    reviewer.name,
                ))
                .add_file(file),
        )
        .await?;
    Ok(())
}

/// Re-applies fresh controls to every stored review card, so buttons posted
/// before a restart keep working. Vanished cards are logged and skipped.
pub async fn reattach_review_cards(ctx: &SerenityContext) -> Result<(usize, usize)> {
    let db = &ctx.data::<BotData>().db_handle;
    let reviews = db.request(ListPendingReviews).await??;

    let mut reattached = 0;
    let mut skipped = 0;
    for review in reviews {
        let edit = EditMessage::new()
            .flags(MessageFlags::IS_COMPONENTS_V2)
            .components(review_card(
                UserId::new(review.user_id),
                &review.application,
                CardState::Open,
            ));

        match ctx
            .http()
            .edit_message(
                STAFF_REVIEW_CHANNEL,
                MessageId::new(review.message_id),
                &edit,
                vec![],
            )
            .await
        {
            Ok(_) => reattached += 1,
            Err(err) => {
                warn!(
                    "Skipping review card {} during re-attach: {err:#}",
                    review.message_id
                );
                skipped += 1;
            }
        }
    }

    Ok((reattached, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_nicknames_pass_through() {
        assert_eq!(build_nickname("Sam", "they/them"), "Sam (they/them)");
    }

    #[test]
    fn nicknames_are_cut_on_char_boundaries() {
        // a multi-byte char straddling the 32-byte mark must not panic
        let name = format!("{}é", "a".repeat(31));
        let nickname = build_nickname(&name, "she/her");
        assert_eq!(nickname.chars().count(), 32);
        assert!(nickname.ends_with('é'));

        let long = build_nickname(&"字".repeat(40), "he/him");
        assert_eq!(long.chars().count(), 32);
    }
}
