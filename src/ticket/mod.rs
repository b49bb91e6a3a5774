use anyhow::{Context as _, Result};
use poise::serenity_prelude::{
    ButtonStyle, CacheHttp as _, ChannelType, Context as SerenityContext, CreateActionRow,
    CreateButton, CreateChannel, CreateComponent, CreateContainer, CreateContainerComponent,
    CreateMessage,
    CreateTextDisplay, EditMessage, GenericChannelId, GuildChannel, Mentionable as _,
    MessageFlags, MessageId, PermissionOverwrite, PermissionOverwriteType, Permissions, RoleId,
    User, UserId, colours::css::WARNING, colours::roles::BLUE,
};
use tracing::{info, warn};

use crate::application::types::PendingReview;
use crate::config::{GUILD, STAFF_ROLE, TICKET_CATEGORY};
use crate::error::WorkflowError;
use crate::shared::BotData;
use crate::ticket::db::{InsertTicket, ListTickets, TicketRecord};

pub mod db;
pub mod interaction;
pub mod transcript;

/// Renders the pinned close control. Deliberately free of per-ticket state,
/// so a restart can rebuild it from the database alone.
fn close_control() -> Vec<CreateComponent<'static>> {
    vec![CreateComponent::Container(
        CreateContainer::new(vec![
            CreateContainerComponent::TextDisplay(CreateTextDisplay::new(
                "## Support ticket\nStaff can close this channel once the discussion is resolved. \
                 A transcript is saved when the ticket is closed.",
            )),
            CreateContainerComponent::ActionRow(CreateActionRow::Buttons(
                vec![
                    CreateButton::new("ticket:close")
                        .label("Close Ticket")
                        .style(ButtonStyle::Danger),
                ]
                .into(),
            )),
        ])
        .accent_color(WARNING),
    )]
}

fn channel_name(applicant_name: &str) -> String {
    let mut name = String::from("ticket-");
    let mut last_dash = false;
    for ch in applicant_name.chars() {
        if name.len() >= 90 {
            break;
        }
        if ch.is_ascii_alphanumeric() {
            name.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            name.push('-');
            last_dash = true;
        }
    }
    name.trim_end_matches('-').to_string()
}

/// Creates a private discussion channel for a pending review. Visible to
/// staff, the applicant, the requesting reviewer and the bot itself.
pub async fn open_ticket(
    ctx: &SerenityContext,
    requester: &User,
    review: &PendingReview,
) -> Result<GuildChannel> {
    let category_exists = ctx
        .http()
        .get_channels(GUILD)
        .await?
        .iter()
        .any(|channel| channel.id == TICKET_CATEGORY && channel.base.kind == ChannelType::Category);
    if !category_exists {
        return Err(WorkflowError::MissingCategory.into_user_error());
    }

    let applicant = UserId::new(review.user_id);
    let member_allow =
        Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES | Permissions::READ_MESSAGE_HISTORY;
    let mut overwrites = vec![
        PermissionOverwrite {
            allow: Permissions::empty(),
            deny: Permissions::VIEW_CHANNEL,
            // the @everyone role shares the guild's ID
            kind: PermissionOverwriteType::Role(RoleId::new(GUILD.get())),
        },
        PermissionOverwrite {
            allow: member_allow,
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Role(STAFF_ROLE),
        },
        PermissionOverwrite {
            allow: member_allow,
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Member(applicant),
        },
        PermissionOverwrite {
            allow: member_allow,
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Member(ctx.cache.current_user().id),
        },
    ];
    if requester.id != applicant {
        overwrites.push(PermissionOverwrite {
            allow: member_allow,
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Member(requester.id),
        });
    }

    let channel = GUILD
        .create_channel(
            ctx.http(),
            CreateChannel::new(channel_name(&review.application.name))
                .kind(ChannelType::Text)
                .category(TICKET_CATEGORY)
                .permissions(overwrites),
        )
        .await
        .context("Failed to create ticket channel")?;

    let summary = format!(
        "## Application discussion
Opened by {} about the application of {}.
**Name**: {}
**Pronouns**: {}
**Branch**: {}
**Service status**: {}
**How they found us**: {}",
        requester.id.mention(),
        applicant.mention(),
        review.application.name,
        review.application.pronouns,
        review.application.branch,
        review.application.status,
        review.application.referral,
    );
    channel
        .id
        .widen()
        .send_message(
            ctx.http(),
            CreateMessage::new()
                .flags(MessageFlags::IS_COMPONENTS_V2)
                .components(vec![crate::shared::ui::text_container(summary, BLUE)]),
        )
        .await?;

    let control = channel
        .id
        .widen()
        .send_message(
            ctx.http(),
            CreateMessage::new()
                .flags(MessageFlags::IS_COMPONENTS_V2)
                .components(close_control()),
        )
        .await?;

    let db = &ctx.data::<BotData>().db_handle;
    db.request(InsertTicket {
        record: TicketRecord {
            message_id: control.id.get(),
            channel_id: channel.id.get(),
        },
    })
    .await??;

    info!(
        "{} opened ticket channel {} for user {applicant}",
        requester.name, channel.id,
    );
    Ok(channel)
}

/// Rebuilds the close control of every stored ticket. Tickets whose channel
/// or control message is gone are logged and skipped.
pub async fn reattach_ticket_controls(ctx: &SerenityContext) -> Result<(usize, usize)> {
    let db = &ctx.data::<BotData>().db_handle;
    let tickets = db.request(ListTickets).await??;

    let mut reattached = 0;
    let mut skipped = 0;
    for ticket in tickets {
        let edit = EditMessage::new()
            .flags(MessageFlags::IS_COMPONENTS_V2)
            .components(close_control());

        match ctx
            .http()
            .edit_message(
                GenericChannelId::new(ticket.channel_id),
                MessageId::new(ticket.message_id),
                &edit,
                vec![],
            )
            .await
        {
            Ok(_) => reattached += 1,
            Err(err) => {
                warn!(
                    "Skipping ticket control {} during re-attach: {err:#}",
                    ticket.message_id
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
    fn channel_names_are_sanitised() {
        assert_eq!(channel_name("Sam Smith"), "ticket-sam-smith");
        assert_eq!(channel_name("A!!B"), "ticket-a-b");
        assert_eq!(channel_name("---"), "ticket");
    }

    #[test]
    fn channel_names_are_capped() {
        let long = "x".repeat(200);
        assert!(channel_name(&long).len() <= 90);
    }
}
