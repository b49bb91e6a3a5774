use anyhow::{Context as _, Result};
use chrono::Utc;
use poise::serenity_prelude::{
    ButtonStyle, CacheHttp as _, Context as SerenityContext, CreateActionRow, CreateButton,
    CreateComponent, CreateContainer, CreateContainerComponent, CreateMessage, CreateSelectMenu,
    CreateSelectMenuKind,
    CreateSelectMenuOption, CreateTextDisplay, MessageFlags, User, colours::roles::BLUE,
};
use tracing::warn;

use crate::application::db::read::GetApplicantStatus;
use crate::application::db::write::InsertDraft;
use crate::application::types::{ApplicationFields, Branch, ServiceStatus, TextField};
use crate::error::{UserError, WorkflowError};
use crate::shared::BotData;

/// Whether the prompt still accepts input.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PromptState {
    Editing,
    Submitted,
}

/// Renders the DM prompt an applicant fills their draft through.
pub fn prompt_components(
    fields: &ApplicationFields,
    state: PromptState,
) -> Vec<CreateComponent<'static>> {
    let disabled = state == PromptState::Submitted;

    let mut progress = String::from(
        "# Membership Application
Fill in every field below, then press **Submit**. Your answers are saved as you go.\n",
    );
    for field in [TextField::Name, TextField::Pronouns, TextField::Referral] {
        match fields.text(field) {
            Some(value) => progress.push_str(&format!("\n✅ **{}**: {value}", field.label())),
            None => progress.push_str(&format!("\n⬜ **{}**", field.label())),
        }
    }
    match fields.branch {
        Some(branch) => progress.push_str(&format!("\n✅ **Branch**: {branch}")),
        None => progress.push_str("\n⬜ **Branch**"),
    }
    match fields.status {
        Some(status) => progress.push_str(&format!("\n✅ **Service status**: {status}")),
        None => progress.push_str("\n⬜ **Service status**"),
    }
    if state == PromptState::Submitted {
        progress.push_str("\n\n**Submitted!** Staff will review your application shortly.");
    }

    let text = CreateContainerComponent::TextDisplay(CreateTextDisplay::new(progress));

    let field_buttons = CreateContainerComponent::ActionRow(CreateActionRow::Buttons(
        [TextField::Name, TextField::Pronouns, TextField::Referral]
            .into_iter()
            .map(|field| {
                CreateButton::new(format!("app:field:{}", field.key()))
                    .label(field.label())
                    .style(ButtonStyle::Secondary)
                    .disabled(disabled)
            })
            .collect::<Vec<_>>()
            .into(),
    ));

    let branch_options: Vec<CreateSelectMenuOption> = Branch::ALL
        .into_iter()
        .map(|branch| {
            CreateSelectMenuOption::new(branch.label(), branch.value())
                .default_selection(fields.branch == Some(branch))
        })
        .collect();
    let branch_select = CreateContainerComponent::ActionRow(CreateActionRow::SelectMenu(
        CreateSelectMenu::new(
            "app:branch",
            CreateSelectMenuKind::String {
                options: branch_options.into(),
            },
        )
        .placeholder("Select your branch")
        .disabled(disabled),
    ));

    let status_options: Vec<CreateSelectMenuOption> = ServiceStatus::ALL
        .into_iter()
        .map(|status| {
            CreateSelectMenuOption::new(status.label(), status.value())
                .default_selection(fields.status == Some(status))
        })
        .collect();
    let status_select = CreateContainerComponent::ActionRow(CreateActionRow::SelectMenu(
        CreateSelectMenu::new(
            "app:status",
            CreateSelectMenuKind::String {
                options: status_options.into(),
            },
        )
        .placeholder("Select your service status")
        .disabled(disabled),
    ));

    let submit_row = CreateContainerComponent::ActionRow(CreateActionRow::Buttons(
        vec![
            CreateButton::new("app:submit")
                .label("Submit")
                .style(ButtonStyle::Success)
                .disabled(disabled),
        ]
        .into(),
    ));

    let container = CreateComponent::Container(
        CreateContainer::new(vec![
            text,
            field_buttons,
            branch_select,
            status_select,
            submit_row,
        ])
        .accent_color(BLUE),
    );

    vec![container]
}

/// Opens a draft session: duplicate gate, DM prompt, session row. No row is
/// created when the DM cannot be delivered.
pub async fn open_session(ctx: &SerenityContext, user: &User) -> Result<()> {
    let db = &ctx.data::<BotData>().db_handle;

    if let Some(status) = db.request(GetApplicantStatus { user_id: user.id.get() }).await??
        && status.blocks_new_application()
    {
        return Err(WorkflowError::AlreadyUnderReview.into_user_error());
    }

    let message = CreateMessage::new()
        .flags(MessageFlags::IS_COMPONENTS_V2)
        .components(prompt_components(
            &ApplicationFields::default(),
            PromptState::Editing,
        ));

    let prompt = match user.id.dm(ctx.http(), message).await {
        Ok(prompt) => prompt,
        Err(err) => {
            warn!("Failed to DM application prompt to {}: {err:#}", user.name);
            return Err(UserError(WorkflowError::DeliveryBlocked.into()).into());
        }
    };

    db.request(InsertDraft {
        message_id: prompt.id.get(),
        user_id: user.id.get(),
        opened_at: Utc::now().timestamp(),
    })
    .await?
    .context("Failed to store draft session")?;

    Ok(())
}
