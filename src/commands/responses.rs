use anyhow::{Context as _, Result};
use poise::{
    CreateReply,
    serenity_prelude::{
        MessageFlags,
        colours::{css::POSITIVE, roles::BLUE},
    },
};

use crate::config::RESPONSES_PATH;
use crate::error::UserError;
use crate::responses::ResponseSet;
use crate::shared::Context;

#[poise::command(
    slash_command,
    subcommand_required,
    guild_only,
    subcommands("reload", "list")
)]
pub async fn responses(_ctx: Context<'_>) -> Result<()> {
    unreachable!("This shouldn't be possible to invoke");
}

/// Reload the auto-responder rules from disk
#[poise::command(slash_command)]
async fn reload(ctx: Context<'_>) -> Result<()> {
    let set = ResponseSet::load(RESPONSES_PATH)
        .context(UserError(anyhow::anyhow!("Could not load the rule file")))?;
    let count = set.len();

    *ctx.data().responder.write().await = set;

    ctx.send(
        CreateReply::new()
            .flags(MessageFlags::IS_COMPONENTS_V2)
            .components(vec![crate::shared::ui::text_container(
                format!("## Rules reloaded\n{count} response rule(s) active."),
                POSITIVE,
            )])
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// List the active auto-responder patterns
#[poise::command(slash_command)]
async fn list(ctx: Context<'_>) -> Result<()> {
    let text = {
        let data = ctx.data();
        let responder = data.responder.read().await;
        if responder.len() == 0 {
            "## Response rules\nNo rules are loaded.".to_string()
        } else {
            let patterns = responder
                .patterns()
                .map(|pattern| format!("- `{pattern}`"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("## Response rules\n{patterns}")
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
