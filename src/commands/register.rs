use anyhow::{Context as _, Result, anyhow};
use poise::{
    CreateReply, builtins,
    serenity_prelude::{GuildId, MessageFlags, colours::css::POSITIVE},
};
use tracing::warn;

use crate::error::UserError;
use crate::shared::Context;

/// Register commands in a guild
#[poise::command(
    prefix_command,
    // NOTE: the normal permission requirements seems to always error on prefix commands
    guild_only,
)]
pub async fn register(ctx: Context<'_>) -> Result<()> {
    let target_guild = ctx
        .guild_id()
        .context(UserError(anyhow!("Command must be run inside a guild")))?;
    let author = ctx
        .author_member()
        .await
        .context("Member missing in guild command invocation")?;

    let permissions = target_guild
        .to_partial_guild(ctx.http())
        .await?
        .member_permissions(&author);
    if !permissions.manage_guild() {
        warn!(
            "{} attempted to use the register command without permission",
            author.user.name
        );
        return Ok(());
    }

    let _typing = ctx.defer_or_broadcast().await?;

    builtins::register_in_guild(
        ctx.http(),
        &ctx.framework().options().commands,
        target_guild,
    )
    .await?;

    let commands_list = ctx
        .framework()
        .options()
        .commands
        .iter()
        .filter_map(|c| {
            c.slash_action
                .is_some()
                .then_some(format!("- `/{}`", c.qualified_name))
        })
        .collect::<Vec<_>>()
        .join("\n");

    ctx.send(
        CreateReply::new()
            .reply(true)
            .flags(MessageFlags::IS_COMPONENTS_V2)
            .components(vec![crate::shared::ui::text_container(
                format!(
                    "## Registered successfully
Registered the following commands and their subcommands:\n{commands_list}
Note: All commands are visible only to users with the `MANAGE_GUILD` permission by default. \
Per-role access should be granted in the server settings under `Integrations`."
                ),
                POSITIVE,
            )]),
    )
    .await?;

    Ok(())
}

/// Unregister commands in a guild
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn unregister(
    ctx: Context<'_>,
    #[description = "Guild ID to unregister the commands"] guild: Option<GuildId>,
) -> Result<()> {
    let guild = guild.unwrap_or(
        ctx.guild_id()
            .context(UserError(anyhow!("Command must be run inside a guild")))?,
    );

    guild.set_commands(ctx.http(), &[]).await?;

    ctx.send(
        CreateReply::new()
            .flags(MessageFlags::IS_COMPONENTS_V2)
            .components(vec![crate::shared::ui::text_container(
                "## Unregistered successfully\nRemoved this bot's commands from the guild."
                    .to_string(),
                POSITIVE,
            )])
            .ephemeral(true),
    )
    .await?;

    Ok(())
}
