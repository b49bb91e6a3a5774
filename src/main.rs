use std::{
    borrow::Cow,
    env,
    str::FromStr as _,
    sync::{Arc, atomic::Ordering},
};

use anyhow::{Result, anyhow};
use either::Either;
use poise::{
    Framework, FrameworkOptions, PrefixFrameworkOptions,
    serenity_prelude::{
        ClientBuilder, Context as SerenityContext, EventHandler, FullEvent, GatewayIntents,
        Interaction, Mentionable as _, Permissions, Token, async_trait,
    },
};
use tokio::sync::{RwLock, mpsc};
use tracing::{error, info, warn};

use db::DbHandle;
use pruning::PruneStore;
use responses::ResponseSet;
use shared::BotData;

use crate::config::{PRUNE_CONFIG_PATH, PRUNE_WATERMARK_PATH, RESPONSES_PATH};

mod application;
mod commands;
mod config;
mod db;
mod error;
mod log;
mod maintenance;
mod pruning;
mod responses;
mod shared;
mod ticket;

fn get_env_var(name: &str) -> Result<String> {
    env::var(name).map_err(|err| anyhow!("Failed to load environment variable '{name}': {err:#}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = log::init_log();

    _ = dotenvy::dotenv();

    let token = Token::from_str(&get_env_var("DISCORD_TOKEN")?)?;

    let (db_tx, db_rx) = mpsc::channel(32);
    match db::db_thread::start_db_thread(db_rx).await {
        Ok(Ok(())) => {
            info!("Database thread has completed initialisation");
            Ok(())
        }
        Ok(Err(err)) => Err(anyhow!("Failed to initialise database thread: {err:#}")),
        Err(_) => Err(anyhow!("Database thread panicked during initialisation")),
    }?;

    let responder = ResponseSet::load(RESPONSES_PATH).unwrap_or_else(|err| {
        warn!("No auto-responder rules loaded: {err:#}");
        ResponseSet::default()
    });

    let mut commands = vec![
        commands::application::application(),
        commands::prune::prune(),
        commands::responses::responses(),
        commands::register::register(),
        commands::register::unregister(),
    ];
    // Set default permission to `MANAGE_GUILD`, as bots cannot access endpoint for role-based
    // permission override (manual configuration intended)
    for cmd in &mut commands {
        cmd.default_member_permissions = Permissions::MANAGE_GUILD;
    }

    // `GUILD_MESSAGES`: for the `register` prefix command
    // `MESSAGE_CONTENT`: same reason, as well as for the auto-responder
    let intents = GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

    let prefix_options = PrefixFrameworkOptions {
        dynamic_prefix: Some(|ctx| {
            Box::pin(async move {
                Ok(Some(Cow::Owned(
                    ctx.framework.bot_id().mention().to_string(),
                )))
            })
        }),
        ..Default::default()
    };

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands,
            prefix_options,
            on_error: error::error_handler,
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "[>] `{}` invoked by {}",
                        ctx.invocation_string(),
                        ctx.author().name,
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "[<] {}'s `{}` invocation completed successfully",
                        ctx.author().name,
                        ctx.invocation_string(),
                    );
                })
            },
            ..Default::default()
        })
        .initialize_owners(false)
        .build();

    let mut client = ClientBuilder::new(token, intents)
        .framework(Box::new(framework))
        .event_handler(Arc::new(Handler))
        .data(Arc::new(BotData {
            db_handle: DbHandle::new(db_tx),
            prune_store: PruneStore::new(PRUNE_CONFIG_PATH, PRUNE_WATERMARK_PATH),
            responder: RwLock::new(responder),
            started: std::sync::atomic::AtomicBool::new(false),
        }))
        .await?;

    client.start().await?;

    Ok(())
}

struct Handler;

#[async_trait]
impl EventHandler for Handler {
    async fn dispatch(&self, ctx: &SerenityContext, event: &FullEvent) {
        if let Err(err) = match event {
            FullEvent::InteractionCreate { interaction, .. } => match interaction {
                Interaction::Component(interaction) => {
                    let mut action = interaction.data.custom_id.split(':');

                    match action.next().unwrap_or_default() {
                        "app" => {
                            application::interaction::handle_application(
                                ctx,
                                Either::Left(interaction),
                                action,
                            )
                            .await
                        }
                        "review" => {
                            application::interaction::handle_review(
                                ctx,
                                Either::Left(interaction),
                                action,
                            )
                            .await
                        }
                        "ticket" => {
                            ticket::interaction::handle_interaction(
                                ctx,
                                Either::Left(interaction),
                                action,
                            )
                            .await
                        }
                        _ => Ok(()),
                    }
                }
                Interaction::Modal(interaction) => {
                    let mut action = interaction.data.custom_id.split(':');

                    match action.next().unwrap_or_default() {
                        "app" => {
                            application::interaction::handle_application(
                                ctx,
                                Either::Right(interaction),
                                action,
                            )
                            .await
                        }
                        "review" => {
                            application::interaction::handle_review(
                                ctx,
                                Either::Right(interaction),
                                action,
                            )
                            .await
                        }
                        "ticket" => {
                            ticket::interaction::handle_interaction(
                                ctx,
                                Either::Right(interaction),
                                action,
                            )
                            .await
                        }
                        _ => Ok(()),
                    }
                }
                _ => Ok(()),
            },
            FullEvent::Message { new_message } => {
                responses::handle_message(ctx, new_message).await
            }
            FullEvent::Ready { .. } => {
                // reconnects fire Ready again, only the first one counts
                if !ctx.data::<BotData>().started.swap(true, Ordering::SeqCst) {
                    let startup_ctx = ctx.clone();
                    tokio::spawn(async move {
                        if let Err(err) = maintenance::run_startup_pass(&startup_ctx).await {
                            error!("Startup pass failed: {err:#}");
                        }
                    });
                    tokio::spawn(pruning::scheduler::run(ctx.clone()));
                }
                Ok(())
            }
            _ => Ok(()),
        } {
            error::event_handler_error(err, ctx, event).await;
        }
    }
}
