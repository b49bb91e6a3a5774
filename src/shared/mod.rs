use std::sync::atomic::AtomicBool;

use anyhow::Error;
use tokio::sync::RwLock;

use crate::db::DbHandle;
use crate::pruning::PruneStore;
use crate::responses::ResponseSet;

pub mod csv;
pub mod ui;

#[derive(Debug)]
pub struct BotData {
    pub db_handle: DbHandle,
    pub prune_store: PruneStore,
    pub responder: RwLock<ResponseSet>,
    // set by the first Ready event, so reconnects don't spawn a second
    // scheduler or re-run the startup pass
    pub started: AtomicBool,
}

pub type Context<'a> = poise::Context<'a, BotData, Error>;
