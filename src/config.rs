use poise::serenity_prelude::{ChannelId, GenericChannelId, GuildId, RoleId, UserId};

// path to store the database file
pub const DB_PATH: &str = "./data/db.sqlite3";
// path to the attachment pruning schedule file
pub const PRUNE_CONFIG_PATH: &str = "./data/prune_schedule.json";
// path to the pruning watermark file
pub const PRUNE_WATERMARK_PATH: &str = "./data/last_prune.txt";
// path to the auto-responder rule file
pub const RESPONSES_PATH: &str = "./data/responses.json";

// the guild this bot manages
pub const GUILD: GuildId = GuildId::new(1088423941724082246);
// channel where application review cards are posted
pub const STAFF_REVIEW_CHANNEL: GenericChannelId = GenericChannelId::new(1088423942185472127);
// channel receiving decision audit files and ticket transcripts
pub const LOG_CHANNEL: GenericChannelId = GenericChannelId::new(1088423942185472129);
// category under which ticket channels are created
pub const TICKET_CATEGORY: ChannelId = ChannelId::new(1088423941724082249);
// role granted access to every ticket channel
pub const STAFF_ROLE: RoleId = RoleId::new(1088423941724082252);
// part of error messages
pub const BOT_MAINTAINER: UserId = UserId::new(283478391989964800);

// how often the prune scheduler checks whether a run is due
pub const PRUNE_TICK_SECS: u64 = 1800;
// pause between message deletions, stays clear of rate limits
pub const PRUNE_DELETE_DELAY_MS: u64 = 750;
// most messages inspected per prune run
pub const PRUNE_HISTORY_LIMIT: usize = 2000;
// most messages exported into a ticket transcript
pub const TRANSCRIPT_HISTORY_LIMIT: usize = 2000;
// seconds between the closing announcement and the channel deletion
pub const TICKET_CLOSE_GRACE_SECS: u64 = 5;
// draft sessions open for this long are purged by the maintenance pass
pub const DRAFT_TTL_SECS: i64 = 7 * 24 * 3600;
