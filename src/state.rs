use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;

use crate::attendance::EngineSettings;
use crate::attendance::snapshot::SnapshotBoard;
use crate::calendar::CalendarBoard;
use crate::config::Config;
use crate::store::change_feed::{ChangeFeed, Subscription};
use crate::store::directory::MySqlDirectory;
use crate::store::punches::MySqlPunchStore;
use crate::utils::mailer::{MailError, Mailer};

/// Everything the handlers share, built once at startup.
pub struct AppState {
    pub settings: EngineSettings,
    pub punches: MySqlPunchStore,
    pub directory: MySqlDirectory,
    pub feed: ChangeFeed,
    /// Cached monthly punch snapshots, refreshed when the punch log changes
    pub board: Arc<SnapshotBoard<MySqlPunchStore>>,
    pub calendar: CalendarBoard,
    pub mailer: Mailer,
    // dropped together with the state, which detaches the board from the feed
    _punch_subscription: Subscription,
}

impl AppState {
    pub fn new(config: &Config, pool: MySqlPool) -> Result<Self, MailError> {
        let settings = EngineSettings::from_config(config);
        let punches = MySqlPunchStore::new(pool.clone());
        let feed = ChangeFeed::new();

        let board = Arc::new(
            SnapshotBoard::new(punches.clone(), settings.offset)
                .with_ttl(Duration::from_secs(config.snapshot_ttl_secs)),
        );
        let punch_subscription = board.follow(&feed);

        Ok(Self {
            settings,
            punches,
            directory: MySqlDirectory::new(pool),
            feed,
            board,
            calendar: CalendarBoard::new(),
            mailer: Mailer::new(config)?,
            _punch_subscription: punch_subscription,
        })
    }
}
