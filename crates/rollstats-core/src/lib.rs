//! Roll log storage, statistics and chat relay for rollstats.

pub mod distribution;
mod error;
pub mod intake;
pub mod message;
pub mod relay;
mod sheets;
mod stats;
mod store;
mod streak;

pub use error::RollStatsError;
pub use intake::{decode_fields, DecodedRoll};
pub use message::{parse_embed, MessageFormat, RenderedMessage, RollOutcome};
pub use relay::{LogSink, RelayHandle, RelayItem, RelaySettings, RelaySink, RelayTarget, RelayWorker};
pub use sheets::{sanitize, SheetStore};
pub use store::RollStore;
pub use streak::{longest_streaks, StreakScan};

/// Result type for rollstats operations.
pub type Result<T> = std::result::Result<T, RollStatsError>;
