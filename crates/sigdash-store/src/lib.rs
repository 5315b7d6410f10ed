//! Client-side state for the sigdash dashboard.
//!
//! Everything the backend does not own lives here: display preferences,
//! watchlist groups and price alerts. State is a single JSON file, loaded
//! at startup and rewritten atomically after every mutation.

pub mod alerts;
pub mod error;
pub mod state;
pub mod store;

pub use alerts::{AlertMonitor, AlertTrigger};
pub use error::{PersistenceError, PersistenceResult};
pub use state::{AlertCondition, ChartPreferences, ClientState, Preferences, PriceAlert};
pub use store::StateStore;
