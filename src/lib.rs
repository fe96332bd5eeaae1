pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod notifier;
pub mod scanner;
pub mod types;

pub use api::{EbayClient, SearchClient};
pub use config::{Credentials, Settings, WatchList};
pub use error::{Result, WatcherError};
pub use notifier::{DiscordNotifier, Notifier};
pub use scanner::ListingScanner;
pub use types::{Alert, AlertKind, Condition, Listing, ListingType, Price, SearchCriteria};
