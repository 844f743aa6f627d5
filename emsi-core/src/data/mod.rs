//! Data acquisition and alignment

pub mod align;
pub mod provider;
pub mod snapshot;
pub mod synthetic;
pub mod worldbank;
pub mod yahoo;

pub use align::{align_series, asof_join, macro_series};
pub use provider::{DataError, DataSource, MacroObservation, MacroProvider, PriceProvider};
pub use snapshot::SnapshotStore;
pub use synthetic::SyntheticProvider;
pub use worldbank::WorldBankProvider;
pub use yahoo::YahooProvider;
