pub mod core;
pub mod csv_source;
pub mod market_data;
pub mod mock;
pub mod observability;
pub mod persistence;
pub mod yahoo;

pub use csv_source::CsvPriceService;
pub use market_data::FallbackPriceService;
pub use persistence::FileArtifactStore;
pub use yahoo::YahooPriceService;
