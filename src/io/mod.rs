//! Reader contracts, locators, configuration and observation storage

pub mod cache;
pub mod config;
pub mod reader;
pub mod store;
pub mod swath_locator;
pub mod window;

pub use cache::ArrayCache;
pub use config::{SensorConfig, UseCaseConfig};
pub use reader::{OpenReader, PixelLocator, Reader, ReaderFactory, TimeLocator};
pub use store::{MemoryStore, ObservationStore, QueryParameter};
pub use swath_locator::{ScanlineTimeLocator, SwathPixelLocator};
pub use window::{
    channel_index, must_scale, read_channel_window, read_window, strip_channel_suffix, FillValue,
    RawArray,
};
