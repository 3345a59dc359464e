//! Board, platform, library and product catalog.

pub mod products;
pub mod registry;

pub use products::ProductDetails;
pub use registry::{BoardRegistry, DeviceEntry, LibraryEntry, PlatformEntry};
