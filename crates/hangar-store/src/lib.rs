pub mod error;
pub mod notes;
pub mod sessions;
pub mod store;
pub mod stt;
pub mod telemetry;

pub use error::StoreError;
pub use store::Store;
