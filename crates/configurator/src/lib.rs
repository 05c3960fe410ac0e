// Library crate: the configuration engines, the export/publish pipeline and
// the AR link builder. The HTTP surface lives in the `server` crate.

pub mod ar_links;
pub mod assets;
pub mod color;
pub mod command;
pub mod config;
pub mod error;
pub mod export;
pub mod fixtures;
pub mod height;
pub mod parts;
pub mod scene;
pub mod session;
pub mod state;
pub mod storage;

pub use error::{ColorError, ExportError, LoadError, PartError, PublishError, StoreError};
pub use session::Session;
pub use state::ConfigurationState;
