pub mod app;
pub mod backend;
pub mod chat;
pub mod cli;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod selection;
pub mod store;
pub mod workspace;

pub use app::App;
pub use config::Config;
pub use directory::{chat_label, SessionDirectory};
pub use error::{Error, Result};
pub use store::Store;
pub use workspace::{SessionSnapshot, Workspace, WritePolicy};
