pub mod api;
pub mod config;
pub mod error;
pub mod mail;
pub mod models;
pub mod state;

pub use config::{AppSettings, ConfigError};
pub use error::{AppError, MailError, Result};
pub use mail::{Connection, DispatchBus, MailConfig, Mailer, Message, MessageFields, Recorder};
pub use state::AppState;
