pub mod chat;
pub mod error;
pub mod events;
pub mod prompts;
pub mod schema;
pub mod session;
pub mod store;
pub mod tools;

pub use error::{StorageError, StudioError, StudioResult};
