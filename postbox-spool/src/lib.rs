pub mod error;
pub mod message;
pub mod store;
pub mod watch;

pub use error::{ComposeError, Result, SpoolError, ValidationError, WatchError};
pub use message::{Email, EmailBuilder, MessageId};
pub use store::{Disposition, MessageStore};
pub use watch::{DirectoryWatcher, WatchHandler};
