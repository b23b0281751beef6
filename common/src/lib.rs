//! Shared pieces of the directory listing service: the directory snapshot
//! model, its JSON and XML encodings, and the line-delimited message protocol
//! spoken between client and server.

pub mod display;
pub mod error;
pub mod fs;
pub mod json;
pub mod protocol;
pub mod transport;
pub mod types;
pub mod xml;

pub use error::Error;
pub use protocol::{Command, Message};
pub use transport::MessageStream;
pub use types::{Directory, DirectoryEntry, EntryKind};

/// Port the server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 9999;
