//! Directory listing server: accepts a TCP connection, greets the client and
//! answers listing requests until the client says goodbye.

pub mod server;
pub mod session;

pub use server::{DirectoryServer, ServerConfig};
pub use session::{handle_connection, SessionConfig};
