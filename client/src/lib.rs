//! Client side of the directory listing protocol.
//!
//! ```no_run
//! # async fn demo() -> Result<(), dirlist_common::Error> {
//! use dirlist_client::{ClientConfig, DirectoryClient};
//!
//! let client = DirectoryClient::new(ClientConfig::default());
//! let listing = client.get_directory("temp").await?;
//! print!("{}", listing.long_listing());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use dirlist_common::{Command, Directory, Error, Message, MessageStream, DEFAULT_PORT};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host:port` of the server.
    pub server: String,
    /// Upper bound on each wait for a server line; `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            server: format!("localhost:{DEFAULT_PORT}"),
            timeout: None,
        }
    }
}

pub struct DirectoryClient {
    config: ClientConfig,
}

impl DirectoryClient {
    pub fn new(config: ClientConfig) -> Self {
        DirectoryClient { config }
    }

    /// Connect, ask the server for a listing of `path` and return it.
    ///
    /// A failure reported by the server comes back as [`Error::Remote`]
    /// carrying the server's text.
    pub async fn get_directory(&self, path: &str) -> Result<Directory, Error> {
        info!("Connecting to {}", self.config.server);
        let stream = TcpStream::connect(&self.config.server)
            .await
            .map_err(|e| Error::io(&self.config.server, e))?;
        request_directory(stream, path, self.config.timeout).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingHello,
    AwaitingResponse,
    Done,
}

/// Run the client side of the exchange over an already open stream.
///
/// The stream is closed on every exit path.
pub async fn request_directory<S>(
    stream: S,
    path: &str,
    timeout: Option<Duration>,
) -> Result<Directory, Error>
where
    S: AsyncRead + AsyncWrite,
{
    let mut stream = MessageStream::new(stream, timeout);
    let result = converse(&mut stream, path).await;
    stream.close().await;
    result
}

async fn converse<S>(stream: &mut MessageStream<S>, path: &str) -> Result<Directory, Error>
where
    S: AsyncRead + AsyncWrite,
{
    let request = Message::DirectoryRequest(path.to_string());
    let mut listing: Option<Directory> = None;
    let mut failure: Option<String> = None;
    let mut state = State::AwaitingHello;

    while state != State::Done {
        let line = stream.recv_line().await?.ok_or_else(|| {
            Error::protocol(match state {
                State::AwaitingHello => "connection closed before greeting",
                _ => "connection closed before the server said bye",
            })
        })?;
        let message = Message::decode(&line)?;

        state = match (state, message) {
            (State::AwaitingHello, Message::Command(Command::Hello)) => {
                stream.send(&request).await?;
                State::AwaitingResponse
            }
            (State::AwaitingHello, other) => {
                return Err(Error::protocol(format!(
                    "expected hello from server, got {}",
                    other.encode()
                )));
            }
            (_, Message::Command(Command::Hello)) => {
                debug!("Server greeted again, repeating request");
                stream.send(&request).await?;
                State::AwaitingResponse
            }
            (_, Message::Command(Command::Bye)) => State::Done,
            (_, Message::DirectoryListing(directory)) => {
                debug!("Received listing of {} entries", directory.entries().len());
                listing = Some(directory);
                stream.send(&Message::Command(Command::Bye)).await?;
                State::AwaitingResponse
            }
            (_, Message::Failure(message)) => {
                warn!("Server reported failure: {}", message);
                failure = Some(message);
                stream.send(&Message::Command(Command::Bye)).await?;
                State::AwaitingResponse
            }
            (_, Message::DirectoryRequest(_)) => {
                return Err(Error::protocol("server sent a directory request"));
            }
        };
    }

    match (failure, listing) {
        (Some(message), _) => Err(Error::Remote(message)),
        (None, Some(directory)) => Ok(directory),
        (None, None) => Err(Error::protocol(
            "connection closed before any listing or error arrived",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirlist_common::DirectoryEntry;
    use tokio::io::{duplex, DuplexStream};
    use tokio::task::JoinHandle;

    fn spawn_client(
        path: &str,
    ) -> (MessageStream<DuplexStream>, JoinHandle<Result<Directory, Error>>) {
        let (client, server) = duplex(64 * 1024);
        let path = path.to_string();
        let handle = tokio::spawn(async move { request_directory(client, &path, None).await });
        (MessageStream::new(server, None), handle)
    }

    async fn expect_line(server: &mut MessageStream<DuplexStream>, expected: &str) {
        assert_eq!(server.recv_line().await.unwrap().as_deref(), Some(expected));
    }

    fn sample() -> Directory {
        Directory::new("/srv/temp", vec![DirectoryEntry::file("a", 1, false)])
    }

    #[tokio::test]
    async fn returns_listing_after_bye_handshake() {
        let (mut server, handle) = spawn_client("temp");
        server.send(&Message::Command(Command::Hello)).await.unwrap();
        expect_line(&mut server, r#"{"directory":"temp"}"#).await;

        server.send(&Message::DirectoryListing(sample())).await.unwrap();
        expect_line(&mut server, r#"{"command":"bye"}"#).await;
        server.send(&Message::Command(Command::Bye)).await.unwrap();

        assert_eq!(handle.await.unwrap().unwrap(), sample());
        assert_eq!(server.recv_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn server_failure_becomes_remote_error() {
        let (mut server, handle) = spawn_client("nope");
        server.send(&Message::Command(Command::Hello)).await.unwrap();
        expect_line(&mut server, r#"{"directory":"nope"}"#).await;

        server
            .send(&Message::Failure("No such directory: /nope".into()))
            .await
            .unwrap();
        expect_line(&mut server, r#"{"command":"bye"}"#).await;
        server.send(&Message::Command(Command::Bye)).await.unwrap();

        match handle.await.unwrap() {
            Err(Error::Remote(message)) => assert_eq!(message, "No such directory: /nope"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_greeting_aborts_without_sending() {
        let (mut server, handle) = spawn_client("temp");
        server.send(&Message::DirectoryListing(sample())).await.unwrap();

        assert!(matches!(handle.await.unwrap(), Err(Error::Protocol(_))));
        assert_eq!(server.recv_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn repeated_greeting_repeats_request() {
        let (mut server, handle) = spawn_client("temp");
        server.send(&Message::Command(Command::Hello)).await.unwrap();
        expect_line(&mut server, r#"{"directory":"temp"}"#).await;
        server.send(&Message::Command(Command::Hello)).await.unwrap();
        expect_line(&mut server, r#"{"directory":"temp"}"#).await;

        server.send(&Message::DirectoryListing(sample())).await.unwrap();
        expect_line(&mut server, r#"{"command":"bye"}"#).await;
        server.send(&Message::Command(Command::Bye)).await.unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn bye_without_result_is_a_protocol_error() {
        let (mut server, handle) = spawn_client("temp");
        server.send(&Message::Command(Command::Hello)).await.unwrap();
        expect_line(&mut server, r#"{"directory":"temp"}"#).await;
        server.send(&Message::Command(Command::Bye)).await.unwrap();

        assert!(matches!(handle.await.unwrap(), Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn hang_up_mid_exchange_is_a_protocol_error() {
        let (mut server, handle) = spawn_client("temp");
        server.send(&Message::Command(Command::Hello)).await.unwrap();
        expect_line(&mut server, r#"{"directory":"temp"}"#).await;
        server.close().await;

        assert!(matches!(handle.await.unwrap(), Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn garbage_from_server_is_a_protocol_error() {
        let (mut server, handle) = spawn_client("temp");
        server.send(&Message::Command(Command::Hello)).await.unwrap();
        expect_line(&mut server, r#"{"directory":"temp"}"#).await;
        server.send_line(r#"{"status":"ok"}"#).await.unwrap();

        assert!(matches!(handle.await.unwrap(), Err(Error::Protocol(_))));
    }
}
