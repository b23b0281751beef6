use std::time::Duration;

use dirlist_common::{Command, Directory, Error, Message, MessageStream};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Per-connection settings.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Close the connection when the client stays silent this long.
    pub idle_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingClientMessage,
    Closed,
}

/// Drive the server side of one connection to completion.
///
/// Sends the greeting, then answers each request. A listing does not end the
/// exchange; only a `bye` from the client (or the client going away) does.
/// Nothing here is shared between connections.
pub async fn handle_connection<S>(stream: S, config: &SessionConfig) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite,
{
    let mut stream = MessageStream::new(stream, config.idle_timeout);
    let result = converse(&mut stream).await;
    stream.close().await;
    result
}

async fn converse<S>(stream: &mut MessageStream<S>) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite,
{
    stream.send(&Message::Command(Command::Hello)).await?;

    let mut state = State::AwaitingClientMessage;
    while state == State::AwaitingClientMessage {
        let Some(line) = stream.recv_line().await? else {
            info!("Client closed the connection without saying bye");
            break;
        };

        let reply = match Message::decode(&line) {
            Ok(Message::Command(Command::Bye)) => {
                state = State::Closed;
                Message::Command(Command::Bye)
            }
            Ok(Message::DirectoryRequest(path)) => list_directory(&path).await,
            Ok(unexpected) => {
                warn!("Unexpected message from client: {}", describe(&unexpected));
                Message::Failure(format!(
                    "Unexpected message: {}",
                    describe(&unexpected)
                ))
            }
            Err(err) => {
                warn!("Undecodable message from client: {}", err);
                Message::Failure(err.to_string())
            }
        };
        stream.send(&reply).await?;
    }
    debug!("Session finished");
    Ok(())
}

async fn list_directory(path: &str) -> Message {
    info!("Handling directory listing request for path: {}", path);
    match Directory::from_filesystem(path).await {
        Ok(directory) => {
            info!(
                "Directory listing successful, found {} entries in {}",
                directory.entries().len(),
                directory.path()
            );
            Message::DirectoryListing(directory)
        }
        Err(err) => {
            warn!("Error listing directory {}: {}", path, err);
            Message::Failure(err.to_string())
        }
    }
}

fn describe(message: &Message) -> String {
    match message {
        Message::Command(command) => format!("command `{command}`"),
        Message::DirectoryRequest(_) => "directory request".to_string(),
        Message::DirectoryListing(_) => "directory listing".to_string(),
        Message::Failure(_) => "exception".to_string(),
    }
}
