//! Line-delimited JSON messages exchanged over one connection.
//!
//! | direction       | line                                   |
//! |-----------------|----------------------------------------|
//! | server → client | `{"command":"hello"}`                  |
//! | client → server | `{"directory":"<path>"}`               |
//! | server → client | `{"directory":{"dir":..,"files":[..]}}`|
//! | server → client | `{"exception":"<message>"}`            |
//! | either          | `{"command":"bye"}`                    |

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::types::Directory;

const COMMAND_KEY: &str = "command";
const DIRECTORY_KEY: &str = "directory";
const EXCEPTION_KEY: &str = "exception";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Hello,
    Bye,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Hello => "hello",
            Command::Bye => "bye",
        }
    }

    /// Case-insensitive parse of a command word.
    pub fn parse(word: &str) -> Result<Command, Error> {
        if word.eq_ignore_ascii_case("hello") {
            Ok(Command::Hello)
        } else if word.eq_ignore_ascii_case("bye") {
            Ok(Command::Bye)
        } else {
            Err(Error::protocol(format!("Unknown command: {word}")))
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Command(Command),
    /// Client asking for a listing of a server-local path.
    DirectoryRequest(String),
    DirectoryListing(Directory),
    Failure(String),
}

/// Wire shape of a message; serde's external tagging yields the
/// single-key objects the protocol uses.
#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum Envelope<'a> {
    Command(&'static str),
    Directory(DirectoryBody<'a>),
    Exception(&'a str),
}

#[derive(Serialize)]
#[serde(untagged)]
enum DirectoryBody<'a> {
    Request(&'a str),
    Listing(&'a Directory),
}

impl Message {
    /// Classify one line of input.
    ///
    /// When several discriminator keys are present, `command` wins over
    /// `directory`, which wins over `exception`.
    pub fn decode(line: &str) -> Result<Message, Error> {
        let value: Value = serde_json::from_str(line.trim())
            .map_err(|e| Error::protocol(format!("malformed JSON: {e}")))?;
        let Value::Object(mut object) = value else {
            return Err(Error::protocol("message is not a JSON object"));
        };
        Message::from_object(&mut object)
    }

    fn from_object(object: &mut Map<String, Value>) -> Result<Message, Error> {
        if let Some(command) = object.remove(COMMAND_KEY) {
            let word = command
                .as_str()
                .ok_or_else(|| Error::protocol("`command` must be a string"))?;
            return Command::parse(word).map(Message::Command);
        }

        if let Some(directory) = object.remove(DIRECTORY_KEY) {
            return match directory {
                Value::String(path) => Ok(Message::DirectoryRequest(path)),
                listing @ Value::Object(_) => Directory::from_json_value(listing)
                    .map(Message::DirectoryListing)
                    .map_err(|e| Error::protocol(format!("bad directory listing: {e}"))),
                _ => Err(Error::protocol(
                    "`directory` must be a path string or a listing object",
                )),
            };
        }

        if let Some(exception) = object.remove(EXCEPTION_KEY) {
            return match exception {
                Value::String(message) => Ok(Message::Failure(message)),
                _ => Err(Error::protocol("`exception` must be a string")),
            };
        }

        Err(Error::protocol("unrecognized message shape"))
    }

    /// Encode as one line of JSON, without the trailing newline.
    pub fn encode(&self) -> String {
        let envelope = match self {
            Message::Command(command) => Envelope::Command(command.as_str()),
            Message::DirectoryRequest(path) => Envelope::Directory(DirectoryBody::Request(path)),
            Message::DirectoryListing(dir) => Envelope::Directory(DirectoryBody::Listing(dir)),
            Message::Failure(message) => Envelope::Exception(message),
        };
        serde_json::to_string(&envelope).expect("message serialization is infallible")
    }
}
