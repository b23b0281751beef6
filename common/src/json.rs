//! JSON form of a [`Directory`]:
//!
//! ```text
//! {"dir":"/abs/path","files":[{"name":"a","hidden":false,"type":"file","size":3},
//!                             {"name":"b","hidden":false,"type":"directory"}]}
//! ```

use serde_json::Value;

use crate::error::Error;
use crate::types::Directory;

impl Directory {
    /// Encode as a single-line JSON document.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("directory serialization is infallible")
    }

    /// Decode a JSON document. Every entry must be well formed; a single bad
    /// entry fails the whole document.
    pub fn from_json(doc: &str) -> Result<Directory, Error> {
        serde_json::from_str(doc).map_err(Error::decode)
    }

    pub fn from_json_value(value: Value) -> Result<Directory, Error> {
        serde_json::from_value(value).map_err(Error::decode)
    }
}
