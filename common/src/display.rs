//! Plain-text renderings of a listing for terminals.

use crate::types::Directory;

const NAME_COLUMN: usize = 40;

impl Directory {
    /// `"<path>: a, b, c\n"`
    pub fn short_listing(&self) -> String {
        let names: Vec<&str> = self.entries().iter().map(|e| e.name.as_str()).collect();
        format!("{}: {}\n", self.path(), names.join(", "))
    }

    /// Path on the first line, then one `name  size` row per entry and a
    /// trailing blank line.
    pub fn long_listing(&self) -> String {
        let mut out = format!("{}\n", self.path());
        for entry in self.entries() {
            out.push_str(&format!(
                "{:<width$}{}\n",
                entry.name,
                entry.size(),
                width = NAME_COLUMN
            ));
        }
        out.push('\n');
        out
    }
}
