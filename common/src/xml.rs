//! XML form of a [`Directory`]:
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <dir path="/abs/path">
//!   <file name="a">
//!     <size>3</size>
//!     <hidden>false</hidden>
//!   </file>
//!   <directory name="b">
//!     <hidden>false</hidden>
//!   </directory>
//! </dir>
//! ```
//!
//! Decoding is permissive: a child of `<dir>` that does not have the shape
//! above is skipped and counted, the rest of the document still loads.

use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::error::Error;
use crate::fs::normalize_path;
use crate::types::{Directory, DirectoryEntry, EntryKind};

const ROOT_ELEMENT: &str = "dir";
const INDENT: usize = 2;

impl Directory {
    /// Encode as an indented XML document.
    pub fn to_xml(&self) -> String {
        let mut events = vec![Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None))];

        let mut root = BytesStart::new(ROOT_ELEMENT);
        root.push_attribute(("path", self.path()));
        if self.entries().is_empty() {
            events.push(Event::Empty(root));
        } else {
            events.push(Event::Start(root));
            for entry in self.entries() {
                push_entry(&mut events, entry);
            }
            events.push(Event::End(BytesEnd::new(ROOT_ELEMENT)));
        }

        let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT);
        for event in events {
            writer
                .write_event(event)
                .expect("writing XML into memory cannot fail");
        }
        let mut xml = String::from_utf8_lossy(&writer.into_inner()).into_owned();
        xml.push('\n');
        xml
    }

    /// Decode an XML document, skipping malformed entries.
    pub fn from_xml(doc: &str) -> Result<Directory, Error> {
        Directory::from_xml_with_report(doc).map(|(directory, _)| directory)
    }

    /// Decode an XML document and report how many entries were skipped.
    ///
    /// Only the root element is strict: it must be `<dir>` with exactly one
    /// `path` attribute.
    pub fn from_xml_with_report(doc: &str) -> Result<(Directory, usize), Error> {
        let root = parse_tree(doc)?;
        if root.name != ROOT_ELEMENT {
            return Err(Error::decode(format!(
                "expected root element <{ROOT_ELEMENT}>, got <{}>",
                root.name
            )));
        }
        let path = match root.attributes.as_slice() {
            [(key, value)] if key == "path" => value,
            _ => {
                return Err(Error::decode(
                    "root element must carry exactly one attribute `path`",
                ))
            }
        };
        let path = normalize_path(Path::new(path))?
            .to_string_lossy()
            .into_owned();

        let (entries, skipped) = root.children.iter().fold(
            (Vec::new(), 0usize),
            |(mut entries, skipped), child| match decode_entry(child) {
                Ok(entry) => {
                    entries.push(entry);
                    (entries, skipped)
                }
                Err(reason) => {
                    debug!("Skipping <{}> element in {}: {}", child.name, path, reason);
                    (entries, skipped + 1)
                }
            },
        );
        if skipped > 0 {
            debug!("Loaded {} entries, skipped {}", entries.len(), skipped);
        }
        Ok((Directory::new(path, entries), skipped))
    }
}

fn push_entry(events: &mut Vec<Event<'static>>, entry: &DirectoryEntry) {
    let tag = match entry.kind {
        EntryKind::File { .. } => "file",
        EntryKind::Directory => "directory",
    };
    let mut start = BytesStart::new(tag);
    start.push_attribute(("name", entry.name.as_str()));
    events.push(Event::Start(start.into_owned()));

    if let EntryKind::File { size } = entry.kind {
        push_text_element(events, "size", size.to_string());
    }
    push_text_element(events, "hidden", entry.hidden.to_string());

    events.push(Event::End(BytesEnd::new(tag)));
}

fn push_text_element(events: &mut Vec<Event<'static>>, tag: &'static str, text: String) {
    events.push(Event::Start(BytesStart::new(tag)));
    events.push(Event::Text(BytesText::new(&text).into_owned()));
    events.push(Event::End(BytesEnd::new(tag)));
}

fn decode_entry(element: &Element) -> Result<DirectoryEntry, String> {
    let is_directory = match element.name.as_str() {
        "directory" => true,
        "file" => false,
        other => return Err(format!("expected <file> or <directory>, got <{other}>")),
    };
    let name = match element.attributes.as_slice() {
        [(key, value)] if key == "name" && !value.is_empty() => value.clone(),
        [(key, _)] if key == "name" => return Err("empty name".to_string()),
        _ => return Err("expected exactly one attribute `name`".to_string()),
    };

    let hidden = element
        .child_text("hidden")
        .ok_or("missing <hidden>")
        .and_then(|text| parse_bool(text).ok_or("<hidden> is not a boolean"))?;

    if is_directory {
        return Ok(DirectoryEntry::directory(name, hidden));
    }
    let size = element
        .child_text("size")
        .ok_or("missing <size>")?
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("bad <size>: {e}"))?;
    Ok(DirectoryEntry::file(name, size, hidden))
}

fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Minimal element tree; enough to inspect the listing's two levels.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Result<Element, Error> {
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(Error::decode)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(Error::decode)?.into_owned();
            attributes.push((key, value));
        }
        Ok(Element {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            ..Default::default()
        })
    }

    fn child_text(&self, name: &str) -> Option<&str> {
        self.children
            .iter()
            .find(|child| child.name == name)
            .map(|child| child.text.as_str())
    }
}

fn parse_tree(doc: &str) -> Result<Element, Error> {
    let mut reader = Reader::from_str(doc);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;
    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::decode(format!("malformed XML: {e}")))?;
        match event {
            Event::Start(start) => stack.push(Element::open(&start)?),
            Event::Empty(start) => attach(&mut stack, &mut root, Element::open(&start)?)?,
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::decode("unbalanced closing tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape().map_err(Error::decode)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::decode(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| Error::decode("document has no root element"))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), Error> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_some() {
        return Err(Error::decode("more than one root element"));
    } else {
        *root = Some(element);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Directory {
        Directory::new(
            "/srv/data",
            vec![
                DirectoryEntry::file("notes.txt", 42, false),
                DirectoryEntry::directory("photos", false),
                DirectoryEntry::file(".profile", 0, true),
                DirectoryEntry::directory("Tom & \"Jerry\" <1>", true),
            ],
        )
    }

    #[test]
    fn golden_layout() {
        let dir = Directory::new(
            "/x",
            vec![
                DirectoryEntry::file("a", 3, false),
                DirectoryEntry::directory("b", true),
            ],
        );
        let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<dir path=\"/x\">\n  \
  <file name=\"a\">\n    \
    <size>3</size>\n    \
    <hidden>false</hidden>\n  \
  </file>\n  \
  <directory name=\"b\">\n    \
    <hidden>true</hidden>\n  \
  </directory>\n\
</dir>\n";
        assert_eq!(dir.to_xml(), expected);
    }

    #[test]
    fn round_trip_preserves_entries() {
        let original = sample();
        let decoded = Directory::from_xml(&original.to_xml()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn empty_directory_round_trips() {
        let original = Directory::new("/empty", Vec::new());
        let (decoded, skipped) = Directory::from_xml_with_report(&original.to_xml()).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(skipped, 0);
    }

    #[test]
    fn skips_malformed_children() {
        let doc = r#"<dir path="/d">
            <file name="good"><size>1</size><hidden>false</hidden></file>
            <file name="nosize"><hidden>false</hidden></file>
            <directory name="sub"><hidden>true</hidden></directory>
            <symlink name="odd"><hidden>false</hidden></symlink>
            <file name="bad" extra="1"><size>1</size><hidden>false</hidden></file>
            <file name="nan"><size>lots</size><hidden>false</hidden></file>
            <directory name=""><hidden>false</hidden></directory>
            <directory name="nohidden"/>
        </dir>"#;
        let (dir, skipped) = Directory::from_xml_with_report(doc).unwrap();
        assert_eq!(
            dir.entries(),
            &[
                DirectoryEntry::file("good", 1, false),
                DirectoryEntry::directory("sub", true),
            ]
        );
        assert_eq!(skipped, 6);
    }

    #[test]
    fn one_bad_child_among_valid_ones() {
        let mut doc = String::from(r#"<dir path="/d">"#);
        for i in 0..5 {
            doc.push_str(&format!(
                "<file name=\"f{i}\"><size>{i}</size><hidden>false</hidden></file>"
            ));
        }
        doc.push_str("<file name=\"broken\"><hidden>maybe</hidden><size>1</size></file>");
        doc.push_str("</dir>");

        let dir = Directory::from_xml(&doc).unwrap();
        assert_eq!(dir.entries().len(), 5);
    }

    #[test]
    fn child_order_inside_entry_is_free() {
        let doc = r#"<dir path="/d"><file name="a"><hidden>TRUE</hidden><size> 8 </size></file></dir>"#;
        let dir = Directory::from_xml(doc).unwrap();
        assert_eq!(dir.entries(), &[DirectoryEntry::file("a", 8, true)]);
    }

    #[test]
    fn root_must_be_dir_with_single_path() {
        for doc in [
            r#"<listing path="/d"></listing>"#,
            r#"<dir></dir>"#,
            r#"<dir path="/d" owner="me"></dir>"#,
            r#"<dir where="/d"></dir>"#,
            r#"<dir path="/d"><file name="a">"#,
            "",
        ] {
            assert!(
                matches!(Directory::from_xml(doc), Err(Error::Decode(_))),
                "accepted {doc:?}"
            );
        }
    }

    #[test]
    fn root_path_is_normalized() {
        let dir = Directory::from_xml(r#"<dir path="/a/b/../c/."/>"#).unwrap();
        assert_eq!(dir.path(), "/a/c");
    }
}
