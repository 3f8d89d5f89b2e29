use crate::error::Error;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::trace;

const DEFAULT_INDENT: &str = "  ";

/// Layout details of the file on disk, reproduced on save.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DocStyle {
    indent: String,
    trailing_newline: bool,
}

impl DocStyle {
    fn detect(text: &str) -> Self {
        // Indentation of the first indented line after the opening brace.
        let indent = text
            .lines()
            .skip(1)
            .map(|line| {
                line.chars()
                    .take_while(|c| *c == ' ' || *c == '\t')
                    .collect::<String>()
            })
            .find(|ws| !ws.is_empty())
            .unwrap_or_else(|| DEFAULT_INDENT.to_string());

        Self {
            indent,
            trailing_newline: text.ends_with('\n'),
        }
    }
}

/// Outcome of a list-field write.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListWrite {
    pub added: Vec<String>,
    /// Items that were already present and left alone.
    pub skipped: Vec<String>,
}

/// A per-scan JSON sidecar, held in memory as an order-preserving object.
///
/// Edits go through the typed field accessors. `save` splices only the
/// edited members into the text read from disk, so every other byte of the
/// file stays as it was, and atomically replaces the file.
#[derive(Debug, Clone)]
pub struct MetadataDoc {
    path: PathBuf,
    source: String,
    fields: Map<String, Value>,
    style: DocStyle,
    /// Names of edited fields, in edit order.
    edits: Vec<String>,
}

impl MetadataDoc {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Self::parse(path, &text)
    }

    pub fn parse(path: &Path, text: &str) -> Result<Self, Error> {
        let invalid = |reason: String| Error::InvalidDocument {
            path: path.to_path_buf(),
            reason,
        };
        let value: Value = serde_json::from_str(text).map_err(|e| invalid(e.to_string()))?;
        match value {
            Value::Object(fields) => Ok(Self {
                path: path.to_path_buf(),
                source: text.to_string(),
                fields,
                style: DocStyle::detect(text),
                edits: Vec::new(),
            }),
            other => Err(invalid(format!(
                "expected a field object, found {}",
                kind_name(&other)
            ))),
        }
    }

    /// Whether any write changed the document since it was loaded.
    pub fn is_dirty(&self) -> bool {
        !self.edits.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Field value as a flat string. Lists are their items joined by `,`.
    pub fn read_field(&self, name: &str) -> Option<String> {
        self.fields.get(name).map(flatten_value)
    }

    /// Returns whether the document changed.
    pub fn write_scalar_field(&mut self, name: &str, value: Value) -> bool {
        if self.fields.get(name) == Some(&value) {
            return false;
        }
        // Existing keys keep their position; new ones go last.
        self.fields.insert(name.to_string(), value);
        self.mark_edited(name);
        true
    }

    pub fn write_list_field(
        &mut self,
        name: &str,
        items: &[String],
        preserve_existing: bool,
    ) -> ListWrite {
        let mut result = ListWrite::default();

        let mut list: Vec<Value> = match (preserve_existing, self.fields.get(name)) {
            (true, Some(Value::Array(existing))) => existing.clone(),
            (true, Some(Value::Null)) | (_, None) | (false, _) => Vec::new(),
            (true, Some(scalar)) => vec![scalar.clone()],
        };

        for item in items {
            let present = list.iter().any(|v| flatten_value(v) == *item);
            if present {
                result.skipped.push(item.clone());
            } else {
                list.push(Value::String(item.clone()));
                result.added.push(item.clone());
            }
        }

        let new_value = Value::Array(list);
        if self.fields.get(name) != Some(&new_value) {
            self.fields.insert(name.to_string(), new_value);
            self.mark_edited(name);
        }

        result
    }

    fn mark_edited(&mut self, name: &str) {
        if !self.edits.iter().any(|e| e == name) {
            self.edits.push(name.to_string());
        }
    }

    /// The document text: the original with edited members spliced in.
    pub fn to_text(&self) -> Result<String, Error> {
        if self.edits.is_empty() {
            return Ok(self.source.clone());
        }
        match ObjectLayout::scan(&self.source) {
            Some(layout) => self.splice(&layout),
            None => self.serialize_all(),
        }
    }

    fn splice(&self, layout: &ObjectLayout) -> Result<String, Error> {
        // A one-line object gets one-line additions.
        let inline = !layout.members.is_empty()
            && !self.source[layout.open..layout.close].contains('\n');

        let mut patches: Vec<(Range<usize>, String)> = Vec::new();
        let mut appended = Vec::new();
        for name in &self.edits {
            let Some(value) = self.fields.get(name) else {
                continue;
            };
            let text = self.render(value, inline)?;
            // serde_json keeps the last of repeated keys; so do we.
            match layout.members.iter().rev().find(|m| m.key == *name) {
                Some(member) => patches.push((member.value.clone(), text)),
                None => {
                    let key = self.render(&Value::from(name.as_str()), true)?;
                    appended.push(format!("{}: {}", key, text));
                }
            }
        }

        if !appended.is_empty() {
            let indent = &self.style.indent;
            match layout.members.last() {
                Some(last) if inline => {
                    let text = appended.iter().map(|m| format!(", {}", m)).collect::<String>();
                    patches.push((last.value.end..last.value.end, text));
                }
                Some(last) => {
                    let text = appended
                        .iter()
                        .map(|m| format!(",\n{}{}", indent, m))
                        .collect::<String>();
                    patches.push((last.value.end..last.value.end, text));
                }
                None => {
                    let body = appended
                        .iter()
                        .map(|m| format!("{}{}", indent, m))
                        .collect::<Vec<_>>()
                        .join(",\n");
                    patches.push((layout.open + 1..layout.close, format!("\n{}\n", body)));
                }
            }
        }

        patches.sort_by(|a, b| b.0.start.cmp(&a.0.start));
        let mut text = self.source.clone();
        for (range, replacement) in patches {
            text.replace_range(range, &replacement);
        }
        Ok(text)
    }

    /// A member value as it sits one level inside the top-level object.
    fn render(&self, value: &Value, inline: bool) -> Result<String, Error> {
        if inline {
            return serde_json::to_string(value).map_err(|e| self.invalid(e.to_string()));
        }
        let text = self.pretty(value)?;
        Ok(text.replace('\n', &format!("\n{}", self.style.indent)))
    }

    fn pretty<T: Serialize>(&self, value: &T) -> Result<String, Error> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(self.style.indent.as_bytes());
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value
            .serialize(&mut ser)
            .map_err(|e| self.invalid(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| self.invalid(e.to_string()))
    }

    /// Whole-document rendering, for text the member scanner cannot follow.
    fn serialize_all(&self) -> Result<String, Error> {
        let mut text = self.pretty(&self.fields)?;
        if self.style.trailing_newline {
            text.push('\n');
        }
        Ok(text)
    }

    fn invalid(&self, reason: String) -> Error {
        Error::InvalidDocument {
            path: self.path.clone(),
            reason,
        }
    }

    /// Write to a scratch file next to the original, then rename over it.
    pub fn save(&self) -> Result<(), Error> {
        let text = self.to_text()?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.flush()?;
        if let Ok(metadata) = fs::metadata(&self.path) {
            fs::set_permissions(tmp.path(), metadata.permissions())?;
        }
        tmp.persist(&self.path)?;
        trace!("Saved {}", self.path.display());
        Ok(())
    }
}

/// Byte spans of the top-level members of a JSON object text.
#[derive(Debug)]
struct ObjectLayout {
    open: usize,
    close: usize,
    members: Vec<Member>,
}

#[derive(Debug)]
struct Member {
    key: String,
    value: Range<usize>,
}

impl ObjectLayout {
    /// `None` if `text` is not a single object. Only called on text that
    /// serde_json has already accepted.
    fn scan(text: &str) -> Option<Self> {
        let mut cursor = Cursor {
            bytes: text.as_bytes(),
            pos: 0,
        };
        cursor.skip_whitespace();
        let open = cursor.pos;
        cursor.expect(b'{')?;
        let mut members = Vec::new();

        cursor.skip_whitespace();
        if cursor.peek() == Some(b'}') {
            return Some(Self {
                open,
                close: cursor.pos,
                members,
            });
        }

        loop {
            cursor.skip_whitespace();
            let key_start = cursor.pos;
            cursor.skip_string()?;
            let key: String = serde_json::from_str(&text[key_start..cursor.pos]).ok()?;
            cursor.skip_whitespace();
            cursor.expect(b':')?;
            cursor.skip_whitespace();
            let value_start = cursor.pos;
            cursor.skip_value()?;
            members.push(Member {
                key,
                value: value_start..cursor.pos,
            });
            cursor.skip_whitespace();
            match cursor.peek()? {
                b',' => cursor.pos += 1,
                b'}' => {
                    return Some(Self {
                        open,
                        close: cursor.pos,
                        members,
                    })
                }
                _ => return None,
            }
        }
    }
}

struct Cursor<'t> {
    bytes: &'t [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Option<()> {
        (self.peek()? == byte).then(|| self.pos += 1)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn skip_string(&mut self) -> Option<()> {
        self.expect(b'"')?;
        loop {
            match self.peek()? {
                b'\\' => self.pos += 2,
                b'"' => {
                    self.pos += 1;
                    return Some(());
                }
                _ => self.pos += 1,
            }
        }
    }

    fn skip_value(&mut self) -> Option<()> {
        match self.peek()? {
            b'"' => self.skip_string(),
            b'{' | b'[' => {
                let mut depth = 0usize;
                loop {
                    match self.peek()? {
                        b'"' => {
                            self.skip_string()?;
                            continue;
                        }
                        b'{' | b'[' => depth += 1,
                        b'}' | b']' => {
                            depth -= 1;
                            if depth == 0 {
                                self.pos += 1;
                                return Some(());
                            }
                        }
                        _ => {}
                    }
                    self.pos += 1;
                }
            }
            _ => {
                while let Some(b) = self.peek() {
                    if matches!(b, b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r') {
                        break;
                    }
                    self.pos += 1;
                }
                Some(())
            }
        }
    }
}

fn flatten_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
