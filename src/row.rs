//! # SmartREST Row Codec
//!
//! A SmartREST row is a comma-delimited list of fields whose first field is the
//! numeric template identifier. Fields holding the delimiter or the quote
//! character are wrapped in quotes with internal quotes doubled, exactly like
//! CSV. Fields may never contain a line break: several rows can be batched into
//! one MQTT message by separating them with `\n`.

use core::fmt::{self, Write};
use core::iter::Enumerate;
use core::str::Split;

use heapless::{String, Vec};

use crate::config::{MAX_FIELDS, MAX_ROW_LEN, MAX_TEXT_LEN};
use crate::error::RowError;

/// Field separator within a row.
pub const DELIMITER: char = ',';

/// Quote character for fields containing the delimiter or a quote.
pub const QUOTE: char = '"';

/// Separator between rows batched into one payload.
pub const ROW_SEPARATOR: char = '\n';

/// A decoded row: the unescaped text of every field, stored back to back.
///
/// Field `i` spans `ends[i - 1]..ends[i]` of `text`, so the whole row lives in
/// two fixed-size buffers.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TemplateRow {
    text: String<MAX_ROW_LEN>,
    ends: Vec<u16, MAX_FIELDS>,
}

impl TemplateRow {
    /// Builds a row from already-unescaped fields.
    pub fn from_fields<'f, I>(fields: I) -> Result<Self, RowError>
    where
        I: IntoIterator<Item = &'f str>,
    {
        let mut row = Self::default();
        for field in fields {
            if field.contains(['\r', '\n']) {
                return Err(RowError::LineBreak);
            }
            row.append(field)?;
            row.close_field()?;
        }
        if row.is_empty() {
            return Err(RowError::Empty);
        }
        Ok(row)
    }

    /// The template identifier, i.e. the first field.
    pub fn template(&self) -> &str {
        self.field(0).unwrap_or("")
    }

    /// Returns field `index`, if present.
    pub fn field(&self, index: usize) -> Option<&str> {
        let end = *self.ends.get(index)? as usize;
        let start = match index {
            0 => 0,
            _ => self.ends[index - 1] as usize,
        };
        self.text.get(start..end)
    }

    /// Number of fields, identifier included.
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Iterates over the unescaped fields in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> + '_ {
        (0..self.len()).filter_map(move |i| self.field(i))
    }

    /// Encodes the row back into its escaped wire form.
    pub fn encode<const N: usize>(&self) -> Result<String<N>, RowError> {
        encode(self.fields())
    }

    fn append(&mut self, s: &str) -> Result<(), RowError> {
        self.text.push_str(s).map_err(|_| RowError::RowTooLong)
    }

    fn close_field(&mut self) -> Result<(), RowError> {
        self.ends
            .push(self.text.len() as u16)
            .map_err(|_| RowError::TooManyFields)
    }
}

impl fmt::Debug for TemplateRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.fields()).finish()
    }
}

/// Decodes a single row.
///
/// A trailing line terminator is ignored. Quoted fields may contain the
/// delimiter and doubled quotes; anything else that looks like quoting is an
/// error rather than being guessed at.
pub fn decode(raw: &str) -> Result<TemplateRow, RowError> {
    let line = raw.strip_suffix(ROW_SEPARATOR).unwrap_or(raw);
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() {
        return Err(RowError::Empty);
    }
    if line.contains(['\r', '\n']) {
        return Err(RowError::LineBreak);
    }

    let mut row = TemplateRow::default();
    let mut cursor = 0;
    loop {
        let rest = &line[cursor..];
        if let Some(quoted) = rest.strip_prefix(QUOTE) {
            cursor = read_quoted_field(&mut row, line, cursor + 1, quoted)?;
            row.close_field()?;
            match line[cursor..].chars().next() {
                None => break,
                Some(DELIMITER) => cursor += 1,
                Some(_) => return Err(RowError::TrailingText),
            }
        } else {
            let end = rest.find(DELIMITER).map_or(line.len(), |offset| cursor + offset);
            let field = &line[cursor..end];
            if field.contains(QUOTE) {
                return Err(RowError::BareQuote);
            }
            row.append(field)?;
            row.close_field()?;
            if end == line.len() {
                break;
            }
            cursor = end + 1;
        }
    }
    Ok(row)
}

/// Reads the body of a quoted field starting at `cursor` (just past the opening
/// quote) and returns the cursor just past the closing quote.
fn read_quoted_field<'a>(
    row: &mut TemplateRow,
    line: &'a str,
    mut cursor: usize,
    mut rest: &'a str,
) -> Result<usize, RowError> {
    loop {
        let offset = rest.find(QUOTE).ok_or(RowError::UnbalancedQuote)?;
        row.append(&rest[..offset])?;
        cursor += offset + 1;
        match line[cursor..].strip_prefix(QUOTE) {
            Some(after) => {
                row.append("\"")?;
                cursor += 1;
                rest = after;
            }
            None => return Ok(cursor),
        }
    }
}

/// Encodes `fields` into one escaped row.
pub fn encode<'f, const N: usize, I>(fields: I) -> Result<String<N>, RowError>
where
    I: IntoIterator<Item = &'f str>,
{
    let mut out = String::new();
    let mut fields = fields.into_iter();
    let template = fields.next().ok_or(RowError::Empty)?;
    let mut writer = RowWriter::new(&mut out);
    writer.begin(template)?;
    for field in fields {
        writer.field(field)?;
    }
    Ok(out)
}

/// Decodes a payload that may hold several newline-separated rows.
///
/// Fails as a whole only when the payload is not text. Otherwise every
/// non-blank line is decoded on its own and reported with its 1-based line
/// number, so one bad row never hides the others.
pub fn decode_all(payload: &[u8]) -> Result<Rows<'_>, RowError> {
    let text = core::str::from_utf8(payload).map_err(|_| RowError::InvalidUtf8)?;
    Ok(Rows {
        lines: text.split(ROW_SEPARATOR).enumerate(),
    })
}

/// Iterator over the rows of a batched payload, see [`decode_all`].
pub struct Rows<'a> {
    lines: Enumerate<Split<'a, char>>,
}

impl Iterator for Rows<'_> {
    type Item = (usize, Result<TemplateRow, RowError>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (index, line) = self.lines.next()?;
            if line.trim().is_empty() {
                continue;
            }
            return Some((index + 1, decode(line)));
        }
    }
}

/// Appends escaped rows to a payload buffer.
///
/// ```ignore
/// let mut payload = heapless::String::<256>::new();
/// let mut w = RowWriter::new(&mut payload);
/// w.begin("200")?.field("temperature")?.field("T")?.display(15)?;
/// w.begin("400")?.field("yourEventType")?.field("Door, opened")?;
/// assert_eq!(payload, "200,temperature,T,15\n400,yourEventType,\"Door, opened\"");
/// ```
pub struct RowWriter<'b, const N: usize> {
    out: &'b mut String<N>,
    fields: usize,
}

impl<'b, const N: usize> RowWriter<'b, N> {
    /// Creates a writer appending to `out`. Existing content is kept and the
    /// next row is separated from it by a newline.
    pub fn new(out: &'b mut String<N>) -> Self {
        Self { out, fields: 0 }
    }

    /// Number of fields in the current row, identifier included.
    pub fn fields(&self) -> usize {
        self.fields
    }

    /// Starts a new row with the given template identifier.
    pub fn begin(&mut self, template: &str) -> Result<&mut Self, RowError> {
        if template.is_empty() {
            return Err(RowError::Empty);
        }
        if !self.out.is_empty() {
            self.push_raw("\n")?;
        }
        self.push_escaped(template)?;
        self.fields = 1;
        Ok(self)
    }

    /// Appends a text field.
    pub fn field(&mut self, value: &str) -> Result<&mut Self, RowError> {
        self.push_raw(",")?;
        self.push_escaped(value)?;
        self.fields += 1;
        Ok(self)
    }

    /// Appends a field rendered through `Display`, typically a number.
    pub fn display(&mut self, value: impl fmt::Display) -> Result<&mut Self, RowError> {
        let mut scratch: String<MAX_TEXT_LEN> = String::new();
        write!(scratch, "{value}").map_err(|_| RowError::RowTooLong)?;
        self.field(&scratch)
    }

    /// Appends a field that may be absent; absent fields are left empty.
    pub fn optional(&mut self, value: Option<&str>) -> Result<&mut Self, RowError> {
        self.field(value.unwrap_or(""))
    }

    fn push_raw(&mut self, s: &str) -> Result<(), RowError> {
        self.out.push_str(s).map_err(|_| RowError::RowTooLong)
    }

    fn push_escaped(&mut self, value: &str) -> Result<(), RowError> {
        if value.contains(['\r', '\n']) {
            return Err(RowError::LineBreak);
        }
        if !value.contains([DELIMITER, QUOTE]) {
            return self.push_raw(value);
        }
        self.push_raw("\"")?;
        for (i, part) in value.split(QUOTE).enumerate() {
            if i > 0 {
                self.push_raw("\"\"")?;
            }
            self.push_raw(part)?;
        }
        self.push_raw("\"")
    }
}
