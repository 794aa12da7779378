//! # Status Record Parser Module
//!
//! Questo modulo interpreta una riga dell'audit log del provider (`.shortpixel`).
//!
//! ## Responsabilità:
//! - Definisce `StatusRecord`, un tentativo di elaborazione per un file
//! - Descrive il formato a larghezza fissa come tabella dichiarativa (`LAYOUT`)
//! - Estrae ogni campo con un unico extractor generico (offset, width, trim)
//! - Scarta le righe non valide restituendo `None`, mai un errore
//!
//! ## Formato della riga:
//! Ogni riga è lunga esattamente `LINE_LENGTH` byte (terminatore escluso).
//! I campi non sono delimitati: i confini non si spostano mai, qualunque sia
//! il contenuto. Le righe parziali sono normali durante scritture concorrenti.
//!
//! | Campo           | Offset | Width |
//! |-----------------|--------|-------|
//! | type            | 0      | 2     |
//! | status          | 2      | 11    |
//! | retries         | 13     | 2     |
//! | compressionType | 15     | 9     |
//! | keepExif        | 24     | 2     |
//! | cmyk2rgb        | 26     | 2     |
//! | resize          | 28     | 2     |
//! | resizeWidth     | 30     | 6     |
//! | resizeHeight    | 36     | 6     |
//! | convertTo       | 42     | 10    |
//! | percent         | 52     | 6     |
//! | optimizedSize   | 58     | 9     |
//! | changeDate      | 67     | 20    |
//! | file            | 87     | 256   |
//! | message         | 343    | 111   |
//! | originalSize    | 454    | 9     |
//!
//! ## Esempio:
//! ```rust,ignore
//! if let Some(record) = StatusRecord::parse(line.as_bytes(), "gallery/") {
//!     println!("{} -> {}", record.file_path, record.status);
//! }
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Usable length of a line once `\r\n` is stripped
pub const LINE_LENGTH: usize = 463;

/// Record type used by the provider for directory markers
pub const DIRECTORY_TYPE: &str = "D";

/// Position of one field inside an audit line
#[derive(Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: usize,
    pub width: usize,
    trim: fn(&str) -> &str,
}

impl FieldSpec {
    const fn new(name: &'static str, offset: usize, width: usize) -> Self {
        Self { name, offset, width, trim: str::trim }
    }

    /// File names may start with meaningful whitespace, so only the tail is trimmed
    const fn right_trimmed(name: &'static str, offset: usize, width: usize) -> Self {
        Self { name, offset, width, trim: str::trim_end }
    }

    /// Extract and trim this field. `line` must be at least `offset + width` long.
    fn extract(&self, line: &[u8]) -> String {
        let raw = String::from_utf8_lossy(&line[self.offset..self.offset + self.width]);
        (self.trim)(&raw).to_string()
    }
}

pub const TYPE: FieldSpec = FieldSpec::new("type", 0, 2);
pub const STATUS: FieldSpec = FieldSpec::new("status", 2, 11);
pub const RETRIES: FieldSpec = FieldSpec::new("retries", 13, 2);
pub const COMPRESSION_TYPE: FieldSpec = FieldSpec::new("compressionType", 15, 9);
pub const KEEP_EXIF: FieldSpec = FieldSpec::new("keepExif", 24, 2);
pub const CMYK2RGB: FieldSpec = FieldSpec::new("cmyk2rgb", 26, 2);
pub const RESIZE: FieldSpec = FieldSpec::new("resize", 28, 2);
pub const RESIZE_WIDTH: FieldSpec = FieldSpec::new("resizeWidth", 30, 6);
pub const RESIZE_HEIGHT: FieldSpec = FieldSpec::new("resizeHeight", 36, 6);
pub const CONVERT_TO: FieldSpec = FieldSpec::new("convertTo", 42, 10);
pub const PERCENT: FieldSpec = FieldSpec::new("percent", 52, 6);
pub const OPTIMIZED_SIZE: FieldSpec = FieldSpec::new("optimizedSize", 58, 9);
pub const CHANGE_DATE: FieldSpec = FieldSpec::new("changeDate", 67, 20);
pub const FILE: FieldSpec = FieldSpec::right_trimmed("file", 87, 256);
pub const MESSAGE: FieldSpec = FieldSpec::new("message", 343, 111);
pub const ORIGINAL_SIZE: FieldSpec = FieldSpec::new("originalSize", 454, 9);

/// The whole line format, in positional order
pub const LAYOUT: [FieldSpec; 16] = [
    TYPE,
    STATUS,
    RETRIES,
    COMPRESSION_TYPE,
    KEEP_EXIF,
    CMYK2RGB,
    RESIZE,
    RESIZE_WIDTH,
    RESIZE_HEIGHT,
    CONVERT_TO,
    PERCENT,
    OPTIMIZED_SIZE,
    CHANGE_DATE,
    FILE,
    MESSAGE,
    ORIGINAL_SIZE,
];

/// Outcome of one provider attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Success,
    Skip,
    Deleted,
}

impl FromStr for RecordStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "skip" => Ok(Self::Skip),
            "deleted" => Ok(Self::Deleted),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Skip => "skip",
            Self::Deleted => "deleted",
        };
        f.pad(name)
    }
}

/// One audit entry for one file-processing attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub status: RecordStatus,
    pub retries: u32,
    pub compression_type: String,
    pub keep_exif: String,
    pub cmyk2rgb: String,
    pub resize: String,
    pub resize_width: String,
    pub resize_height: String,
    pub convert_to: String,
    pub percent: f64,
    pub optimized_size: u64,
    pub change_date: DateTime<Utc>,
    pub file: String,
    pub file_path: String,
    pub message: String,
    pub original_size: u64,
}

impl StatusRecord {
    /// Parse one audit line. `folder_prefix` is prepended to the file name to
    /// build `file_path`. Returns `None` for anything that is not a record.
    pub fn parse(line: &[u8], folder_prefix: &str) -> Option<Self> {
        let line = strip_terminator(line);
        if line.len() != LINE_LENGTH {
            return None;
        }

        let status = STATUS.extract(line).parse::<RecordStatus>().ok()?;
        let change_date = parse_change_date(&CHANGE_DATE.extract(line))?;
        let file = FILE.extract(line);

        Some(Self {
            record_type: TYPE.extract(line),
            status,
            retries: RETRIES.extract(line).parse().unwrap_or(0),
            compression_type: COMPRESSION_TYPE.extract(line),
            keep_exif: KEEP_EXIF.extract(line),
            cmyk2rgb: CMYK2RGB.extract(line),
            resize: RESIZE.extract(line),
            resize_width: RESIZE_WIDTH.extract(line),
            resize_height: RESIZE_HEIGHT.extract(line),
            convert_to: CONVERT_TO.extract(line),
            percent: parse_percent(&PERCENT.extract(line)),
            optimized_size: parse_size(&OPTIMIZED_SIZE.extract(line)),
            change_date,
            file_path: format!("{}{}", folder_prefix, file),
            file,
            message: MESSAGE.extract(line),
            original_size: parse_size(&ORIGINAL_SIZE.extract(line)),
        })
    }

    /// Directory markers carry no file outcome
    pub fn is_directory(&self) -> bool {
        self.record_type == DIRECTORY_TYPE
    }
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\r' | b'\n') {
        end -= 1;
    }
    &line[..end]
}

/// Optional sign, digits with optional fraction, optional exponent
fn is_numeric(s: &str) -> bool {
    let b = s.as_bytes();
    let mut i = 0;

    if i < b.len() && matches!(b[i], b'+' | b'-') {
        i += 1;
    }

    let int_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;

    if i < b.len() && b[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        digits += i - frac_start;
    }

    if digits == 0 {
        return false;
    }

    if i < b.len() && matches!(b[i], b'e' | b'E') {
        i += 1;
        if i < b.len() && matches!(b[i], b'+' | b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }

    i == b.len()
}

fn parse_percent(raw: &str) -> f64 {
    if !is_numeric(raw) {
        return 0.0;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn parse_size(raw: &str) -> u64 {
    if !is_numeric(raw) {
        return 0;
    }
    if let Ok(v) = raw.parse::<u64>() {
        return v;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v.trunc() as u64,
        _ => 0,
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Free-text timestamp; naive forms are UTC. Epoch zero is rejected.
pub fn parse_change_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = if raw.bytes().all(|b| b.is_ascii_digit()) {
        raw.parse::<i64>()
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    } else if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        Some(dt.with_timezone(&Utc))
    } else {
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
            .map(|naive| Utc.from_utc_datetime(&naive))
    };

    parsed.filter(|dt| dt.timestamp() != 0)
}

/// Build a valid-length audit line with `fields` written at their offsets
#[cfg(test)]
pub(crate) fn fixture_line(fields: &[(FieldSpec, &str)]) -> String {
    let mut line = vec![b' '; LINE_LENGTH];
    for (spec, value) in fields {
        let bytes = value.as_bytes();
        assert!(bytes.len() <= spec.width, "{} too wide", spec.name);
        line[spec.offset..spec.offset + bytes.len()].copy_from_slice(bytes);
    }
    String::from_utf8(line).unwrap()
}
