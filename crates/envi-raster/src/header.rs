//! ENVI header parsing and serialization.
//!
//! A header is a text file starting with the magic line `ENVI`, followed by
//! `key = value` pairs. Values wrapped in braces may span several lines:
//!
//! ```text
//! ENVI
//! samples = 598
//! lines = 1280
//! bands = 3
//! interleave = bil
//! data type = 4
//! band names = { Latitude (WGS-84),
//!  Longitude (WGS-84), Elevation (m) }
//! ```
//!
//! Keys are case-insensitive and stored lowercase. Key order and unknown keys
//! are preserved so a header can be copied into a derived product.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{RasterError, Result};

/// Binary element type, identified by the ENVI `data type` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    U8,
    I16,
    I32,
    F32,
    F64,
    U16,
    U32,
    I64,
    U64,
}

impl DataType {
    /// Map an ENVI `data type` code to a data type.
    pub fn from_code(code: u32) -> Result<Self> {
        Ok(match code {
            1 => Self::U8,
            2 => Self::I16,
            3 => Self::I32,
            4 => Self::F32,
            5 => Self::F64,
            12 => Self::U16,
            13 => Self::U32,
            14 => Self::I64,
            15 => Self::U64,
            other => return Err(RasterError::UnsupportedDataType(other)),
        })
    }

    /// The ENVI `data type` code.
    pub fn code(&self) -> u32 {
        match self {
            Self::U8 => 1,
            Self::I16 => 2,
            Self::I32 => 3,
            Self::F32 => 4,
            Self::F64 => 5,
            Self::U16 => 12,
            Self::U32 => 13,
            Self::I64 => 14,
            Self::U64 => 15,
        }
    }

    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 | Self::I64 | Self::U64 => 8,
        }
    }

    /// Whether this is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Decode one element. `bytes` must hold exactly `self.size()` bytes.
    pub fn decode(&self, bytes: &[u8], order: ByteOrder) -> f64 {
        macro_rules! read {
            ($t:ty, $n:expr) => {{
                let mut buf = [0u8; $n];
                buf.copy_from_slice(&bytes[..$n]);
                match order {
                    ByteOrder::LittleEndian => <$t>::from_le_bytes(buf) as f64,
                    ByteOrder::BigEndian => <$t>::from_be_bytes(buf) as f64,
                }
            }};
        }

        match self {
            Self::U8 => bytes[0] as f64,
            Self::I16 => read!(i16, 2),
            Self::U16 => read!(u16, 2),
            Self::I32 => read!(i32, 4),
            Self::U32 => read!(u32, 4),
            Self::F32 => read!(f32, 4),
            Self::F64 => read!(f64, 8),
            Self::I64 => read!(i64, 8),
            Self::U64 => read!(u64, 8),
        }
    }

    /// Encode one element into `out`, which must hold `self.size()` bytes.
    ///
    /// Integer types saturate at their bounds.
    pub fn encode(&self, value: f64, order: ByteOrder, out: &mut [u8]) {
        macro_rules! put {
            ($v:expr) => {{
                let v = $v;
                let bytes = match order {
                    ByteOrder::LittleEndian => v.to_le_bytes(),
                    ByteOrder::BigEndian => v.to_be_bytes(),
                };
                out[..bytes.len()].copy_from_slice(&bytes);
            }};
        }

        match self {
            Self::U8 => out[0] = value as u8,
            Self::I16 => put!(value as i16),
            Self::U16 => put!(value as u16),
            Self::I32 => put!(value as i32),
            Self::U32 => put!(value as u32),
            Self::F32 => put!(value as f32),
            Self::F64 => put!(value),
            Self::I64 => put!(value as i64),
            Self::U64 => put!(value as u64),
        }
    }
}

/// Band/sample interleave scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interleave {
    /// Band interleaved by line: `[line][band][sample]`.
    Bil,
    /// Band interleaved by pixel: `[line][sample][band]`.
    Bip,
    /// Band sequential: `[band][line][sample]`.
    Bsq,
}

impl Interleave {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bil" => Ok(Self::Bil),
            "bip" => Ok(Self::Bip),
            "bsq" => Ok(Self::Bsq),
            other => Err(RasterError::UnsupportedInterleave(other.to_string())),
        }
    }

    /// Get the interleave name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bil => "bil",
            Self::Bip => "bip",
            Self::Bsq => "bsq",
        }
    }
}

impl fmt::Display for Interleave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Byte order of multi-byte elements (`byte order` 0 or 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

/// Path of the header belonging to a raster data file.
///
/// `.img`, `.dat` and `.raw` extensions are replaced by `.hdr`; any other
/// path gets `.hdr` appended.
pub fn header_path(data_path: impl AsRef<Path>) -> PathBuf {
    let path = data_path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if matches!(ext.to_lowercase().as_str(), "img" | "dat" | "raw") => {
            path.with_extension("hdr")
        }
        _ => {
            let mut s = path.as_os_str().to_owned();
            s.push(".hdr");
            PathBuf::from(s)
        }
    }
}

/// Parsed ENVI header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnviHeader {
    fields: Vec<(String, String)>,
    source: PathBuf,
}

impl EnviHeader {
    /// Create a header from its basic geometry.
    pub fn new(lines: usize, samples: usize, bands: usize, data_type: DataType) -> Self {
        let mut header = Self::default();
        header.set("samples", samples.to_string());
        header.set("lines", lines.to_string());
        header.set("bands", bands.to_string());
        header.set("header offset", "0");
        header.set("file type", "ENVI Standard");
        header.set("data type", data_type.code().to_string());
        header.set("interleave", Interleave::Bil.as_str());
        header.set("byte order", "0");
        header
    }

    /// Read and parse a header file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| RasterError::io(path, e))?;
        Self::parse(&text, path)
    }

    /// Parse header text. `source` is only used in error messages.
    pub fn parse(text: &str, source: impl Into<PathBuf>) -> Result<Self> {
        let source = source.into();
        let mut lines = text.lines();

        match lines.next() {
            Some(first) if first.trim() == "ENVI" => {}
            _ => return Err(RasterError::invalid_header(&source, "missing ENVI magic line")),
        }

        let mut fields: Vec<(String, String)> = Vec::new();
        while let Some(line) = lines.next() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(RasterError::invalid_header(
                    &source,
                    format!("expected 'key = value', got '{}'", line),
                ));
            };

            let mut value = value.trim().to_string();
            if value.starts_with('{') {
                while !value.contains('}') {
                    match lines.next() {
                        Some(next) => {
                            value.push(' ');
                            value.push_str(next.trim());
                        }
                        None => {
                            return Err(RasterError::invalid_header(
                                &source,
                                format!("unterminated '{{' in field '{}'", key.trim()),
                            ))
                        }
                    }
                }
            }

            let key = key.trim().to_lowercase();
            match fields.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => fields.push((key, value)),
            }
        }

        Ok(Self { fields, source })
    }

    /// Serialize to header text.
    pub fn to_text(&self) -> String {
        let mut out = String::from("ENVI\n");
        for (key, value) in &self.fields {
            out.push_str(key);
            out.push_str(" = ");
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Write the header to `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_text()).map_err(|e| RasterError::io(path, e))
    }

    /// File this header was read from (empty for constructed headers).
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Raw value of a field.
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a field, keeping its position if it already exists.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = key.to_lowercase();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Remove a field.
    pub fn remove(&mut self, key: &str) {
        let key = key.to_lowercase();
        self.fields.retain(|(k, _)| *k != key);
    }

    /// Set a list field, formatted as `{ a, b, c }`.
    pub fn set_list<S: AsRef<str>>(&mut self, key: &str, values: &[S]) {
        let joined = values
            .iter()
            .map(|v| v.as_ref())
            .collect::<Vec<_>>()
            .join(", ");
        self.set(key, format!("{{ {} }}", joined));
    }

    /// Parse a list field (`{ a, b, c }`).
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        let raw = self.get(key)?;
        let inner = raw.trim().trim_start_matches('{').trim_end_matches('}');
        if inner.trim().is_empty() {
            return Some(Vec::new());
        }
        Some(inner.split(',').map(|s| s.trim().to_string()).collect())
    }

    fn required_usize(&self, key: &str) -> Result<usize> {
        let raw = self
            .get(key)
            .ok_or_else(|| RasterError::missing_field(&self.source, key))?;
        raw.trim().parse().map_err(|_| {
            RasterError::invalid_header(&self.source, format!("'{}' is not an integer: {}", key, raw))
        })
    }

    /// Number of lines (rows).
    pub fn lines(&self) -> Result<usize> {
        self.required_usize("lines")
    }

    /// Number of samples (columns).
    pub fn samples(&self) -> Result<usize> {
        self.required_usize("samples")
    }

    /// Number of bands.
    pub fn bands(&self) -> Result<usize> {
        self.required_usize("bands")
    }

    /// Byte offset of the first element in the data file (defaults to 0).
    pub fn header_offset(&self) -> Result<u64> {
        match self.get("header offset") {
            None => Ok(0),
            Some(raw) => raw.trim().parse().map_err(|_| {
                RasterError::invalid_header(&self.source, format!("bad header offset: {}", raw))
            }),
        }
    }

    /// Element type.
    pub fn data_type(&self) -> Result<DataType> {
        let code = self.required_usize("data type")?;
        DataType::from_code(code as u32)
    }

    /// Interleave (defaults to bsq, as ENVI does).
    pub fn interleave(&self) -> Result<Interleave> {
        match self.get("interleave") {
            None => Ok(Interleave::Bsq),
            Some(raw) => Interleave::parse(raw),
        }
    }

    /// Byte order (defaults to little endian).
    pub fn byte_order(&self) -> Result<ByteOrder> {
        match self.get("byte order").map(str::trim) {
            None | Some("0") => Ok(ByteOrder::LittleEndian),
            Some("1") => Ok(ByteOrder::BigEndian),
            Some(other) => Err(RasterError::invalid_header(
                &self.source,
                format!("bad byte order: {}", other),
            )),
        }
    }

    /// Band names, or `Band 1..N` when the header has none.
    pub fn band_names(&self) -> Result<Vec<String>> {
        let bands = self.bands()?;
        match self.get_list("band names") {
            Some(names) if names.len() == bands => Ok(names),
            Some(names) => Err(RasterError::invalid_header(
                &self.source,
                format!("{} band names for {} bands", names.len(), bands),
            )),
            None => Ok((1..=bands).map(|i| format!("Band {}", i)).collect()),
        }
    }

    /// The `data ignore value`, if set.
    pub fn data_ignore_value(&self) -> Option<f64> {
        self.get("data ignore value")
            .and_then(|v| v.trim().parse().ok())
    }
}
