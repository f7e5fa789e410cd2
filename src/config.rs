//! Render config – the table a PDF engine session is constructed from, plus
//! the host parameters it is seeded with.
//!
//! Keys follow the classic engine naming (`tempDir`, `mode`, `format`,
//! `fontdata`) so a config can be loaded straight from the host's JSON.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Text mode used when none is configured.
pub const DEFAULT_MODE: &str = "utf-8";

/// Mode that restricts the engine to its built-in core fonts.
pub const CORE_MODE: &str = "c";

const MM_TO_PT: f32 = 72.0 / 25.4;

/// Page orientation for the generated PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageOrientation {
    /// Portrait mode: height > width (default).
    #[default]
    Portrait,
    /// Landscape mode: width > height.
    Landscape,
}

/// A named paper size or a custom one in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PageSize {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
    Custom { width_mm: f32, height_mm: f32 },
}

impl PageSize {
    /// Portrait dimensions in millimetres.
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match *self {
            PageSize::A3 => (297.0, 420.0),
            PageSize::A4 => (210.0, 297.0),
            PageSize::A5 => (148.0, 210.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Legal => (215.9, 355.6),
            PageSize::Custom {
                width_mm,
                height_mm,
            } => (width_mm, height_mm),
        }
    }
}

/// Page size plus orientation, e.g. `A4`, `A4-L`, `letter-P`, `100x150`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PageFormat {
    pub size: PageSize,
    pub orientation: PageOrientation,
}

impl PageFormat {
    pub fn new(size: PageSize, orientation: PageOrientation) -> Self {
        Self { size, orientation }
    }

    /// Effective width × height in millimetres after applying orientation.
    pub fn dimensions_mm(&self) -> (f32, f32) {
        let (w, h) = self.size.dimensions_mm();
        match self.orientation {
            PageOrientation::Portrait => (w, h),
            PageOrientation::Landscape => (h, w),
        }
    }

    /// Effective width × height in PDF points.
    pub fn dimensions_pt(&self) -> (f32, f32) {
        let (w, h) = self.dimensions_mm();
        (w * MM_TO_PT, h * MM_TO_PT)
    }
}

impl FromStr for PageFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();

        let (name, orientation) = match lower.rsplit_once('-') {
            Some((name, "l")) => (name, PageOrientation::Landscape),
            Some((name, "p")) => (name, PageOrientation::Portrait),
            _ => (lower.as_str(), PageOrientation::Portrait),
        };

        let size = match name {
            "a3" => PageSize::A3,
            "a4" => PageSize::A4,
            "a5" => PageSize::A5,
            "letter" => PageSize::Letter,
            "legal" => PageSize::Legal,
            other => {
                let (w, h) = other
                    .split_once('x')
                    .ok_or_else(|| ConfigError::InvalidFormat(trimmed.to_string()))?;
                let parse = |v: &str| {
                    v.trim()
                        .parse::<f32>()
                        .ok()
                        .filter(|n| *n > 0.0)
                        .ok_or_else(|| ConfigError::InvalidFormat(trimmed.to_string()))
                };
                PageSize::Custom {
                    width_mm: parse(w)?,
                    height_mm: parse(h)?,
                }
            }
        };

        Ok(Self { size, orientation })
    }
}

impl fmt::Display for PageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size {
            PageSize::A3 => f.write_str("A3")?,
            PageSize::A4 => f.write_str("A4")?,
            PageSize::A5 => f.write_str("A5")?,
            PageSize::Letter => f.write_str("Letter")?,
            PageSize::Legal => f.write_str("Legal")?,
            PageSize::Custom {
                width_mm,
                height_mm,
            } => write!(f, "{width_mm}x{height_mm}")?,
        }
        if self.orientation == PageOrientation::Landscape {
            f.write_str("-L")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for PageFormat {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PageFormat> for String {
    fn from(value: PageFormat) -> Self {
        value.to_string()
    }
}

/// Font files for one family, keyed by style (`R`, `B`, `I`, `BI`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontStyles {
    #[serde(rename = "R", default, skip_serializing_if = "Option::is_none")]
    pub regular: Option<String>,
    #[serde(rename = "B", default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<String>,
    #[serde(rename = "I", default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<String>,
    #[serde(rename = "BI", default, skip_serializing_if = "Option::is_none")]
    pub bold_italic: Option<String>,
}

impl FontStyles {
    pub fn regular(file: impl Into<String>) -> Self {
        Self {
            regular: Some(file.into()),
            ..Self::default()
        }
    }

    pub fn with_bold(mut self, file: impl Into<String>) -> Self {
        self.bold = Some(file.into());
        self
    }

    pub fn with_italic(mut self, file: impl Into<String>) -> Self {
        self.italic = Some(file.into());
        self
    }

    pub fn with_bold_italic(mut self, file: impl Into<String>) -> Self {
        self.bold_italic = Some(file.into());
        self
    }

    /// File for the requested style. Missing styles fall back to regular.
    pub fn file_for(&self, bold: bool, italic: bool) -> Option<&str> {
        let styled = match (bold, italic) {
            (true, true) => self.bold_italic.as_deref(),
            (true, false) => self.bold.as_deref(),
            (false, true) => self.italic.as_deref(),
            (false, false) => None,
        };
        styled.or(self.regular.as_deref())
    }
}

/// Families shipped in the engine's default font table. They only take effect
/// once a directory containing the files is registered.
pub fn default_font_data() -> BTreeMap<String, FontStyles> {
    let mut data = BTreeMap::new();
    data.insert(
        "dejavusans".to_string(),
        FontStyles::regular("DejaVuSans.ttf")
            .with_bold("DejaVuSans-Bold.ttf")
            .with_italic("DejaVuSans-Oblique.ttf")
            .with_bold_italic("DejaVuSans-BoldOblique.ttf"),
    );
    data.insert(
        "dejavuserif".to_string(),
        FontStyles::regular("DejaVuSerif.ttf")
            .with_bold("DejaVuSerif-Bold.ttf")
            .with_italic("DejaVuSerif-Italic.ttf")
            .with_bold_italic("DejaVuSerif-BoldItalic.ttf"),
    );
    data.insert(
        "dejavusansmono".to_string(),
        FontStyles::regular("DejaVuSansMono.ttf")
            .with_bold("DejaVuSansMono-Bold.ttf")
            .with_italic("DejaVuSansMono-Oblique.ttf")
            .with_bold_italic("DejaVuSansMono-BoldOblique.ttf"),
    );
    data
}

/// The config table a PDF engine session is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Scratch directory for the engine (staged file output).
    #[serde(rename = "tempDir")]
    pub temp_dir: PathBuf,
    /// Text mode; `c` restricts the engine to core fonts.
    #[serde(default = "RenderConfig::default_mode")]
    pub mode: String,
    #[serde(default)]
    pub format: PageFormat,
    #[serde(rename = "fontdata", default = "default_font_data")]
    pub font_data: BTreeMap<String, FontStyles>,
    /// Upper bound on the work the engine spends parsing one HTML chunk.
    #[serde(
        rename = "backtrackLimit",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub backtrack_limit: Option<u64>,
    /// Engine-specific options (`default_font`, `margin_left`, ...).
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl RenderConfig {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            mode: Self::default_mode(),
            format: PageFormat::default(),
            font_data: default_font_data(),
            backtrack_limit: None,
            options: Map::new(),
        }
    }

    fn default_mode() -> String {
        DEFAULT_MODE.to_string()
    }

    /// Whether only the engine's built-in fonts may be used.
    pub fn is_core_mode(&self) -> bool {
        self.mode.eq_ignore_ascii_case(CORE_MODE)
    }

    /// Add or fully replace a font family. Family names are case-insensitive.
    pub fn add_font(&mut self, name: &str, styles: FontStyles) {
        self.font_data.insert(name.to_ascii_lowercase(), styles);
    }

    /// Set one named entry. Reserved keys update their typed field, anything
    /// else is stored as an engine option.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), ConfigError> {
        match name {
            "tempDir" => self.temp_dir = PathBuf::from(expect_str(name, &value)?),
            "mode" => self.mode = expect_str(name, &value)?.to_string(),
            "format" => self.format = expect_str(name, &value)?.parse()?,
            "fontdata" => {
                let table: BTreeMap<String, FontStyles> = serde_json::from_value(value)
                    .map_err(|e| ConfigError::InvalidValue {
                        key: name.to_string(),
                        reason: e.to_string(),
                    })?;
                self.font_data = table
                    .into_iter()
                    .map(|(family, styles)| (family.to_ascii_lowercase(), styles))
                    .collect();
            }
            "backtrackLimit" => {
                let limit = match &value {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                };
                self.backtrack_limit = Some(limit.ok_or_else(|| ConfigError::InvalidValue {
                    key: name.to_string(),
                    reason: format!("expected a non-negative integer, got {value}"),
                })?);
            }
            _ => {
                self.options.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    /// String-valued engine option.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }

    /// Numeric engine option; numeric strings are accepted too.
    pub fn option_f32(&self, key: &str) -> Option<f32> {
        match self.options.get(key)? {
            Value::Number(n) => n.as_f64().map(|v| v as f32),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn expect_str<'a>(key: &str, value: &'a Value) -> Result<&'a str, ConfigError> {
    value.as_str().ok_or_else(|| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("expected a string, got {value}"),
    })
}

/// Parameters exposed by the host application's container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostParameters {
    #[serde(rename = "tempDir")]
    pub temp_dir: PathBuf,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HostParameters {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            extra: Map::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The default engine config seeded from these parameters.
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig::new(self.temp_dir.clone())
    }
}
