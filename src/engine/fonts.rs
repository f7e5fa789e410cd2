//! Font registry for the printpdf engine.
//!
//! Built-in PDF families need no files. Any other family is looked up in the
//! `fontdata` table and its files are resolved against the registered font
//! directories, first match wins, then validated with `ttf-parser`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use printpdf::BuiltinFont;

use crate::config::FontStyles;
use crate::error::EngineError;

/// Ascender of the base-14 fonts as a fraction of the font size.
const BUILTIN_ASCENT: f32 = 0.8;

/// The base-14 families every PDF viewer ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFamily {
    Helvetica,
    Times,
    Courier,
}

impl BuiltinFamily {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "helvetica" | "arial" | "sans-serif" | "sans" => Some(BuiltinFamily::Helvetica),
            "times" | "times new roman" | "serif" => Some(BuiltinFamily::Times),
            "courier" | "courier new" | "monospace" | "mono" => Some(BuiltinFamily::Courier),
            _ => None,
        }
    }

    pub fn font(self, bold: bool, italic: bool) -> BuiltinFont {
        match (self, bold, italic) {
            (BuiltinFamily::Helvetica, true, true) => BuiltinFont::HelveticaBoldOblique,
            (BuiltinFamily::Helvetica, true, false) => BuiltinFont::HelveticaBold,
            (BuiltinFamily::Helvetica, false, true) => BuiltinFont::HelveticaOblique,
            (BuiltinFamily::Helvetica, false, false) => BuiltinFont::Helvetica,
            (BuiltinFamily::Times, true, true) => BuiltinFont::TimesBoldItalic,
            (BuiltinFamily::Times, true, false) => BuiltinFont::TimesBold,
            (BuiltinFamily::Times, false, true) => BuiltinFont::TimesItalic,
            (BuiltinFamily::Times, false, false) => BuiltinFont::TimesRoman,
            (BuiltinFamily::Courier, true, true) => BuiltinFont::CourierBoldOblique,
            (BuiltinFamily::Courier, true, false) => BuiltinFont::CourierBold,
            (BuiltinFamily::Courier, false, true) => BuiltinFont::CourierOblique,
            (BuiltinFamily::Courier, false, false) => BuiltinFont::Courier,
        }
    }

    /// Average advance as a fraction of the font size.
    fn average_advance(self, bold: bool) -> f32 {
        match (self, bold) {
            (BuiltinFamily::Courier, _) => 0.6,
            (BuiltinFamily::Times, false) => 0.45,
            (BuiltinFamily::Times, true) => 0.5,
            (BuiltinFamily::Helvetica, false) => 0.5,
            (BuiltinFamily::Helvetica, true) => 0.55,
        }
    }
}

/// A parsed font file.
pub struct FontFace {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
}

impl FontFace {
    pub fn parse(bytes: Vec<u8>) -> Result<Self, String> {
        let face = ttf_parser::Face::parse(&bytes, 0).map_err(|e| e.to_string())?;
        let units_per_em = face.units_per_em() as f32;
        let ascender = face.ascender() as f32;
        Ok(Self {
            bytes,
            units_per_em,
            ascender,
        })
    }

    /// Ascender as a fraction of the font size.
    pub fn ascent(&self) -> f32 {
        if self.units_per_em > 0.0 {
            self.ascender / self.units_per_em
        } else {
            BUILTIN_ASCENT
        }
    }

    /// Sum of horizontal glyph advances at `font_size`.
    pub fn measure(&self, text: &str, font_size: f32) -> f32 {
        let Ok(face) = ttf_parser::Face::parse(&self.bytes, 0) else {
            return text.chars().count() as f32 * font_size * 0.5;
        };
        let scale = font_size / self.units_per_em;
        text.chars()
            .map(|ch| match face.glyph_index(ch) {
                Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                None => font_size * 0.5,
            })
            .sum()
    }
}

/// A family loaded from font files, one face per style.
pub struct EmbeddedFamily {
    pub family: String,
    regular: Arc<FontFace>,
    faces: HashMap<(bool, bool), Arc<FontFace>>,
}

impl EmbeddedFamily {
    pub fn face(&self, bold: bool, italic: bool) -> &Arc<FontFace> {
        self.faces.get(&(bold, italic)).unwrap_or(&self.regular)
    }

    /// Distinct faces, for embedding each file once.
    pub fn faces(&self) -> impl Iterator<Item = ((bool, bool), &Arc<FontFace>)> {
        self.faces.iter().map(|(k, v)| (*k, v))
    }
}

/// The font a document is set in.
pub enum DocumentFont {
    Builtin(BuiltinFamily),
    Embedded(EmbeddedFamily),
}

impl DocumentFont {
    pub fn name(&self) -> &str {
        match self {
            DocumentFont::Builtin(BuiltinFamily::Helvetica) => "helvetica",
            DocumentFont::Builtin(BuiltinFamily::Times) => "times",
            DocumentFont::Builtin(BuiltinFamily::Courier) => "courier",
            DocumentFont::Embedded(family) => &family.family,
        }
    }

    /// Distance from the top of a line box to the baseline, per point of size.
    pub fn ascent(&self, bold: bool, italic: bool) -> f32 {
        match self {
            DocumentFont::Builtin(_) => BUILTIN_ASCENT,
            DocumentFont::Embedded(family) => family.face(bold, italic).ascent(),
        }
    }

    /// Width of `text` in points.
    pub fn measure(&self, text: &str, font_size: f32, bold: bool, italic: bool) -> f32 {
        match self {
            DocumentFont::Builtin(family) => {
                text.chars().count() as f32 * font_size * family.average_advance(bold)
            }
            DocumentFont::Embedded(family) => family.face(bold, italic).measure(text, font_size),
        }
    }
}

/// Registered font directories.
#[derive(Debug, Default, Clone)]
pub struct FontBook {
    directories: Vec<PathBuf>,
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_directory(&mut self, dir: &Path) -> Result<(), EngineError> {
        if !dir.is_dir() {
            return Err(EngineError::FontDirectory {
                path: dir.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }
        self.directories.push(dir.to_path_buf());
        Ok(())
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// First registered directory holding `file`.
    pub fn locate(&self, file: &str) -> Option<PathBuf> {
        let direct = Path::new(file);
        if direct.is_absolute() {
            return direct.is_file().then(|| direct.to_path_buf());
        }
        self.directories
            .iter()
            .map(|dir| dir.join(file))
            .find(|path| path.is_file())
    }

    /// Load every style of `family` described by `styles`.
    pub fn load_family(
        &self,
        family: &str,
        styles: &FontStyles,
    ) -> Result<EmbeddedFamily, EngineError> {
        let font_error = |reason: String| EngineError::Font {
            family: family.to_string(),
            reason,
        };

        let mut by_file: HashMap<PathBuf, Arc<FontFace>> = HashMap::new();
        let mut faces = HashMap::new();

        for (bold, italic) in [(false, false), (true, false), (false, true), (true, true)] {
            let Some(file) = styles.file_for(bold, italic) else {
                continue;
            };
            let Some(path) = self.locate(file) else {
                if (bold, italic) == (false, false) {
                    return Err(font_error(format!(
                        "'{file}' not found in {} font director{}",
                        self.directories.len(),
                        if self.directories.len() == 1 { "y" } else { "ies" }
                    )));
                }
                log::debug!("font {family}: style file '{file}' missing, using regular");
                continue;
            };

            let face = match by_file.get(&path) {
                Some(face) => Arc::clone(face),
                None => {
                    let bytes = fs::read(&path)
                        .map_err(|e| font_error(format!("{}: {e}", path.display())))?;
                    let face = Arc::new(
                        FontFace::parse(bytes)
                            .map_err(|e| font_error(format!("{}: {e}", path.display())))?,
                    );
                    by_file.insert(path, Arc::clone(&face));
                    face
                }
            };
            faces.insert((bold, italic), face);
        }

        let Some(regular) = faces.get(&(false, false)).cloned() else {
            return Err(font_error("no regular (R) style configured".to_string()));
        };

        Ok(EmbeddedFamily {
            family: family.to_string(),
            regular,
            faces,
        })
    }
}
