//! PDF engine contract – what the renderer needs from an HTML → PDF engine –
//! and the output plumbing shared by engine implementations.
//!
//! A session is built fresh for every render by an [`EngineFactory`] and
//! dropped afterwards.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::RenderConfig;
use crate::error::{ConfigError, EngineError};
use crate::logger::LogSink;

pub mod dom;
pub mod flow;
pub mod fonts;
pub mod printer;

pub use self::printer::{PrintPdfEngine, PrintPdfFactory};

/// File name used when the caller supplies none.
pub const DEFAULT_FILE_NAME: &str = "document.pdf";

/// Where the finished document goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Send to the client, displayed in place (`I`).
    Inline,
    /// Send to the client as a download (`D`).
    Download,
    /// Save to a local file (`F`).
    File,
    /// Return the raw bytes (`S`).
    String,
}

impl FromStr for Destination {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "I" => Ok(Destination::Inline),
            "D" => Ok(Destination::Download),
            "F" => Ok(Destination::File),
            "S" => Ok(Destination::String),
            _ => Err(ConfigError::InvalidDestination(s.to_string())),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Destination::Inline => "I",
            Destination::Download => "D",
            Destination::File => "F",
            Destination::String => "S",
        })
    }
}

/// Fill in the omitted parts of an output request.
///
/// No name and no destination streams `document.pdf` inline; a name alone
/// means "save to that file".
pub fn resolve_destination(
    file_name: Option<&str>,
    destination: Option<Destination>,
) -> (String, Destination) {
    let name = file_name.filter(|n| !n.trim().is_empty());
    match (name, destination) {
        (Some(name), Some(dest)) => (name.to_string(), dest),
        (Some(name), None) => (name.to_string(), Destination::File),
        (None, Some(dest)) => (DEFAULT_FILE_NAME.to_string(), dest),
        (None, None) => (DEFAULT_FILE_NAME.to_string(), Destination::Inline),
    }
}

/// How a client should treat a streamed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

/// A document ready to be streamed to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub file_name: String,
    pub disposition: Disposition,
    pub body: Vec<u8>,
}

impl Response {
    pub fn content_type(&self) -> &'static str {
        "application/pdf"
    }

    pub fn content_disposition(&self) -> String {
        let kind = match self.disposition {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        };
        let name = self.file_name.replace(['"', '\\', '\r', '\n'], "_");
        format!("{kind}; filename=\"{name}\"")
    }

    /// Write headers, a blank line, then the body.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "Content-Type: {}\r\n", self.content_type())?;
        write!(out, "Content-Disposition: {}\r\n", self.content_disposition())?;
        write!(out, "Content-Length: {}\r\n\r\n", self.body.len())?;
        out.write_all(&self.body)?;
        out.flush()
    }
}

/// What [`PdfEngine::output`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Bytes(Vec<u8>),
    Saved(PathBuf),
    Response(Response),
}

impl Output {
    /// The PDF bytes, when the output carries them.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Output::Bytes(bytes) => Some(bytes),
            Output::Response(response) => Some(response.body),
            Output::Saved(_) => None,
        }
    }
}

/// One engine session.
pub trait PdfEngine {
    fn set_show_image_errors(&mut self, state: bool);
    fn set_debug(&mut self, state: bool);
    /// Must run before HTML that uses fonts from `dir` is written.
    fn add_font_directory(&mut self, dir: &Path) -> Result<(), EngineError>;
    fn set_title(&mut self, title: &str);
    fn set_logger(&mut self, logger: Arc<dyn LogSink>);
    fn set_html_header(&mut self, html: &str) -> Result<(), EngineError>;
    fn set_html_footer(&mut self, html: &str) -> Result<(), EngineError>;
    fn write_html(&mut self, html: &str) -> Result<(), EngineError>;
    fn output(
        &mut self,
        file_name: Option<&str>,
        destination: Option<Destination>,
    ) -> Result<Output, EngineError>;
}

/// Builds engine sessions from a render config.
pub trait EngineFactory {
    fn create(&self, config: &RenderConfig) -> Result<Box<dyn PdfEngine>, EngineError>;
}

/// Route finished PDF bytes to their destination.
///
/// File output is staged in `temp_dir` and then moved into place, so a
/// failed write never leaves a truncated document at the target path.
pub fn deliver(
    bytes: Vec<u8>,
    file_name: Option<&str>,
    destination: Option<Destination>,
    temp_dir: &Path,
) -> Result<Output, EngineError> {
    let (name, destination) = resolve_destination(file_name, destination);
    match destination {
        Destination::String => Ok(Output::Bytes(bytes)),
        Destination::Inline | Destination::Download => Ok(Output::Response(Response {
            file_name: name,
            disposition: if destination == Destination::Inline {
                Disposition::Inline
            } else {
                Disposition::Attachment
            },
            body: bytes,
        })),
        Destination::File => {
            let target = PathBuf::from(name);
            write_staged(&bytes, &target, temp_dir)?;
            Ok(Output::Saved(target))
        }
    }
}

fn write_staged(bytes: &[u8], target: &Path, temp_dir: &Path) -> Result<(), EngineError> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let staged_name = format!(
        ".{}.{}.part",
        target
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(DEFAULT_FILE_NAME),
        std::process::id()
    );

    if fs::create_dir_all(temp_dir).is_err() {
        log::debug!("temp dir {} unavailable, writing in place", temp_dir.display());
        fs::write(target, bytes)?;
        return Ok(());
    }

    let staged = temp_dir.join(staged_name);
    fs::write(&staged, bytes)?;
    if fs::rename(&staged, target).is_err() {
        // Different filesystem: copy instead.
        let copied = fs::copy(&staged, target);
        let _ = fs::remove_file(&staged);
        copied?;
    }
    Ok(())
}
