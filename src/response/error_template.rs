//! XML error document
//!
//! The template is an arbitrary XML document whose root element contains a
//! `<response-status>` element with `<code>` and `<message>` children. Those
//! two elements get their text replaced on every render; everything else is
//! copied through unchanged.

use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Template used when no `errorResponse.xml` is configured
pub const DEFAULT_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<response>
  <response-status>
    <code>0</code>
    <message></message>
  </response-status>
</response>
"#;

const STATUS_ELEMENT: &[u8] = b"response-status";
const CODE_ELEMENT: &[u8] = b"code";
const MESSAGE_ELEMENT: &[u8] = b"message";

/// Template errors
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to read error template {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Malformed error template: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Error template has no response-status/{0} element")]
    MissingElement(&'static str),

    #[error("Failed to write error document: {0}")]
    Write(#[from] io::Error),
}

/// Loaded error response template
#[derive(Debug, Clone)]
pub struct ErrorTemplate {
    source: Arc<str>,
}

impl Default for ErrorTemplate {
    fn default() -> Self {
        Self {
            source: Arc::from(DEFAULT_TEMPLATE),
        }
    }
}

impl ErrorTemplate {
    /// Parse and validate a template document
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let template = Self {
            source: Arc::from(source),
        };
        template.render(0, "")?;
        Ok(template)
    }

    /// Read a template file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source)
    }

    /// Configured template, or the built-in one when `path` is `None`
    pub fn from_config(path: Option<&Path>) -> Result<Self, TemplateError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Render the document with `code` and `message` filled in
    pub fn render(&self, code: u16, message: &str) -> Result<String, TemplateError> {
        let mut reader = Reader::from_str(&self.source);
        let mut writer = Writer::new(Vec::with_capacity(self.source.len() + message.len()));

        let code = code.to_string();
        let mut stack: Vec<Vec<u8>> = Vec::new();
        // Depth of the element whose content is being replaced
        let mut replacing: Option<usize> = None;
        let mut wrote_code = false;
        let mut wrote_message = false;

        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::Start(start) => {
                    let name = start.name().as_ref().to_vec();
                    if replacing.is_some() {
                        stack.push(name);
                        continue;
                    }

                    let slot = slot_for(&stack, &name);
                    stack.push(name);
                    writer.write_event(Event::Start(start))?;

                    if let Some(slot) = slot {
                        let text = match slot {
                            Slot::Code => {
                                wrote_code = true;
                                code.as_str()
                            }
                            Slot::Message => {
                                wrote_message = true;
                                message
                            }
                        };
                        writer.write_event(Event::Text(BytesText::new(text)))?;
                        replacing = Some(stack.len());
                    }
                }
                Event::End(end) => {
                    let depth = stack.len();
                    stack.pop();
                    match replacing {
                        Some(d) if depth > d => continue,
                        Some(_) => replacing = None,
                        None => {}
                    }
                    writer.write_event(Event::End(end))?;
                }
                Event::Empty(empty) => {
                    if replacing.is_some() {
                        continue;
                    }
                    let name = empty.name().as_ref().to_vec();
                    match slot_for(&stack, &name) {
                        Some(slot) => {
                            let text = match slot {
                                Slot::Code => {
                                    wrote_code = true;
                                    code.as_str()
                                }
                                Slot::Message => {
                                    wrote_message = true;
                                    message
                                }
                            };
                            writer.write_event(Event::Start(empty.clone()))?;
                            writer.write_event(Event::Text(BytesText::new(text)))?;
                            writer.write_event(Event::End(empty.to_end()))?;
                        }
                        None => writer.write_event(Event::Empty(empty))?,
                    }
                }
                other => {
                    if replacing.is_none() {
                        writer.write_event(other)?;
                    }
                }
            }
        }

        if !wrote_code {
            return Err(TemplateError::MissingElement("code"));
        }
        if !wrote_message {
            return Err(TemplateError::MissingElement("message"));
        }

        String::from_utf8(writer.into_inner())
            .map_err(|e| TemplateError::Write(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

enum Slot {
    Code,
    Message,
}

/// Which value goes into `name` given its ancestors (root first)
fn slot_for(ancestors: &[Vec<u8>], name: &[u8]) -> Option<Slot> {
    if ancestors.len() != 2 || ancestors[1] != STATUS_ELEMENT {
        return None;
    }
    match name {
        CODE_ELEMENT => Some(Slot::Code),
        MESSAGE_ELEMENT => Some(Slot::Message),
        _ => None,
    }
}
