//! is-composing XML documents (RFC 3994)
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <isComposing xmlns="urn:ietf:params:xml:ns:im-iscomposing">
//!   <state>active</state>
//!   <contenttype>text/plain</contenttype>
//!   <refresh>60</refresh>
//! </isComposing>
//! ```

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};

use crate::errors::{ComposingError, ComposingResult};

/// MIME type of the payload
pub const CONTENT_TYPE: &str = "application/im-iscomposing+xml";

/// Namespace of the `isComposing` root element
pub const NAMESPACE: &str = "urn:ietf:params:xml:ns:im-iscomposing";

const ROOT: &str = "isComposing";

/// Composing state carried by `<state>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ComposingMode {
    #[default]
    Idle,
    Active,
}

impl ComposingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComposingMode::Idle => "idle",
            ComposingMode::Active => "active",
        }
    }
}

impl fmt::Display for ComposingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComposingMode {
    type Err = ComposingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "active" => Ok(ComposingMode::Active),
            "idle" => Ok(ComposingMode::Idle),
            other => Err(ComposingError::UnknownState(other.to_string())),
        }
    }
}

/// One is-composing document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposingIndication {
    pub state: ComposingMode,

    /// Kind of message being composed
    pub content_type: Option<String>,

    /// Seconds until the sender refreshes an `active` state
    pub refresh: Option<u64>,

    /// Time of the last activity, verbatim
    pub last_active: Option<String>,
}

impl ComposingIndication {
    /// `active`, refreshed every `refresh` seconds
    pub fn active(refresh: u64) -> Self {
        Self {
            state: ComposingMode::Active,
            content_type: Some("text/plain".to_string()),
            refresh: Some(refresh),
            last_active: None,
        }
    }

    pub fn idle() -> Self {
        Self {
            state: ComposingMode::Idle,
            content_type: Some("text/plain".to_string()),
            refresh: None,
            last_active: None,
        }
    }

    /// Render the XML document
    pub fn to_xml(&self) -> ComposingResult<String> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(ComposingError::xml)?;

        let mut root = BytesStart::new(ROOT);
        root.push_attribute(("xmlns", NAMESPACE));
        writer.write_event(Event::Start(root)).map_err(ComposingError::xml)?;

        write_text_element(&mut writer, "state", self.state.as_str())?;
        if let Some(last_active) = &self.last_active {
            write_text_element(&mut writer, "lastactive", last_active)?;
        }
        if let Some(content_type) = &self.content_type {
            write_text_element(&mut writer, "contenttype", content_type)?;
        }
        if let Some(refresh) = self.refresh {
            write_text_element(&mut writer, "refresh", &refresh.to_string())?;
        }

        writer
            .write_event(Event::End(BytesStart::new(ROOT).to_end()))
            .map_err(ComposingError::xml)?;

        String::from_utf8(writer.into_inner().into_inner()).map_err(ComposingError::xml)
    }

    /// Parse an XML document
    ///
    /// Namespace prefixes are ignored; unknown elements are skipped. The
    /// document must have an `isComposing` root and a `state` element.
    pub fn from_xml(xml: &str) -> ComposingResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut seen_root = false;
        let mut depth = 0usize;
        let mut current: Option<Vec<u8>> = None;
        let mut state = None;
        let mut content_type = None;
        let mut refresh = None;
        let mut last_active = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    depth += 1;
                    let name = e.local_name().as_ref().to_vec();
                    if !seen_root {
                        if name != ROOT.as_bytes() {
                            return Err(ComposingError::malformed(format!(
                                "unexpected root element '{}'",
                                String::from_utf8_lossy(&name)
                            )));
                        }
                        seen_root = true;
                    } else {
                        current = Some(name);
                    }
                }
                Ok(Event::Text(ref e)) => {
                    let text = e.unescape().map_err(ComposingError::xml)?.to_string();
                    match current.as_deref() {
                        Some(b"state") => state = Some(text.parse::<ComposingMode>()?),
                        Some(b"contenttype") => content_type = Some(text),
                        Some(b"refresh") => {
                            refresh = Some(text.parse::<u64>().map_err(|_| {
                                ComposingError::malformed(format!("invalid refresh '{}'", text))
                            })?)
                        }
                        Some(b"lastactive") => last_active = Some(text),
                        _ => {}
                    }
                }
                Ok(Event::End(_)) => {
                    depth = depth.saturating_sub(1);
                    current = None;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(ComposingError::xml(e)),
            }
        }

        if !seen_root {
            return Err(ComposingError::malformed("empty document"));
        }
        if depth != 0 {
            return Err(ComposingError::malformed("unterminated document"));
        }
        let state = state.ok_or_else(|| ComposingError::malformed("missing <state>"))?;

        Ok(Self { state, content_type, refresh, last_active })
    }
}

fn write_text_element(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, text: &str) -> ComposingResult<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(ComposingError::xml)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(ComposingError::xml)?;
    writer
        .write_event(Event::End(BytesStart::new(name).to_end()))
        .map_err(ComposingError::xml)?;
    Ok(())
}

/// Payload announcing `active` or `idle`
pub fn marshal(is_composing: bool, refresh_secs: u64) -> ComposingResult<String> {
    let indication = if is_composing {
        ComposingIndication::active(refresh_secs)
    } else {
        ComposingIndication::idle()
    };
    indication.to_xml()
}

/// Parse a received payload
pub fn parse(content: &str) -> ComposingResult<ComposingIndication> {
    ComposingIndication::from_xml(content)
}
