use std::{path::Path, sync::Arc};

use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};

use super::Element;
use crate::error::{Error, Result};

/// Parse an XML document into an [`Element`] tree.
///
/// Text of leaf elements is kept exactly as written. Whitespace-only text
/// between child elements is dropped. Declarations, comments and processing
/// instructions are ignored.
///
/// # Errors
///
/// Returns an error on malformed XML, unclosed elements or an empty document.
pub fn parse(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => stack.push(open(e)?),
            Event::Empty(ref e) => {
                let elem = open(e)?;
                close(elem, &mut stack, &mut root);
            }
            Event::End(_) => {
                if let Some(elem) = stack.pop() {
                    close(elem, &mut stack, &mut root);
                }
            }
            Event::Text(ref t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(ref c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(unclosed) = stack.pop() {
        return Err(Error::UnclosedElement(unclosed.tag));
    }
    root.ok_or(Error::EmptyDocument)
}

/// Read and parse an XML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid XML.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Element> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse(&content)
}

fn open(e: &BytesStart) -> Result<Element> {
    let mut elem = Element::new(String::from_utf8_lossy(e.name().as_ref()));
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        elem.attributes.push((key, value));
    }
    Ok(elem)
}

fn close(mut elem: Element, stack: &mut [Element], root: &mut Option<Element>) {
    if !elem.children.is_empty() && elem.text.trim().is_empty() {
        elem.text.clear();
    }
    match stack.last_mut() {
        Some(parent) => parent.children.push(Arc::new(elem)),
        None => {
            if root.is_none() {
                *root = Some(elem);
            } else {
                warn!("ignoring extra top-level element <{}>", elem.tag);
            }
        }
    }
}
