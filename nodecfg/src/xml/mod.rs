//! Abstract element trees.
//!
//! Both inputs of the node factory use this shape: the schema (tag = type
//! tag, attributes = `name`/`default`/`comment`/...) and the prior-value tree
//! of a saved configuration (tag = node name, text = content). Children are
//! held behind [`Arc`] so config nodes can keep their schema definition alive
//! without copying the subtree.

use std::sync::Arc;

mod parse;

pub use parse::{parse, parse_file};

/// One element of a parsed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    /// Element tag.
    pub tag: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Concatenated, unescaped text content.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<Arc<Element>>,
}

impl Element {
    /// Create an empty element with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Builder-style text setter.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    /// Value of the attribute `key`, if present.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&Arc<Element>> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// All children with the given tag, in document order.
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Arc<Element>> {
        self.children.iter().filter(move |c| c.tag == tag)
    }
}
