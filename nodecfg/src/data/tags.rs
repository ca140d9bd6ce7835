//! Schema tags and attribute names.

/// Integer value.
pub const INTEGER: &str = "INTEGER-VALUE";
/// Floating-point value.
pub const DOUBLE: &str = "DOUBLE-VALUE";
/// Free text value.
pub const STRING: &str = "STRING-VALUE";
/// Path to an existing file.
pub const FILE_PATH: &str = "FILE-PATH-VALUE";
/// Path to an existing directory.
pub const DIR_PATH: &str = "DIR-PATH-VALUE";
/// Reference to another node of the same tree.
pub const XML_REF: &str = "XML-NODE-REF";
/// One value out of a declared set.
pub const ENUM: &str = "ENUM-VALUE";
/// Plain grouping of fields.
pub const BRANCH: &str = "BRANCH";
/// Exactly one of several alternatives.
pub const CHOICE: &str = "CHOICE";
/// One alternative of a choice.
pub const CHOICE_ELEMENT: &str = "CHOICE-ELEMENT";
/// Repeated group of fields.
pub const MULTI_VALUED: &str = "MULTI-VALUED";

/// Node name, required on every schema element.
pub const ATTR_NAME: &str = "name";
/// Default value.
pub const ATTR_DEFAULT: &str = "default";
/// Free-form annotation.
pub const ATTR_COMMENT: &str = "comment";
/// Inclusive numeric lower bound.
pub const ATTR_MIN: &str = "min";
/// Inclusive numeric upper bound.
pub const ATTR_MAX: &str = "max";
/// `|`-separated enumeration values.
pub const ATTR_VALUES: &str = "values";
/// Base path of a cross-reference.
pub const ATTR_HANGING_FROM: &str = "hanging-from";
/// Lower bound on multi-valued item count.
pub const ATTR_MIN_ITEMS: &str = "min-items";

/// Separator between values of [`ATTR_VALUES`].
pub const VALUES_SEPARATOR: char = '|';

/// Variant selected by a schema tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// [`INTEGER`]
    Integer,
    /// [`DOUBLE`]
    Double,
    /// [`STRING`]
    String,
    /// [`FILE_PATH`]
    FilePath,
    /// [`DIR_PATH`]
    DirPath,
    /// [`XML_REF`]
    XmlRef,
    /// [`ENUM`]
    Enum,
    /// [`BRANCH`]
    Branch,
    /// [`CHOICE`]
    Choice,
    /// [`CHOICE_ELEMENT`]
    ChoiceElement,
    /// [`MULTI_VALUED`]
    MultiValued,
}

const TAG_TABLE: [(&str, Tag); 11] = [
    (INTEGER, Tag::Integer),
    (DOUBLE, Tag::Double),
    (STRING, Tag::String),
    (FILE_PATH, Tag::FilePath),
    (DIR_PATH, Tag::DirPath),
    (XML_REF, Tag::XmlRef),
    (ENUM, Tag::Enum),
    (BRANCH, Tag::Branch),
    (CHOICE, Tag::Choice),
    (CHOICE_ELEMENT, Tag::ChoiceElement),
    (MULTI_VALUED, Tag::MultiValued),
];

impl Tag {
    /// Look up the variant for a schema tag.
    pub fn from_tag(tag: &str) -> Option<Tag> {
        TAG_TABLE.iter().find(|(t, _)| *t == tag).map(|(_, v)| *v)
    }

    /// The schema tag text.
    pub fn as_str(&self) -> &'static str {
        TAG_TABLE
            .iter()
            .find(|(_, v)| v == self)
            .map(|(t, _)| *t)
            .unwrap_or_default()
    }

    /// Whether nodes of this variant own children.
    pub fn is_nested(&self) -> bool {
        matches!(
            self,
            Tag::Branch | Tag::Choice | Tag::ChoiceElement | Tag::MultiValued
        )
    }
}
