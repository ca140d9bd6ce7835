use std::str::FromStr;

use serde_json::Value;

use crate::{
    data::tags::{self, Tag},
    options::BuildOptions,
    xml::Element,
};

/// Type information of a value node.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    /// Signed integer with optional inclusive bounds.
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    /// Finite floating-point number with optional inclusive bounds.
    Double {
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Non-empty text.
    String,
    /// Path to an existing file.
    FilePath,
    /// Path to an existing directory.
    DirPath,
    /// Path of another node in the same tree.
    XmlRef { hanging_from: Option<String> },
    /// One of a declared set of values.
    Enum(EnumValue),
}

/// Declared set of an enumerated value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    /// Allowed values in declaration order.
    pub variants: Vec<String>,
}

impl EnumValue {
    /// Parse the `values` attribute.
    pub fn from_attr(values: Option<&str>) -> Self {
        let variants = values
            .map(|v| {
                v.split(tags::VALUES_SEPARATOR)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self { variants }
    }

    /// Index of `value` among the variants.
    pub fn position(&self, value: &str) -> Option<usize> {
        self.variants.iter().position(|v| v == value)
    }
}

/// Environment a value check runs in.
pub struct CheckEnv<'a> {
    /// Options used to resolve relative paths.
    pub options: &'a BuildOptions,
    /// Whether a node path resolves inside the checked node's tree.
    pub resolves: &'a dyn Fn(&str) -> bool,
}

fn bound<T: FromStr>(def: &Element, key: &str) -> Option<T> {
    let raw = def.attr(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(
                "ignoring unparsable {key}={raw:?} on {:?}",
                def.attr(tags::ATTR_NAME).unwrap_or_default()
            );
            None
        }
    }
}

fn in_range<T: PartialOrd>(v: T, min: Option<T>, max: Option<T>) -> bool {
    min.is_none_or(|m| v >= m) && max.is_none_or(|m| v <= m)
}

impl ValueKind {
    /// Build the value kind of a value tag from its schema element.
    ///
    /// Returns `None` for structural tags.
    pub fn from_schema(tag: Tag, def: &Element) -> Option<Self> {
        let kind = match tag {
            Tag::Integer => ValueKind::Integer {
                min: bound(def, tags::ATTR_MIN),
                max: bound(def, tags::ATTR_MAX),
            },
            Tag::Double => ValueKind::Double {
                min: bound(def, tags::ATTR_MIN),
                max: bound(def, tags::ATTR_MAX),
            },
            Tag::String => ValueKind::String,
            Tag::FilePath => ValueKind::FilePath,
            Tag::DirPath => ValueKind::DirPath,
            Tag::XmlRef => ValueKind::XmlRef {
                hanging_from: def.attr(tags::ATTR_HANGING_FROM).map(str::to_string),
            },
            Tag::Enum => ValueKind::Enum(EnumValue::from_attr(def.attr(tags::ATTR_VALUES))),
            Tag::Branch | Tag::Choice | Tag::ChoiceElement | Tag::MultiValued => return None,
        };
        Some(kind)
    }

    /// Schema tag of this kind.
    pub fn tag(&self) -> Tag {
        match self {
            ValueKind::Integer { .. } => Tag::Integer,
            ValueKind::Double { .. } => Tag::Double,
            ValueKind::String => Tag::String,
            ValueKind::FilePath => Tag::FilePath,
            ValueKind::DirPath => Tag::DirPath,
            ValueKind::XmlRef { .. } => Tag::XmlRef,
            ValueKind::Enum(_) => Tag::Enum,
        }
    }

    /// Check `content` against this kind.
    ///
    /// Missing files and unresolvable references are plain `false`, never
    /// errors.
    pub fn check(&self, content: &str, env: &CheckEnv<'_>) -> bool {
        match self {
            ValueKind::Integer { min, max } => content
                .trim()
                .parse::<i64>()
                .is_ok_and(|v| in_range(v, *min, *max)),
            ValueKind::Double { min, max } => content
                .trim()
                .parse::<f64>()
                .is_ok_and(|v| v.is_finite() && in_range(v, *min, *max)),
            ValueKind::String => !content.is_empty(),
            ValueKind::FilePath => {
                !content.is_empty() && env.options.resolve_path(content).is_file()
            }
            ValueKind::DirPath => !content.is_empty() && env.options.resolve_path(content).is_dir(),
            ValueKind::XmlRef { hanging_from } => {
                !content.is_empty()
                    && (env.resolves)(&reference_target(hanging_from.as_deref(), content))
            }
            ValueKind::Enum(e) => e.position(content).is_some(),
        }
    }

    /// Render `content` as JSON, typed when it parses.
    pub fn as_json(&self, content: &str) -> Value {
        match self {
            ValueKind::Integer { .. } => match content.trim().parse::<i64>() {
                Ok(v) => Value::Number(v.into()),
                Err(_) => Value::String(content.to_string()),
            },
            ValueKind::Double { .. } => content
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(content.to_string())),
            _ => Value::String(content.to_string()),
        }
    }
}

/// Absolute node path a cross-reference points to.
pub fn reference_target(hanging_from: Option<&str>, content: &str) -> String {
    match hanging_from {
        Some(base) if !content.starts_with('/') => {
            format!("{}/{}", base.trim_end_matches('/'), content)
        }
        _ => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(kind: &ValueKind, content: &str) -> bool {
        let options = BuildOptions::default();
        let resolves = |p: &str| p == "/root/target";
        let env = CheckEnv {
            options: &options,
            resolves: &resolves,
        };
        kind.check(content, &env)
    }

    #[test]
    fn test_integer_check() {
        let def = Element::new(tags::INTEGER)
            .with_attr("name", "n")
            .with_attr("min", "1")
            .with_attr("max", "10");
        let kind = ValueKind::from_schema(Tag::Integer, &def).unwrap();
        assert!(check(&kind, "3"));
        assert!(check(&kind, " 10 "));
        assert!(!check(&kind, "0"));
        assert!(!check(&kind, "11"));
        assert!(!check(&kind, "3.5"));
        assert!(!check(&kind, ""));
    }

    #[test]
    fn test_double_check() {
        let def = Element::new(tags::DOUBLE).with_attr("min", "0");
        let kind = ValueKind::from_schema(Tag::Double, &def).unwrap();
        assert!(check(&kind, "0.25"));
        assert!(check(&kind, "1e-3"));
        assert!(!check(&kind, "-0.5"));
        assert!(!check(&kind, "NaN"));
        assert!(!check(&kind, "abc"));
    }

    #[test]
    fn test_unparsable_bound_is_ignored() {
        let def = Element::new(tags::INTEGER).with_attr("max", "lots");
        let kind = ValueKind::from_schema(Tag::Integer, &def).unwrap();
        assert_eq!(kind, ValueKind::Integer { min: None, max: None });
    }

    #[test]
    fn test_enum_check() {
        let def = Element::new(tags::ENUM).with_attr("values", "sgd | adam|rmsprop");
        let kind = ValueKind::from_schema(Tag::Enum, &def).unwrap();
        assert!(check(&kind, "adam"));
        assert!(!check(&kind, "Adam"));
        assert!(!check(&kind, ""));
    }

    #[test]
    fn test_reference_check() {
        let kind = ValueKind::XmlRef {
            hanging_from: Some("/root".to_string()),
        };
        assert!(check(&kind, "target"));
        assert!(check(&kind, "/root/target"));
        assert!(!check(&kind, "other"));
        assert!(!check(&kind, ""));
    }

    #[test]
    fn test_path_checks() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("present.cfg");
        std::fs::write(&file, "x").unwrap();

        let options = BuildOptions {
            base_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let resolves = |_: &str| false;
        let env = CheckEnv {
            options: &options,
            resolves: &resolves,
        };
        assert!(ValueKind::FilePath.check("present.cfg", &env));
        assert!(!ValueKind::FilePath.check("missing.cfg", &env));
        assert!(!ValueKind::FilePath.check(".", &env));
        assert!(ValueKind::DirPath.check(".", &env));
        assert!(!ValueKind::DirPath.check("present.cfg", &env));
    }

    #[test]
    fn test_as_json() {
        let int = ValueKind::Integer { min: None, max: None };
        assert_eq!(int.as_json("7"), Value::from(7));
        assert_eq!(int.as_json("x"), Value::from("x"));
        let dbl = ValueKind::Double { min: None, max: None };
        assert_eq!(dbl.as_json("0.5"), Value::from(0.5));
        assert_eq!(ValueKind::String.as_json("hi"), Value::from("hi"));
    }
}
