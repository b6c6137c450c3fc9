//! Hierarchical tagged elements.
//!
//! Every message and every embedded model snapshot is carried as an
//! [`Element`]: a tag name, an ordered list of string attributes and an
//! ordered list of child elements. Attribute and child order are preserved
//! exactly, so encoding the same value twice yields identical output.

use crate::id::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failure to reconstruct a value from an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The element carried a different tag than the decoder expects.
    #[error("expected <{expected}>, found <{found}>")]
    UnexpectedTag {
        /// Tag the decoder accepts.
        expected: String,
        /// Tag actually present.
        found: String,
    },
    /// A required attribute with no declared default was absent.
    #[error("<{tag}> is missing required attribute {attribute:?}")]
    MissingAttribute {
        /// Element tag.
        tag: String,
        /// Attribute name.
        attribute: String,
    },
    /// An attribute was present but could not be parsed.
    #[error("<{tag}> attribute {attribute:?}={value:?} is invalid: {reason}")]
    InvalidAttribute {
        /// Element tag.
        tag: String,
        /// Attribute name.
        attribute: String,
        /// Raw attribute value.
        value: String,
        /// Parser message.
        reason: String,
    },
    /// A child at a fixed position was required but absent.
    #[error("<{tag}> is missing child #{index}")]
    MissingChild {
        /// Parent element tag.
        tag: String,
        /// Zero-based child index.
        index: usize,
    },
    /// No message variant is registered under this tag.
    #[error("unknown message <{tag}>")]
    UnknownMessage {
        /// Offending tag.
        tag: String,
    },
    /// The value decoded but broke a protocol limit.
    #[error("<{tag}> rejected: {reason}")]
    Limit {
        /// Element tag.
        tag: String,
        /// Violated limit.
        reason: String,
    },
}

/// Values with a canonical element form and a fixed tag.
///
/// Implemented by model snapshots (goods, option groups, high scores, units)
/// and by every message variant.
pub trait ElementCodec: Sized {
    /// Tag name of the root element.
    const TAG: &'static str;

    /// Encode into an element. Must be deterministic.
    fn to_element(&self) -> Element;

    /// Decode from an element carrying [`Self::TAG`].
    fn from_element(element: &Element) -> Result<Self, DecodeError>;
}

/// A named element with string attributes and ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Element {
    /// Create an empty element.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attributes in encoding order.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Children in encoding order.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Mutable access to the children.
    pub fn children_mut(&mut self) -> &mut Vec<Element> {
        &mut self.children
    }

    /// Builder form of [`Element::set_attr`].
    pub fn with_attr(mut self, name: &str, value: impl ToString) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder that only sets the attribute when `value` is present.
    pub fn with_opt_attr<V: ToString>(mut self, name: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.set_attr(name, value);
        }
        self
    }

    /// Set an attribute. An existing attribute keeps its position.
    pub fn set_attr(&mut self, name: &str, value: impl ToString) {
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => *slot = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Remove an attribute, returning its value.
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(index).1)
    }

    /// Builder form of [`Element::push_child`].
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Builder appending several children.
    pub fn with_children<I: IntoIterator<Item = Element>>(mut self, children: I) -> Self {
        self.children.extend(children);
        self
    }

    /// Append a child.
    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Raw attribute lookup.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute that must be present.
    pub fn required_attr(&self, name: &str) -> Result<&str, DecodeError> {
        self.attr(name).ok_or_else(|| DecodeError::MissingAttribute {
            tag: self.tag.clone(),
            attribute: name.to_string(),
        })
    }

    /// Attribute with a declared default.
    pub fn attr_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.attr(name).unwrap_or(default)
    }

    /// Parse a required attribute.
    pub fn parse_attr<T>(&self, name: &str) -> Result<T, DecodeError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.required_attr(name)?;
        self.parse_value(name, raw)
    }

    /// Parse an attribute, falling back to its declared default when absent.
    ///
    /// A present but malformed value is still an error.
    pub fn parse_attr_or<T>(&self, name: &str, default: T) -> Result<T, DecodeError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.attr(name) {
            Some(raw) => self.parse_value(name, raw),
            None => Ok(default),
        }
    }

    /// Parse an attribute that may legitimately be absent.
    pub fn parse_opt_attr<T>(&self, name: &str) -> Result<Option<T>, DecodeError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.attr(name)
            .map(|raw| self.parse_value(name, raw))
            .transpose()
    }

    /// Required identifier attribute.
    pub fn id_attr(&self, name: &str) -> Result<ObjectId, DecodeError> {
        self.parse_attr::<ObjectId>(name)
    }

    fn parse_value<T>(&self, name: &str, raw: &str) -> Result<T, DecodeError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        raw.parse::<T>().map_err(|err| DecodeError::InvalidAttribute {
            tag: self.tag.clone(),
            attribute: name.to_string(),
            value: raw.to_string(),
            reason: err.to_string(),
        })
    }

    /// Fail unless this element carries `expected`.
    pub fn expect_tag(&self, expected: &str) -> Result<(), DecodeError> {
        if self.tag == expected {
            Ok(())
        } else {
            Err(DecodeError::UnexpectedTag {
                expected: expected.to_string(),
                found: self.tag.clone(),
            })
        }
    }

    /// Decode the child at `index` as `T`.
    pub fn child_as<T: ElementCodec>(&self, index: usize) -> Result<T, DecodeError> {
        let child = self
            .children
            .get(index)
            .ok_or_else(|| DecodeError::MissingChild {
                tag: self.tag.clone(),
                index,
            })?;
        T::from_element(child)
    }

    /// Decode every child as `T`; any other tag is an error.
    pub fn children_as<T: ElementCodec>(&self) -> Result<Vec<T>, DecodeError> {
        self.children.iter().map(T::from_element).collect()
    }

    /// Nesting depth (a leaf has depth 1).
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Element::depth).max().unwrap_or(0)
    }
}

/// Markup rendering, used in logs and exact-output assertions.
impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (name, value) in &self.attributes {
            write!(f, " {}=\"{}\"", name, Escaped(value))?;
        }
        if self.children.is_empty() {
            return f.write_str("/>");
        }
        f.write_str(">")?;
        for child in &self.children {
            write!(f, "{child}")?;
        }
        write!(f, "</{}>", self.tag)
    }
}

struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ch in self.0.chars() {
            match ch {
                '&' => f.write_str("&amp;")?,
                '<' => f.write_str("&lt;")?,
                '>' => f.write_str("&gt;")?,
                '"' => f.write_str("&quot;")?,
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Marker {
        weight: u32,
    }

    impl ElementCodec for Marker {
        const TAG: &'static str = "marker";

        fn to_element(&self) -> Element {
            Element::new(Self::TAG).with_attr("weight", self.weight)
        }

        fn from_element(element: &Element) -> Result<Self, DecodeError> {
            element.expect_tag(Self::TAG)?;
            Ok(Self {
                weight: element.parse_attr_or("weight", 1)?,
            })
        }
    }

    #[test]
    fn attribute_order_is_insertion_order() {
        let element = Element::new("sample")
            .with_attr("b", 2)
            .with_attr("a", 1)
            .with_attr("b", 3);
        assert_eq!(element.to_string(), r#"<sample b="3" a="1"/>"#);
    }

    #[test]
    fn display_escapes_and_nests() {
        let element = Element::new("outer")
            .with_attr("text", "a<b & \"c\"")
            .with_child(Element::new("inner"));
        assert_eq!(
            element.to_string(),
            r#"<outer text="a&lt;b &amp; &quot;c&quot;"><inner/></outer>"#
        );
        assert_eq!(element.depth(), 2);
    }

    #[test]
    fn missing_attribute_without_default_is_error() {
        let element = Element::new("sample");
        let err = element.parse_attr::<u32>("count").unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingAttribute {
                tag: "sample".into(),
                attribute: "count".into(),
            }
        );
        assert_eq!(element.parse_attr_or::<u32>("count", 7).unwrap(), 7);
    }

    #[test]
    fn malformed_attribute_is_error_even_with_default() {
        let element = Element::new("sample").with_attr("count", "many");
        assert!(matches!(
            element.parse_attr_or::<u32>("count", 7),
            Err(DecodeError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn child_type_mismatch_is_error() {
        let element = Element::new("list")
            .with_child(Marker { weight: 4 }.to_element())
            .with_child(Element::new("intruder"));
        assert_eq!(element.child_as::<Marker>(0).unwrap(), Marker { weight: 4 });
        assert!(matches!(
            element.children_as::<Marker>(),
            Err(DecodeError::UnexpectedTag { .. })
        ));
        assert!(matches!(
            element.child_as::<Marker>(5),
            Err(DecodeError::MissingChild { index: 5, .. })
        ));
    }
}
