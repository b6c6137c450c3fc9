//! Option trees, such as the map generator options owned by the server.

use crate::element::{DecodeError, Element, ElementCodec};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Typed option value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionValue {
    /// `true` / `false`.
    Boolean(bool),
    /// Signed integer, optionally bounded by the owning [`GameOption`].
    Integer(i64),
    /// Free text.
    Text(String),
}

impl OptionValue {
    /// Attribute name of the value kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            OptionValue::Boolean(_) => "boolean",
            OptionValue::Integer(_) => "integer",
            OptionValue::Text(_) => "text",
        }
    }

    fn parse(kind: &str, raw: &str) -> Result<Self, String> {
        match kind {
            "boolean" => raw
                .parse()
                .map(OptionValue::Boolean)
                .map_err(|err| format!("{err}")),
            "integer" => raw
                .parse()
                .map(OptionValue::Integer)
                .map_err(|err| format!("{err}")),
            "text" => Ok(OptionValue::Text(raw.to_string())),
            other => Err(format!("unknown option kind {other}")),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Boolean(value) => write!(f, "{value}"),
            OptionValue::Integer(value) => write!(f, "{value}"),
            OptionValue::Text(value) => f.write_str(value),
        }
    }
}

/// One named option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOption {
    /// Option identifier such as `model.option.landMass`.
    pub id: String,
    /// Current value.
    pub value: OptionValue,
    /// Inclusive bounds for integer options.
    pub range: Option<(i64, i64)>,
}

impl GameOption {
    /// Boolean option.
    pub fn boolean(id: impl Into<String>, value: bool) -> Self {
        Self {
            id: id.into(),
            value: OptionValue::Boolean(value),
            range: None,
        }
    }

    /// Bounded integer option.
    pub fn integer(id: impl Into<String>, value: i64, min: i64, max: i64) -> Self {
        Self {
            id: id.into(),
            value: OptionValue::Integer(value),
            range: Some((min, max)),
        }
    }

    /// Text option.
    pub fn text(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: OptionValue::Text(value.into()),
            range: None,
        }
    }
}

impl ElementCodec for GameOption {
    const TAG: &'static str = "option";

    fn to_element(&self) -> Element {
        Element::new(Self::TAG)
            .with_attr("id", &self.id)
            .with_attr("kind", self.value.kind())
            .with_attr("value", &self.value)
            .with_opt_attr("min", self.range.map(|(min, _)| min))
            .with_opt_attr("max", self.range.map(|(_, max)| max))
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        element.expect_tag(Self::TAG)?;
        let kind = element.required_attr("kind")?;
        let raw = element.required_attr("value")?;
        let value =
            OptionValue::parse(kind, raw).map_err(|reason| DecodeError::InvalidAttribute {
                tag: Self::TAG.to_string(),
                attribute: "value".to_string(),
                value: raw.to_string(),
                reason,
            })?;
        let min = element.parse_opt_attr::<i64>("min")?;
        let max = element.parse_opt_attr::<i64>("max")?;
        Ok(Self {
            id: element.required_attr("id")?.to_string(),
            value,
            range: min.zip(max),
        })
    }
}

/// Why an incoming option tree could not be merged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// The incoming tree names another group.
    #[error("option group mismatch: expected {expected}, found {found}")]
    GroupMismatch {
        /// Authoritative group id.
        expected: String,
        /// Incoming group id.
        found: String,
    },
    /// The incoming tree names an option the authority does not have.
    #[error("unknown option {0}")]
    UnknownOption(String),
    /// The incoming value has a different kind.
    #[error("option {id} is {expected}, not {found}")]
    KindMismatch {
        /// Option id.
        id: String,
        /// Authoritative kind.
        expected: &'static str,
        /// Incoming kind.
        found: &'static str,
    },
    /// The incoming integer lies outside the option's bounds.
    #[error("option {id} value {value} outside {min}..={max}")]
    OutOfRange {
        /// Option id.
        id: String,
        /// Rejected value.
        value: i64,
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },
}

/// Named, ordered group of options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionGroup {
    /// Group identifier such as `model.option.mapGeneratorOptions`.
    pub id: String,
    /// Options in declaration order.
    pub options: Vec<GameOption>,
}

impl OptionGroup {
    /// Empty group.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            options: Vec::new(),
        }
    }

    /// Builder appending an option.
    pub fn with_option(mut self, option: GameOption) -> Self {
        self.options.push(option);
        self
    }

    /// Look up an option by id.
    pub fn get(&self, id: &str) -> Option<&GameOption> {
        self.options.iter().find(|option| option.id == id)
    }

    /// Merge the values of `incoming` into this group.
    ///
    /// Every incoming option is checked before anything is written, so a
    /// failed merge leaves the group untouched. Bounds always come from the
    /// authoritative copy.
    pub fn merge(&mut self, incoming: &OptionGroup) -> Result<(), MergeError> {
        if incoming.id != self.id {
            return Err(MergeError::GroupMismatch {
                expected: self.id.clone(),
                found: incoming.id.clone(),
            });
        }

        let mut updates = Vec::with_capacity(incoming.options.len());
        for option in &incoming.options {
            let index = self
                .options
                .iter()
                .position(|held| held.id == option.id)
                .ok_or_else(|| MergeError::UnknownOption(option.id.clone()))?;
            let held = &self.options[index];
            if held.value.kind() != option.value.kind() {
                return Err(MergeError::KindMismatch {
                    id: option.id.clone(),
                    expected: held.value.kind(),
                    found: option.value.kind(),
                });
            }
            if let (OptionValue::Integer(value), Some((min, max))) = (&option.value, held.range) {
                if !(min..=max).contains(value) {
                    return Err(MergeError::OutOfRange {
                        id: option.id.clone(),
                        value: *value,
                        min,
                        max,
                    });
                }
            }
            updates.push((index, option.value.clone()));
        }

        for (index, value) in updates {
            self.options[index].value = value;
        }
        Ok(())
    }
}

impl ElementCodec for OptionGroup {
    const TAG: &'static str = "optionGroup";

    fn to_element(&self) -> Element {
        Element::new(Self::TAG)
            .with_attr("id", &self.id)
            .with_children(self.options.iter().map(GameOption::to_element))
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        element.expect_tag(Self::TAG)?;
        Ok(Self {
            id: element.required_attr("id")?.to_string(),
            options: element.children_as()?,
        })
    }
}
