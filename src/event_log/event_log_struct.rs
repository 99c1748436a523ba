use serde::{Deserialize, Serialize};

use super::constants::ACTIVITY_NAME;

/// A value an [`Attribute`] can carry. Trimmed to the variants the
/// conformance core ever inspects (activity/case identifiers are always
/// strings); richer log formats map their own value types onto these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum AttributeValue {
    /// UTF-8 string value.
    String(String),
    /// Signed integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Boolean value.
    Boolean(bool),
    /// Nested list of attributes.
    List(Vec<Attribute>),
    /// No value.
    None,
}

impl AttributeValue {
    /// Borrows the string value, if this is a [`AttributeValue::String`].
    pub fn as_string(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A single key/value pair attached to an [`Event`] or [`Trace`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute key.
    pub key: String,
    /// Attribute value.
    pub value: AttributeValue,
}

impl Attribute {
    /// Builds a new attribute.
    pub fn new(key: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// An ordered bag of [`Attribute`]s.
pub type Attributes = Vec<Attribute>;

/// Lookup/insert convenience shared by [`Event`] and [`Trace`].
pub trait AttributeAddable {
    /// Returns the value for `key`, if present.
    fn get_attribute(&self, key: &str) -> Option<&AttributeValue>;
    /// Inserts or overwrites the value for `key`.
    fn set_attribute(&mut self, key: impl Into<String>, value: AttributeValue);
}

/// A single observed occurrence of an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Event {
    /// Attribute bag, always containing at least [`ACTIVITY_NAME`].
    pub attributes: Attributes,
}

impl Event {
    /// Builds an event whose activity name is `activity`.
    pub fn new(activity: impl Into<String>) -> Self {
        Event {
            attributes: vec![Attribute::new(
                ACTIVITY_NAME,
                AttributeValue::String(activity.into()),
            )],
        }
    }

    /// The event's activity label, or `""` if [`ACTIVITY_NAME`] is absent or
    /// not a string (the core never constructs such events itself, but
    /// tolerates logs imported from elsewhere).
    pub fn activity(&self) -> &str {
        self.get_attribute(ACTIVITY_NAME)
            .and_then(AttributeValue::as_string)
            .unwrap_or("")
    }
}

impl AttributeAddable for Event {
    fn get_attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.iter().find(|a| a.key == key).map(|a| &a.value)
    }

    fn set_attribute(&mut self, key: impl Into<String>, value: AttributeValue) {
        let key = key.into();
        if let Some(attr) = self.attributes.iter_mut().find(|a| a.key == key) {
            attr.value = value;
        } else {
            self.attributes.push(Attribute::new(key, value));
        }
    }
}

/// An ordered sequence of [`Event`]s observed for one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Trace {
    /// Case-level attributes.
    pub attributes: Attributes,
    /// The events, in observed order.
    pub events: Vec<Event>,
}

impl Trace {
    /// Builds an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// The trace's activities, in order, as borrowed strings.
    pub fn activities(&self) -> Vec<&str> {
        self.events.iter().map(Event::activity).collect()
    }
}

impl AttributeAddable for Trace {
    fn get_attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.iter().find(|a| a.key == key).map(|a| &a.value)
    }

    fn set_attribute(&mut self, key: impl Into<String>, value: AttributeValue) {
        let key = key.into();
        if let Some(attr) = self.attributes.iter_mut().find(|a| a.key == key) {
            attr.value = value;
        } else {
            self.attributes.push(Attribute::new(key, value));
        }
    }
}

/// An ordered multiset of [`Trace`]s. Duplicate traces are common and the
/// conformance core's cache hierarchy is built to exploit that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EventLog {
    /// Log-level attributes.
    pub attributes: Attributes,
    /// The traces, in their original order.
    pub traces: Vec<Trace>,
    /// Classifiers available for deriving an event's class identity.
    pub classifiers: Vec<EventLogClassifier>,
}

impl EventLog {
    /// Builds an empty event log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a classifier by name.
    pub fn get_classifier_by_name(&self, name: &str) -> Option<&EventLogClassifier> {
        self.classifiers.iter().find(|c| c.name == name)
    }
}

/// Derives an event's class identity by joining the string values of a
/// configured set of attribute keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogClassifier {
    /// Classifier name.
    pub name: String,
    /// Attribute keys whose values are joined, in order.
    pub keys: Vec<String>,
}

impl EventLogClassifier {
    /// Separator joining the values of a multi-key classifier.
    pub const DELIMITER: &'static str = "+";

    /// The default classifier: activity name alone.
    pub fn default_name_classifier() -> Self {
        EventLogClassifier {
            name: "Event Name".to_string(),
            keys: vec![ACTIVITY_NAME.to_string()],
        }
    }

    /// Joins the string values of `self.keys` for `event`.
    pub fn get_class_identity(&self, event: &Event) -> String {
        self.keys
            .iter()
            .filter_map(|key| event.get_attribute(key))
            .filter_map(AttributeValue::as_string)
            .collect::<Vec<_>>()
            .join(Self::DELIMITER)
    }
}

impl Default for EventLogClassifier {
    fn default() -> Self {
        Self::default_name_classifier()
    }
}
