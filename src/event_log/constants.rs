/// Key under which an event's activity label is stored.
pub const ACTIVITY_NAME: &str = "concept:name";

/// Prefix used by trace-level attributes copied from case attributes.
pub const TRACE_PREFIX: &str = "case:";

/// Key under which a trace's case id is stored.
pub const TRACE_ID_NAME: &str = "concept:name";
