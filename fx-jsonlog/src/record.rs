use crate::{Fields, LogLevel, Value};

/// The keys of a record which are always computed by the logger.
pub const RESERVED_KEYS: [&str; 2] = [TS_KEY, LEVEL_KEY];

pub const TS_KEY: &str = "ts";
pub const LEVEL_KEY: &str = "level";
pub const MSG_KEY: &str = "msg";
pub const ARGS_KEY: &str = "args";

/// The message of a log call.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Message {
    /// A textual message, stored under the `msg` key.
    Text(String),
    /// Fields which are merged into the record.
    Fields(Fields),
    /// No message, nothing is contributed to the record.
    #[default]
    Empty,
}

impl From<&str> for Message {
    fn from(value: &str) -> Self {
        Message::Text(value.to_string())
    }
}

impl From<String> for Message {
    fn from(value: String) -> Self {
        Message::Text(value)
    }
}

impl From<Fields> for Message {
    fn from(value: Fields) -> Self {
        Message::Fields(value)
    }
}

impl From<()> for Message {
    fn from(_: ()) -> Self {
        Message::Empty
    }
}

impl<T: Into<Message>> From<Option<T>> for Message {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl From<Value> for Message {
    /// Strings become a textual message and objects become fields.
    /// Any other value is carried as the textual form of its JSON representation,
    /// arrays included, their items are never spread into index keys.
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Message::Empty,
            Value::String(text) => Message::Text(text),
            Value::Object(fields) => Message::Fields(fields),
            Value::Shared(shared) => match shared.snapshot() {
                Value::Object(fields) => Message::Fields(fields),
                _ => Message::Text(crate::value_to_json_string(&Value::Shared(shared))),
            },
            other => Message::Text(crate::value_to_json_string(&other)),
        }
    }
}

impl From<serde_json::Value> for Message {
    fn from(value: serde_json::Value) -> Self {
        Message::from(Value::from(value))
    }
}

/// Builds the flat field mapping of a single log call.
///
/// Fields are merged in the order inherited fields, message fields and positional arguments,
/// where later fields win on collision. The reserved `ts` and `level` keys can never be overridden.
#[derive(Debug)]
pub struct RecordBuilder<'a> {
    level: LogLevel,
    ts: i64,
    inherited: Option<&'a Fields>,
    message: Message,
    args: Vec<Value>,
}

impl<'a> RecordBuilder<'a> {
    /// Create a new builder for a record of the given level at the given time in millis since epoch.
    pub fn new(level: LogLevel, ts: i64) -> Self {
        Self {
            level,
            ts,
            inherited: None,
            message: Message::Empty,
            args: Vec::new(),
        }
    }

    pub fn inherited(mut self, fields: &'a Fields) -> Self {
        self.inherited = Some(fields);
        self
    }

    pub fn message<M: Into<Message>>(mut self, message: M) -> Self {
        self.message = message.into();
        self
    }

    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Consume the builder and create the record.
    pub fn build(self) -> Fields {
        let mut record = Fields::with_capacity(self.inherited.map(Fields::len).unwrap_or(0) + 4);
        record.insert(TS_KEY, self.ts);
        record.insert(LEVEL_KEY, self.level.as_str());

        if let Some(inherited) = self.inherited {
            merge_unreserved(&mut record, inherited.iter().map(|(k, v)| (k, v.clone())));
        }

        match self.message {
            Message::Text(text) => {
                record.insert(MSG_KEY, text);
            }
            Message::Fields(fields) => merge_unreserved(&mut record, fields.into_iter()),
            Message::Empty => {}
        }

        if !self.args.is_empty() {
            record.insert(ARGS_KEY, Value::Array(self.args));
        }

        record
    }
}

fn merge_unreserved<K, I>(record: &mut Fields, fields: I)
where
    K: AsRef<str> + Into<String>,
    I: Iterator<Item = (K, Value)>,
{
    for (key, value) in fields {
        if !RESERVED_KEYS.contains(&key.as_ref()) {
            record.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{args, fields};

    const TS: i64 = 1_700_000_000_000;

    #[test]
    fn test_build_text_message() {
        let result = RecordBuilder::new(LogLevel::Info, TS)
            .message("works fine with basic logging")
            .build();

        assert_eq!(
            fields! {
                "ts" => TS,
                "level" => "INFO",
                "msg" => "works fine with basic logging",
            },
            result
        );
    }

    #[test]
    fn test_build_empty_text_message() {
        let result = RecordBuilder::new(LogLevel::Info, TS).message("").build();

        assert_eq!(Some(&Value::from("")), result.get(MSG_KEY));
    }

    #[test]
    fn test_build_without_message() {
        let result = RecordBuilder::new(LogLevel::Warning, TS)
            .message(Message::Empty)
            .build();
        assert_eq!(fields! { "ts" => TS, "level" => "WARNING" }, result);

        let result = RecordBuilder::new(LogLevel::Info, TS)
            .message(Fields::new())
            .build();
        assert_eq!(fields! { "ts" => TS, "level" => "INFO" }, result);
    }

    #[test]
    fn test_build_reserved_keys_are_protected() {
        let inherited = fields! { "ts" => 999, "level" => "FAKE", "msg" => "init msg" };

        let result = RecordBuilder::new(LogLevel::Info, TS)
            .inherited(&inherited)
            .message(fields! { "msg" => "test", "ts" => 123456789, "level" => "FAKE" })
            .build();

        assert_eq!(
            fields! { "ts" => TS, "level" => "INFO", "msg" => "test" },
            result
        );
    }

    #[test]
    fn test_build_precedence() {
        let inherited = fields! { "env" => "dev", "version" => "1.0" };

        let result = RecordBuilder::new(LogLevel::Debug, TS)
            .inherited(&inherited)
            .message(fields! { "msg" => "test", "env" => "prod", "args" => "literal" })
            .args(args!["explicit"])
            .build();

        assert_eq!(Some(&Value::from("prod")), result.get("env"));
        assert_eq!(Some(&Value::from("1.0")), result.get("version"));
        assert_eq!(
            Some(&Value::Array(vec![Value::from("explicit")])),
            result.get(ARGS_KEY)
        );
    }

    #[test]
    fn test_build_args() {
        let result = RecordBuilder::new(LogLevel::Info, TS)
            .message("message")
            .args(args!["arg1", "arg2", "arg3"])
            .build();
        assert_eq!(
            Some(&Value::from(vec!["arg1", "arg2", "arg3"])),
            result.get(ARGS_KEY)
        );

        let result = RecordBuilder::new(LogLevel::Info, TS)
            .message("testing without args")
            .args(args![])
            .build();
        assert!(!result.contains_key(ARGS_KEY));
    }

    #[test]
    fn test_message_from_value() {
        assert_eq!(Message::Empty, Message::from(Value::Null));
        assert_eq!(Message::Text("lorem".to_string()), Message::from(Value::from("lorem")));
        assert_eq!(
            Message::Fields(fields! { "a" => 1 }),
            Message::from(serde_json::json!({ "a": 1 }))
        );
        assert_eq!(Message::Text("42".to_string()), Message::from(Value::from(42)));
        assert_eq!(
            Message::Text(r#"["a",1]"#.to_string()),
            Message::from(serde_json::json!(["a", 1]))
        );
        assert_eq!(Message::Empty, Message::from(None::<&str>));
    }
}
