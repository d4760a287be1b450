use serde_json::Number;
use std::fmt::{Debug, Formatter};
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Create a new [crate::Fields] mapping from the given `key => value` pairs.
///
/// ```
/// use fx_jsonlog::fields;
///
/// let fields = fields! {
///     "service" => "auth",
///     "attempt" => 3,
/// };
/// assert_eq!(2, fields.len());
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::Fields::new();
        $(
            fields.insert($key, $value);
        )+
        fields
    }};
}

/// Create the positional arguments of a log call from the given values.
///
/// ```
/// use fx_jsonlog::args;
///
/// let args = args!["lorem", 2, true];
/// assert_eq!(3, args.len());
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::Value::from($value)),+]
    };
}

/// A value which can be stored within a log record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(Fields),
    /// An error which is rendered as `{name, message, stack}`.
    Error(ErrorValue),
    /// A reference to a value which might be shared by, or contain, other values.
    Shared(SharedValue),
}

impl Value {
    /// Returns the name of the type of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Error(_) => "error",
            Value::Shared(shared) => match &*shared.lock() {
                Value::Shared(_) => "reference",
                inner => inner.type_name(),
            },
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Fields> {
        match self {
            Value::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Returns the field value of an object, if this value is an object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|fields| fields.get(key))
    }

    /// Take an owned copy of the fields when this value is an object.
    /// Shared objects are copied from their current state.
    pub fn to_fields(&self) -> Option<Fields> {
        match self {
            Value::Object(fields) => Some(fields.clone()),
            Value::Shared(shared) => match &*shared.lock() {
                Value::Object(fields) => Some(fields.clone()),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Number(Number::from(value))
                }
            }
        )+
    };
}

impl_from_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::from(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl From<Fields> for Value {
    fn from(value: Fields) -> Self {
        Value::Object(value)
    }
}

impl From<ErrorValue> for Value {
    fn from(value: ErrorValue) -> Self {
        Value::Error(value)
    }
}

impl From<SharedValue> for Value {
    fn from(value: SharedValue) -> Self {
        Value::Shared(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(value),
            serde_json::Value::Number(value) => Value::Number(value),
            serde_json::Value::String(value) => Value::String(value),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(Fields::from(map)),
        }
    }
}

/// An insertion ordered mapping of field names to values.
///
/// Inserting an existing key replaces its value but keeps the original position of the key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, Value)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert the given field, returning the previous value of the key if it was present.
    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) -> Option<Value> {
        let key = key.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some((_, existing)) => Some(mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Insert the given field and return the fields.
    pub fn with<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(name, _)| name == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Overlay the given fields on top of these fields.
    /// Keys of `other` replace the existing values on collision.
    pub fn merge(&mut self, other: &Fields) {
        for (key, value) in other.iter() {
            self.insert(key, value.clone());
        }
    }

    /// Returns a copy of these fields without the given keys.
    pub fn without(&self, keys: &[&str]) -> Fields {
        self.iter()
            .filter(|(key, _)| !keys.contains(key))
            .map(|(key, value)| (key, value.clone()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Fields {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut fields = Fields::new();
        fields.extend(iter);
        fields
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Fields {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl IntoIterator for Fields {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Fields {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.into_iter()
            .map(|(key, value)| (key, Value::from(value)))
            .collect()
    }
}

/// A value with an identity, which can be referenced from multiple places at once.
///
/// Shared values are the only way to create reference cycles within a record.
/// A cycle of shared values keeps itself alive.
#[derive(Clone)]
pub struct SharedValue {
    inner: Arc<Mutex<Value>>,
}

impl SharedValue {
    pub fn new<V: Into<Value>>(value: V) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value.into())),
        }
    }

    /// Create a new shared empty object.
    pub fn object() -> Self {
        Self::new(Fields::new())
    }

    /// Create a new shared empty array.
    pub fn array() -> Self {
        Self::new(Value::Array(Vec::new()))
    }

    /// Replace the referenced value.
    pub fn set<V: Into<Value>>(&self, value: V) {
        let value = value.into();
        *self.lock() = value;
    }

    /// Insert a field into the referenced object.
    ///
    /// It returns `false` when the referenced value is not an object.
    pub fn insert<K: Into<String>, V: Into<Value>>(&self, key: K, value: V) -> bool {
        let key = key.into();
        let value = value.into();

        match &mut *self.lock() {
            Value::Object(fields) => {
                fields.insert(key, value);
                true
            }
            _ => false,
        }
    }

    /// Append an item to the referenced array.
    ///
    /// It returns `false` when the referenced value is not an array.
    pub fn push<V: Into<Value>>(&self, value: V) -> bool {
        let value = value.into();

        match &mut *self.lock() {
            Value::Array(items) => {
                items.push(value);
                true
            }
            _ => false,
        }
    }

    /// Returns a copy of the referenced value.
    /// Nested shared values keep pointing to the same references.
    pub fn snapshot(&self) -> Value {
        self.lock().clone()
    }

    /// Verify if both handles reference the same value.
    pub fn ptr_eq(&self, other: &SharedValue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Value> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for SharedValue {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Debug for SharedValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedValue({:#x})", self.id())
    }
}

/// The loggable representation of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
}

impl ErrorValue {
    pub fn new<N: Into<String>, M: Into<String>>(name: N, message: M) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack<S: Into<String>>(mut self, stack: S) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Create the loggable representation of the given error with the generic name `Error`.
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        Self::named("Error", err)
    }

    /// Create the loggable representation of the given error.
    /// The stack contains the error followed by its chain of causes.
    pub fn named<N: Into<String>>(name: N, err: &dyn std::error::Error) -> Self {
        let name = name.into();
        let message = err.to_string();
        let mut stack = format!("{}: {}", name, message);
        let mut source = err.source();
        while let Some(cause) = source {
            stack.push_str("\n    caused by: ");
            stack.push_str(cause.to_string().as_str());
            source = cause.source();
        }

        Self {
            name,
            message,
            stack: Some(stack),
        }
    }
}
