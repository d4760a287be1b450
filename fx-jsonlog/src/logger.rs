use crate::record::RecordBuilder;
use crate::sink::{ConsoleSink, Dispatch, Sink};
use crate::{
    to_json_string, Error, ErrorValue, Fields, LogLevel, LoggerOptions, Message, Result,
    SinkError, Value,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, trace, warn};
#[cfg(any(test, feature = "testing"))]
use mockall::automock;
use std::any::Any;
use std::fmt::Debug;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use tokio::runtime::Handle;

/// The message of the diagnostic record emitted when an asynchronous sink result fails.
pub const ASYNC_FAILURE_MSG: &str = "async func error";

/// A structured logger which merges its inherited fields into every record it emits.
///
/// The trait is object safe, which allows loggers to be passed around as `Box<dyn Log>`
/// and to be replaced by a stub within tests.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait Log: Debug + Send + Sync {
    /// Create a new logger which inherits the configuration of this logger,
    /// overlaying the inherited fields with the given `fields`.
    ///
    /// It returns [Error::MissingFields] when `fields` is null,
    /// or [Error::InvalidFields] when `fields` is not an object.
    fn child(&self, fields: Value) -> Result<Box<dyn Log>>;

    /// Alias of [Log::child].
    fn prefix(&self, fields: Value) -> Result<Box<dyn Log>> {
        self.child(fields)
    }

    fn trace(&self, msg: Message, args: Vec<Value>) -> Result<()> {
        self.log(LogLevel::Trace, msg, args)
    }

    fn debug(&self, msg: Message, args: Vec<Value>) -> Result<()> {
        self.log(LogLevel::Debug, msg, args)
    }

    fn info(&self, msg: Message, args: Vec<Value>) -> Result<()> {
        self.log(LogLevel::Info, msg, args)
    }

    fn warn(&self, msg: Message, args: Vec<Value>) -> Result<()> {
        self.log(LogLevel::Warning, msg, args)
    }

    fn error(&self, msg: Message, args: Vec<Value>) -> Result<()> {
        self.log(LogLevel::Error, msg, args)
    }

    /// Emit a record of the given level, unless it's filtered by the minimum level of the logger.
    ///
    /// Only a synchronous failure of the output sink is returned as an error.
    fn log(&self, level: LogLevel, msg: Message, args: Vec<Value>) -> Result<()>;
}

/// The JSON logger, which serializes each record into a single JSON line.
///
/// A logger is immutable once created, deriving a logger through [JsonLogger::child]
/// never affects the parent.
///
/// # Examples
///
/// ```no_run
/// use fx_jsonlog::{args, fields, JsonLogger, LogLevel};
///
/// let logger = JsonLogger::builder()
///     .level(LogLevel::Debug)
///     .init(fields! { "service" => "auth" })
///     .build()
///     .unwrap();
///
/// let session = logger.child(fields! { "sid" => "c1d5" }).unwrap();
/// session.info("user logged in", args!["admin"]).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct JsonLogger {
    inner: Arc<LoggerConfig>,
}

impl JsonLogger {
    /// Returns a builder instance for the logger.
    pub fn builder() -> JsonLoggerBuilder {
        JsonLoggerBuilder::default()
    }

    /// Create a new logger from the given options, writing to the default console sink.
    pub fn new(options: LoggerOptions) -> Result<Self> {
        Self::builder().options(options).build()
    }

    /// Returns the effective minimum level, if any.
    pub fn level(&self) -> Option<LogLevel> {
        self.inner.level
    }

    /// Returns the fields inherited by every record of this logger.
    pub fn init(&self) -> &Fields {
        &self.inner.init
    }

    pub fn throw_on_error(&self) -> bool {
        self.inner.throw_on_error
    }

    /// Create a new logger with the inherited fields of this logger overlaid by the given `fields`.
    /// The level, sinks and error behavior are inherited unchanged.
    pub fn child<V: Into<Value>>(&self, fields: V) -> Result<JsonLogger> {
        let fields = match fields.into() {
            Value::Null => return Err(Error::MissingFields),
            value => value
                .to_fields()
                .ok_or_else(|| Error::InvalidFields(value.type_name().to_string()))?,
        };

        let mut init = self.inner.init.clone();
        init.merge(&fields);
        debug!("Creating child logger with {} inherited fields", init.len());

        Ok(Self {
            inner: Arc::new(LoggerConfig {
                level: self.inner.level,
                init,
                sink: self.inner.sink.clone(),
                fallback: self.inner.fallback.clone(),
                runtime: self.inner.runtime.clone(),
                throw_on_error: self.inner.throw_on_error,
            }),
        })
    }

    /// Alias of [JsonLogger::child].
    pub fn prefix<V: Into<Value>>(&self, fields: V) -> Result<JsonLogger> {
        self.child(fields)
    }

    pub fn trace<M: Into<Message>>(&self, msg: M, args: Vec<Value>) -> Result<()> {
        self.emit(LogLevel::Trace, msg.into(), args)
    }

    pub fn debug<M: Into<Message>>(&self, msg: M, args: Vec<Value>) -> Result<()> {
        self.emit(LogLevel::Debug, msg.into(), args)
    }

    pub fn info<M: Into<Message>>(&self, msg: M, args: Vec<Value>) -> Result<()> {
        self.emit(LogLevel::Info, msg.into(), args)
    }

    pub fn warn<M: Into<Message>>(&self, msg: M, args: Vec<Value>) -> Result<()> {
        self.emit(LogLevel::Warning, msg.into(), args)
    }

    pub fn error<M: Into<Message>>(&self, msg: M, args: Vec<Value>) -> Result<()> {
        self.emit(LogLevel::Error, msg.into(), args)
    }

    /// Emit a record of the given level.
    ///
    /// A filtered record has no effect at all. Otherwise, the record is serialized and written
    /// to the sink exactly once. A pending sink result is never awaited by this call.
    pub fn log<M: Into<Message>>(&self, level: LogLevel, msg: M, args: Vec<Value>) -> Result<()> {
        self.emit(level, msg.into(), args)
    }

    fn emit(&self, level: LogLevel, msg: Message, args: Vec<Value>) -> Result<()> {
        if !level.is_enabled(self.inner.level) {
            trace!(
                "Ignoring {} record, minimum level is {:?}",
                level,
                self.inner.level
            );
            return Ok(());
        }

        let record = RecordBuilder::new(level, now_millis())
            .inherited(&self.inner.init)
            .message(msg)
            .args(args)
            .build();

        match self.inner.sink.write(to_json_string(&record))? {
            Dispatch::Completed => {}
            Dispatch::Pending(future) => self.spawn_pending(future, record),
        }
        Ok(())
    }

    fn spawn_pending(
        &self,
        future: BoxFuture<'static, std::result::Result<(), SinkError>>,
        record: Fields,
    ) {
        let fallback = self.inner.fallback.clone();
        let task = async move {
            // a panicking sink result is reported the same way as a failed one
            let result = AssertUnwindSafe(future)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(panic_to_error(panic)));
            if let Err(e) = result {
                report_async_failure(fallback.as_ref(), record, e);
            }
        };

        match self
            .inner
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
        {
            Some(runtime) => {
                runtime.spawn(task);
            }
            None => {
                trace!("No runtime available, completing the sink result on a new thread");
                thread::spawn(move || futures::executor::block_on(task));
            }
        }
    }
}

impl Default for JsonLogger {
    fn default() -> Self {
        Self {
            inner: Arc::new(LoggerConfig::default()),
        }
    }
}

impl Log for JsonLogger {
    fn child(&self, fields: Value) -> Result<Box<dyn Log>> {
        Ok(Box::new(JsonLogger::child(self, fields)?))
    }

    fn log(&self, level: LogLevel, msg: Message, args: Vec<Value>) -> Result<()> {
        self.emit(level, msg, args)
    }
}

/// Emit the diagnostic record of a failed asynchronous sink result through the fallback sink.
/// Failures of the fallback sink are ignored, as are its pending results.
fn report_async_failure(fallback: &dyn Sink, source: Fields, err: SinkError) {
    warn!("Sink failed to write the record asynchronously, {}", err);
    let cause = ErrorValue::from_error(&*err);
    let mut record = RecordBuilder::new(LogLevel::Error, now_millis())
        .message(ASYNC_FAILURE_MSG)
        .build();
    record.insert("error", cause.message);
    if let Some(stack) = cause.stack {
        record.insert("stack", stack);
    }
    record.insert("source", source);

    if let Err(e) = fallback.write(to_json_string(&record)) {
        debug!("Fallback sink failed to write the diagnostic record, {}", e);
    }
}

fn panic_to_error(panic: Box<dyn Any + Send>) -> SinkError {
    let reason = panic
        .downcast_ref::<&str>()
        .map(|e| e.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("sink result panicked, {}", reason).into()
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug)]
struct LoggerConfig {
    level: Option<LogLevel>,
    init: Fields,
    sink: Arc<dyn Sink>,
    fallback: Arc<dyn Sink>,
    runtime: Option<Handle>,
    throw_on_error: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: None,
            init: Fields::new(),
            sink: Arc::new(ConsoleSink::default()),
            fallback: Arc::new(ConsoleSink::default()),
            runtime: None,
            throw_on_error: false,
        }
    }
}

/// The builder of a [JsonLogger].
#[derive(Debug, Default)]
pub struct JsonLoggerBuilder {
    level: Option<String>,
    init: Option<Value>,
    sink: Option<Arc<dyn Sink>>,
    fallback: Option<Arc<dyn Sink>>,
    runtime: Option<Handle>,
    throw_on_error: bool,
}

impl JsonLoggerBuilder {
    /// Set the minimum level of the logger.
    pub fn level(&mut self, level: LogLevel) -> &mut Self {
        self.level = Some(level.as_str().to_string());
        self
    }

    /// Set the minimum level of the logger by its name.
    /// The name is validated when the logger is built.
    pub fn level_name<S: AsRef<str>>(&mut self, level: S) -> &mut Self {
        self.level = Some(level.as_ref().to_string());
        self
    }

    /// Set the fields inherited by every record.
    /// The value is validated to be an object when the logger is built.
    pub fn init<V: Into<Value>>(&mut self, init: V) -> &mut Self {
        self.init = Some(init.into());
        self
    }

    /// Set the output sink of the logger.
    /// When no sink is set, records are written to the [ConsoleSink].
    pub fn sink<S: Sink + 'static>(&mut self, sink: S) -> &mut Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Set the sink receiving the diagnostic records of failed asynchronous sink results.
    /// Defaults to the [ConsoleSink].
    pub fn fallback_sink<S: Sink + 'static>(&mut self, sink: S) -> &mut Self {
        self.fallback = Some(Arc::new(sink));
        self
    }

    /// Set the runtime on which pending sink results are completed.
    /// Defaults to the runtime of the calling context.
    pub fn runtime(&mut self, runtime: Handle) -> &mut Self {
        self.runtime = Some(runtime);
        self
    }

    /// Fail the build on an invalid level instead of falling back to [LogLevel::Info].
    pub fn throw_on_error(&mut self, throw_on_error: bool) -> &mut Self {
        self.throw_on_error = throw_on_error;
        self
    }

    /// Apply the given declarative options.
    pub fn options(&mut self, options: LoggerOptions) -> &mut Self {
        if let Some(level) = options.level {
            self.level = Some(level);
        }
        if let Some(init) = options.init {
            self.init = Some(Value::from(init));
        }
        self.throw_on_error = options.throw_on_error;
        self
    }

    /// Consumes the builder and creates a new logger instance.
    ///
    /// It returns [Error::InvalidLevel] when the level is unknown and `throw_on_error` is enabled,
    /// or [Error::InvalidInit] when the init value is not an object.
    pub fn build(&mut self) -> Result<JsonLogger> {
        let throw_on_error = self.throw_on_error;
        let level = match self.level.take() {
            None => None,
            Some(name) => match LogLevel::from_str(name.as_str()) {
                Ok(level) => Some(level),
                Err(e) if throw_on_error => return Err(e),
                Err(_) => {
                    warn!(
                        "Log level \"{}\" is invalid, using {} instead",
                        name,
                        LogLevel::Info
                    );
                    Some(LogLevel::Info)
                }
            },
        };
        let init = match self.init.take() {
            None | Some(Value::Null) => Fields::new(),
            Some(value) => value
                .to_fields()
                .ok_or_else(|| Error::InvalidInit(value.type_name().to_string()))?,
        };

        Ok(JsonLogger {
            inner: Arc::new(LoggerConfig {
                level,
                init,
                sink: self
                    .sink
                    .take()
                    .unwrap_or_else(|| Arc::new(ConsoleSink::default())),
                fallback: self
                    .fallback
                    .take()
                    .unwrap_or_else(|| Arc::new(ConsoleSink::default())),
                runtime: self.runtime.take(),
                throw_on_error,
            }),
        })
    }
}
