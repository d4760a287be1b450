use crate::SinkError;
use futures::future::BoxFuture;
#[cfg(any(test, feature = "testing"))]
use mockall::automock;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::io::{self, Write};

/// The outcome of writing a record to a [Sink].
pub enum Dispatch {
    /// The record has been fully written.
    Completed,
    /// The record is being written asynchronously.
    /// The logger never awaits this result, failures are reported through the fallback sink.
    Pending(BoxFuture<'static, Result<(), SinkError>>),
}

impl Dispatch {
    /// Create a pending dispatch for the given future.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<(), SinkError>> + Send + 'static,
    {
        Dispatch::Pending(Box::pin(future))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Dispatch::Pending(_))
    }
}

impl Debug for Dispatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Dispatch::Completed => write!(f, "Completed"),
            Dispatch::Pending(_) => write!(f, "Pending"),
        }
    }
}

/// The output of serialized log records.
///
/// A sink receives exactly one JSON line per emitted record.
/// Implementations must be [Send] & [Sync] as loggers can be used from multiple threads.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait Sink: Debug + Send + Sync {
    /// Write the given serialized record.
    ///
    /// An error returned by this call is propagated to the caller of the log operation.
    fn write(&self, line: String) -> Result<Dispatch, SinkError>;
}

/// The standard stream a [ConsoleSink] writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleTarget {
    #[default]
    Stdout,
    Stderr,
}

/// The default sink, which writes each record as a line to a standard stream.
#[derive(Debug, Clone, Default)]
pub struct ConsoleSink {
    target: ConsoleTarget,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self {
            target: ConsoleTarget::Stdout,
        }
    }

    pub fn stderr() -> Self {
        Self {
            target: ConsoleTarget::Stderr,
        }
    }

    pub fn target(&self) -> ConsoleTarget {
        self.target
    }
}

impl Sink for ConsoleSink {
    fn write(&self, line: String) -> Result<Dispatch, SinkError> {
        match self.target {
            ConsoleTarget::Stdout => writeln!(io::stdout().lock(), "{}", line)?,
            ConsoleTarget::Stderr => writeln!(io::stderr().lock(), "{}", line)?,
        }
        Ok(Dispatch::Completed)
    }
}

/// A sink which invokes a synchronous function for each record.
pub struct FnSink<F> {
    func: F,
}

impl<F> Sink for FnSink<F>
where
    F: Fn(&str) -> Result<(), SinkError> + Send + Sync,
{
    fn write(&self, line: String) -> Result<Dispatch, SinkError> {
        (self.func)(line.as_str())?;
        Ok(Dispatch::Completed)
    }
}

impl<F> Debug for FnSink<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "FnSink")
    }
}

/// A sink which invokes an asynchronous function for each record.
pub struct AsyncFnSink<F> {
    func: F,
}

impl<F, Fut> Sink for AsyncFnSink<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), SinkError>> + Send + 'static,
{
    fn write(&self, line: String) -> Result<Dispatch, SinkError> {
        Ok(Dispatch::pending((self.func)(line)))
    }
}

impl<F> Debug for AsyncFnSink<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "AsyncFnSink")
    }
}

/// Create a sink from the given synchronous function.
pub fn from_fn<F>(func: F) -> FnSink<F>
where
    F: Fn(&str) -> Result<(), SinkError> + Send + Sync,
{
    FnSink { func }
}

/// Create a sink from the given asynchronous function.
/// The returned future is never awaited by the logger itself.
pub fn from_async_fn<F, Fut>(func: F) -> AsyncFnSink<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), SinkError>> + Send + 'static,
{
    AsyncFnSink { func }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_fn_sink() {
        let entries = Arc::new(Mutex::new(Vec::new()));
        let sink_entries = entries.clone();
        let sink = from_fn(move |line: &str| {
            sink_entries.lock().unwrap().push(line.to_string());
            Ok(())
        });

        let result = sink.write("{\"msg\":\"lorem\"}".to_string()).unwrap();

        assert!(!result.is_pending());
        assert_eq!(
            vec!["{\"msg\":\"lorem\"}".to_string()],
            *entries.lock().unwrap()
        );
    }

    #[test]
    fn test_fn_sink_error() {
        let sink = from_fn(|_: &str| Err("sink closed".into()));

        let result = sink.write("{}".to_string());

        match result {
            Err(e) => assert_eq!("sink closed", e.to_string()),
            Ok(e) => panic!("expected an error, got {:?} instead", e),
        }
    }

    #[tokio::test]
    async fn test_async_fn_sink() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = from_async_fn(move |line: String| {
            let tx = tx.clone();
            async move {
                let result: Result<(), SinkError> = tx.send(line).map_err(|e| e.into());
                result
            }
        });

        let result = sink.write("{\"msg\":\"ipsum\"}".to_string()).unwrap();
        assert!(rx.try_recv().is_err(), "expected the future to be lazy");

        match result {
            Dispatch::Pending(future) => future.await.unwrap(),
            Dispatch::Completed => panic!("expected a pending dispatch"),
        }
        assert_eq!(Some("{\"msg\":\"ipsum\"}".to_string()), rx.recv().await);
    }

    #[test]
    fn test_console_sink() {
        let sink = ConsoleSink::default();

        let result = sink.write("{\"level\":\"INFO\"}".to_string());

        assert!(result.is_ok(), "expected the console write to succeed");
        assert_eq!(ConsoleTarget::Stdout, sink.target());
        assert_eq!(ConsoleTarget::Stderr, ConsoleSink::stderr().target());
    }
}
