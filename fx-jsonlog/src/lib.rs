//! A minimal structured logging facade which writes each record as a single JSON line.
//!
//! Records are flat mappings built from the fields inherited by the logger,
//! the message of the call and its positional arguments.
//! Values which can't be represented in JSON directly, such as errors or cyclic structures,
//! are rendered into a loggable form instead of failing the log call.

pub use errors::*;
pub use level::*;
pub use logger::*;
pub use options::*;
pub use record::*;
pub use serializer::*;
#[cfg(any(test, feature = "testing"))]
pub use sink::MockSink;
pub use sink::{ConsoleSink, ConsoleTarget, Dispatch, Sink};
pub use value::*;

mod errors;
mod level;
mod logger;
mod options;
mod record;
mod serializer;
pub mod sink;
mod value;

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use crate::{Dispatch, Sink, SinkError};
    use log::LevelFilter;
    use log4rs::append::console::ConsoleAppender;
    use log4rs::config::{Appender, Logger, Root};
    use log4rs::encode::pattern::PatternEncoder;
    use log4rs::Config;
    use std::sync::{Arc, Mutex, Once};
    use std::time::Duration;
    use tokio::select;
    use tokio::sync::mpsc::UnboundedReceiver;

    static INIT: Once = Once::new();

    /// Initializes the logger with the specified log level.
    #[macro_export]
    macro_rules! init_logger {
        ($level:expr) => {
            $crate::testing::init_logger_level($level)
        };
        () => {
            $crate::testing::init_logger_level(log::LevelFilter::Trace)
        };
    }

    /// Initializes the logger with the specified log level.
    pub fn init_logger_level(level: LevelFilter) {
        INIT.call_once(|| {
            log4rs::init_config(Config::builder()
                .appender(Appender::builder().build("stdout", Box::new(ConsoleAppender::builder()
                    .encoder(Box::new(PatternEncoder::new("\x1B[37m{d(%Y-%m-%d %H:%M:%S%.3f)}\x1B[0m {h({l:>5.5})} \x1B[35m{I:>6.6}\x1B[0m \x1B[37m---\x1B[0m \x1B[37m[{T:>15.15}]\x1B[0m \x1B[36m{t:<60.60}\x1B[0m \x1B[37m:\x1B[0m {m}{n}")))
                    .build())))
                .logger(Logger::builder().build("mio", LevelFilter::Info))
                .logger(Logger::builder().build("tokio", LevelFilter::Info))
                .build(Root::builder().appender("stdout").build(level))
                .unwrap())
                .unwrap();
        })
    }

    #[macro_export]
    macro_rules! assert_timeout {
        ($timeout:expr, $condition:expr) => {{
            assert_timeout!($timeout, $condition, "")
        }};
        ($timeout:expr, $condition:expr, $message:expr) => {{
            use std::time::Duration;
            use tokio::select;
            use tokio::time;

            let result = select! {
                _ = time::sleep($timeout) => false,
                result = async {
                    loop {
                        if $condition {
                            return true;
                        }

                        time::sleep(Duration::from_millis(10)).await;
                    }
                } => result,
            };

            if !result {
                assert!(
                    false,
                    concat!("Timeout assertion failed after {:?}: ", $message),
                    $timeout
                );
            }
        }};
    }

    /// Receive a message from the given receiver, or panic if the timeout is reached.
    #[macro_export]
    macro_rules! recv_timeout {
        ($receiver:expr, $timeout:expr) => {
            $crate::testing::recv_timeout($receiver, $timeout, "expected to receive an instance")
                .await
        };
        ($receiver:expr, $timeout:expr, $message:expr) => {
            $crate::testing::recv_timeout($receiver, $timeout, $message).await
        };
    }

    /// Receive a message from the given receiver, or panic if the timeout is reached.
    pub async fn recv_timeout<T>(
        receiver: &mut UnboundedReceiver<T>,
        timeout: Duration,
        message: &str,
    ) -> T {
        select! {
            _ = tokio::time::sleep(timeout) => panic!("receiver timed-out after {}ms, {}", timeout.as_millis(), message),
            result = receiver.recv() => result.expect(message)
        }
    }

    /// A sink which keeps every written line in memory.
    /// Clones share the same lines, which allows inspecting the output of a logger owning the sink.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingSink {
        lines: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Returns the written lines in order.
        pub fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }

        /// Returns the written lines parsed as JSON.
        pub fn records(&self) -> Vec<serde_json::Value> {
            self.lines()
                .iter()
                .map(|line| serde_json::from_str(line).expect("expected a valid JSON line"))
                .collect()
        }

        /// Returns the last written line parsed as JSON.
        pub fn last_record(&self) -> serde_json::Value {
            self.records()
                .pop()
                .expect("expected at least one record to have been written")
        }

        pub fn len(&self) -> usize {
            self.lines.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl Sink for RecordingSink {
        fn write(&self, line: String) -> Result<Dispatch, SinkError> {
            self.lines.lock().unwrap().push(line);
            Ok(Dispatch::Completed)
        }
    }
}
