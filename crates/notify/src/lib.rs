mod dispatcher;
mod format;
mod sink;
mod telegram;
#[cfg(test)]
mod test_support;

pub use dispatcher::{
    DispatchOutcome, DispatchPolicy, DispatchSnapshot, DispatchTelemetry, Dispatcher,
};
pub use format::{escape_html, NotificationFormatter, LOG_CHANNEL_TARGET};
pub use sink::{ConfiguredSink, LogSink, NotificationSink, SinkError, SinkErrorKind};
pub use telegram::TelegramSink;
