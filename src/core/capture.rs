//! Request-scoped capture of an engine's diagnostic output.
//!
//! The wrapped call runs under its own `tracing` dispatcher (installed with
//! `with_default`, so only the calling thread sees it). Nothing global is
//! reconfigured, which keeps concurrent requests from reading each other's
//! diagnostics. The previous dispatcher comes back when the call returns or
//! unwinds.

pub use crate::domain::model::{CaptureBuffer, Console};

use std::fmt::{self, Write as _};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;

impl<'a> MakeWriter<'a> for CaptureBuffer {
    type Writer = CaptureBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// `<severity-initial> <target>: <message>` per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeverityInitialFormat;

impl<S, N> FormatEvent<S, N> for SeverityInitialFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let initial = meta.level().as_str().chars().next().unwrap_or('?');
        write!(writer, "{} {}: ", initial, meta.target())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Runs `f` while capturing every `tracing` event it emits on this thread,
/// plus whatever it writes to the provided `Console`.
///
/// Returns `f`'s result untouched together with the captured text. A panic
/// in `f` propagates after the previous dispatcher has been restored.
pub fn run_captured<F, R>(f: F) -> (R, String)
where
    F: FnOnce(&Console) -> R,
{
    let buffer = CaptureBuffer::default();
    let console = Console::new(buffer.clone());

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_ansi(false)
        .with_writer(buffer.clone())
        .event_format(SeverityInitialFormat)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || f(&console));
    (result, buffer.contents())
}
