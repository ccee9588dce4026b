//! Thread-local capture of diagnostic messages.
//!
//! Sharp edges the library tolerates (degraded operators, overwritten clauses, skipped
//! relations, failed `where_id`, failed hooks) are reported through [`diag!`](crate::diag).
//! The macro always goes to the `log` facade; when a sink is enabled on the current
//! thread the message is also recorded there, which keeps assertions in tests free of
//! global logger races.

use std::cell::RefCell;

thread_local! {
    static TL_SINK: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Disables the thread-local sink on drop.
pub struct SinkGuard;

impl Drop for SinkGuard {
    fn drop(&mut self) {
        TL_SINK.with(|s| *s.borrow_mut() = None);
    }
}

/// Enables capture for the current thread until the returned guard is dropped.
#[must_use]
pub fn enable_thread_sink() -> SinkGuard {
    TL_SINK.with(|s| *s.borrow_mut() = Some(Vec::new()));
    SinkGuard
}

pub fn write_str(msg: &str) {
    TL_SINK.with(|s| {
        if let Some(buf) = s.borrow_mut().as_mut() {
            buf.push(msg.to_owned());
        }
    });
}

/// Returns and clears the captured messages. Empty when capture is disabled.
pub fn drain() -> Vec<String> {
    TL_SINK.with(|s| s.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

pub fn snapshot() -> Vec<String> {
    TL_SINK.with(|s| s.borrow().as_ref().cloned().unwrap_or_default())
}

/// Logs at the given level and records the message in the thread-local sink.
#[macro_export]
macro_rules! diag {
    ($lvl:expr, $($arg:tt)*) => {{
        let __s = format!($($arg)*);
        $crate::logger::sink::write_str(&__s);
        log::log!(target: "odmkit::diag", $lvl, "{}", __s);
    }};
}
