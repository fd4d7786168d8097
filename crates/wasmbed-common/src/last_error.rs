//! Per-thread record of the last failure.
//!
//! Internally every fallible operation returns a `Result`. This record exists
//! for callers on the other side of the C boundary, which only see a null or
//! `false` return and then ask for the message. Each thread has its own
//! record, so concurrent failures on different threads never observe each
//! other's text. Reading does not clear the record; the next failure on the
//! same thread overwrites it.

use std::cell::RefCell;
use std::fmt::Display;

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Overwrite the calling thread's last error with `message`.
pub fn record(message: impl Display) {
    let message = message.to_string();
    tracing::debug!(error = %message, "recording last error");
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

/// Record `err` if `result` failed and hand the result back unchanged.
pub fn record_err<T, E: Display>(result: Result<T, E>) -> Result<T, E> {
    if let Err(err) = &result {
        record(err);
    }
    result
}

/// Forget the calling thread's last error.
pub fn clear() {
    LAST_ERROR.with(|slot| slot.borrow_mut().take());
}

/// The calling thread's last error message, if any.
pub fn message() -> Option<String> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// Length in bytes of the last error message including a trailing NUL, or 0
/// when there is none.
pub fn length() -> usize {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(0, |msg| msg.len() + 1))
}

/// Copy the last error message into `buffer`, NUL-terminated.
///
/// Returns the number of bytes written including the NUL, `Some(0)` when
/// there is no recorded error, and `None` when `buffer` is too small.
pub fn copy_into(buffer: &mut [u8]) -> Option<usize> {
    LAST_ERROR.with(|slot| {
        let slot = slot.borrow();
        let Some(message) = slot.as_ref() else {
            return Some(0);
        };
        if message.len() >= buffer.len() {
            return None;
        }
        buffer[..message.len()].copy_from_slice(message.as_bytes());
        buffer[message.len()] = 0;
        Some(message.len() + 1)
    })
}
