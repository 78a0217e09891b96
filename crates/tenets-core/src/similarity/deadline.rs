//! Enforces the 30s-per-call deadline spec.md §4.1/§5 puts on LLM and
//! embedding calls. `LlmClient`/`EmbeddingCapable` are synchronous traits
//! borrowed for the duration of one `compute` call (not `'static`), so the
//! deadline is enforced with a scoped thread rather than `thread::spawn`:
//! it races the call against a channel recv timeout while still letting the
//! worker borrow `config`'s trait objects. A client that hangs past the
//! deadline still gets joined when the scope exits — `recv_timeout` lets
//! the caller stop *waiting* at 30s and fall through to the next method,
//! but the worker thread itself is only reclaimed once the hung call
//! returns.

use std::sync::mpsc;
use std::time::Duration;

const CALL_DEADLINE: Duration = Duration::from_secs(30);

/// Runs `f` and returns its result if it completes within the deadline,
/// or `None` if the deadline elapses first.
pub fn call_with_deadline<T, F>(f: F) -> Option<T>
where
    F: FnOnce() -> T + Send,
    T: Send,
{
    std::thread::scope(|scope| {
        let (tx, rx) = mpsc::channel();
        scope.spawn(move || {
            let _ = tx.send(f());
        });
        rx.recv_timeout(CALL_DEADLINE).ok()
    })
}
