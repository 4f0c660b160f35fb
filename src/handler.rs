//! The consumer side of an exchange.

use crate::error::Error;

/// Receives the outcome of an exchange as it unfolds.
///
/// `on_chunk` is called zero or more times with increments in source order.  Afterwards exactly
/// one of `on_complete` or `on_error` is called, unless the exchange was cancelled, in which case
/// neither is.
pub trait StreamHandler {
    /// Called with each increment of reply text.
    fn on_chunk(&mut self, text: &str);

    /// Called once when the reply ended normally.
    fn on_complete(&mut self);

    /// Called once when the exchange failed.
    fn on_error(&mut self, error: Error);
}

impl<H: StreamHandler + ?Sized> StreamHandler for &mut H {
    fn on_chunk(&mut self, text: &str) {
        (**self).on_chunk(text)
    }

    fn on_complete(&mut self) {
        (**self).on_complete()
    }

    fn on_error(&mut self, error: Error) {
        (**self).on_error(error)
    }
}

/// A [`StreamHandler`] built from three closures.
///
/// ```
/// # use chatstream::Callbacks;
/// let mut reply = String::new();
/// let handler = Callbacks::new(
///     |chunk: &str| reply.push_str(chunk),
///     || println!("done"),
///     |err| eprintln!("failed: {err}"),
/// );
/// ```
pub struct Callbacks<C, D, E> {
    on_chunk: C,
    on_complete: D,
    on_error: E,
}

impl<C, D, E> Callbacks<C, D, E>
where
    C: FnMut(&str),
    D: FnMut(),
    E: FnMut(Error),
{
    /// Bundle the three callbacks.
    pub fn new(on_chunk: C, on_complete: D, on_error: E) -> Self {
        Self {
            on_chunk,
            on_complete,
            on_error,
        }
    }
}

impl<C, D, E> StreamHandler for Callbacks<C, D, E>
where
    C: FnMut(&str),
    D: FnMut(),
    E: FnMut(Error),
{
    fn on_chunk(&mut self, text: &str) {
        (self.on_chunk)(text)
    }

    fn on_complete(&mut self) {
        (self.on_complete)()
    }

    fn on_error(&mut self, error: Error) {
        (self.on_error)(error)
    }
}
