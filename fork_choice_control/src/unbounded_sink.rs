use futures::{
    channel::mpsc::{TrySendError, UnboundedSender},
    sink::Drain,
};

/// A channel that never blocks the sender.
///
/// `None` and [`Drain`] discard every message.
pub trait UnboundedSink<T>: Send + Sync + 'static {
    fn unbounded_send(&self, message: T) -> Result<(), T>;
}

impl<T, S: UnboundedSink<T>> UnboundedSink<T> for Option<S> {
    fn unbounded_send(&self, message: T) -> Result<(), T> {
        match self {
            Some(sink) => sink.unbounded_send(message),
            None => Ok(()),
        }
    }
}

impl<T: Send + 'static> UnboundedSink<T> for UnboundedSender<T> {
    fn unbounded_send(&self, message: T) -> Result<(), T> {
        Self::unbounded_send(self, message).map_err(TrySendError::into_inner)
    }
}

impl<T: Send + Sync + 'static> UnboundedSink<T> for Drain<T> {
    fn unbounded_send(&self, _message: T) -> Result<(), T> {
        Ok(())
    }
}
