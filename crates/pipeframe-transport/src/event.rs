use std::collections::VecDeque;
use std::sync::mpsc::Sender;

use crate::error::TransportError;

/// Notification delivered to a transport's subscriber.
#[derive(Debug)]
pub enum TransportEvent<M> {
    /// A complete inbound frame deserialized into a message.
    MessageReceived(M),
    /// The child ended cleanly, or after a requested shutdown.
    Exited,
    /// A framing, payload, I/O or abnormal-exit error.
    Error(TransportError),
}

impl<M> TransportEvent<M> {
    /// True for the single event reporting how the child ended.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransportEvent::Exited | TransportEvent::Error(TransportError::AbnormalExit(_))
        )
    }

    pub fn into_message(self) -> Option<M> {
        match self {
            TransportEvent::MessageReceived(message) => Some(message),
            _ => None,
        }
    }
}

/// Subscriber for transport events.
pub trait EventSink<M> {
    fn emit(&mut self, event: TransportEvent<M>);
}

impl<M> EventSink<M> for VecDeque<TransportEvent<M>> {
    fn emit(&mut self, event: TransportEvent<M>) {
        self.push_back(event);
    }
}

/// Events are dropped once the receiving side hangs up.
impl<M> EventSink<M> for Sender<TransportEvent<M>> {
    fn emit(&mut self, event: TransportEvent<M>) {
        let _ = self.send(event);
    }
}

/// Adapts a closure into an [`EventSink`].
pub struct FnSink<F>(pub F);

impl<M, F: FnMut(TransportEvent<M>)> EventSink<M> for FnSink<F> {
    fn emit(&mut self, event: TransportEvent<M>) {
        (self.0)(event)
    }
}

#[cfg(test)]
mod tests {
    use pipeframe_process::ExitCondition;

    use super::*;

    #[test]
    fn terminal_events() {
        assert!(TransportEvent::<()>::Exited.is_terminal());
        assert!(
            TransportEvent::<()>::Error(TransportError::AbnormalExit(ExitCondition::Code(2)))
                .is_terminal()
        );
        assert!(!TransportEvent::MessageReceived(()).is_terminal());
        assert!(!TransportEvent::<()>::Error(TransportError::Io(std::io::Error::other("x")))
            .is_terminal());
    }

    #[test]
    fn channel_sink_ignores_closed_receiver() {
        let (mut tx, rx) = std::sync::mpsc::channel::<TransportEvent<u8>>();
        tx.emit(TransportEvent::MessageReceived(1));
        assert_eq!(rx.recv().unwrap().into_message(), Some(1));

        drop(rx);
        tx.emit(TransportEvent::Exited);
    }

    #[test]
    fn closure_sink_sees_events_in_order() {
        let mut seen = Vec::new();
        {
            let mut sink = FnSink(|event: TransportEvent<u8>| seen.push(event.into_message()));
            sink.emit(TransportEvent::MessageReceived(1));
            sink.emit(TransportEvent::MessageReceived(2));
            sink.emit(TransportEvent::Exited);
        }
        assert_eq!(seen, vec![Some(1), Some(2), None]);
    }
}
