//! In-memory transport for driving the handshake and session loops in unit
//! tests.

use std::{collections::VecDeque, future::pending, io};

use lib::transport::{ProtocolError, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Recv,
    Sent(Vec<u8>),
    Closed,
}

/// What `recv` does once the scripted messages run out.
#[derive(Debug, Clone, Copy)]
enum Tail {
    Close,
    Fail,
    Hang,
}

pub(crate) struct ScriptedTransport {
    incoming: VecDeque<Vec<u8>>,
    tail: Tail,
    refuse_sends: bool,
    events: Vec<Event>,
}

impl ScriptedTransport {
    /// Delivers `incoming`, then reports an orderly close.
    pub(crate) fn new(incoming: Vec<Vec<u8>>) -> Self {
        Self::with_tail(incoming, Tail::Close)
    }

    /// Delivers `incoming`, then fails the next read.
    pub(crate) fn failing_after(incoming: Vec<Vec<u8>>) -> Self {
        Self::with_tail(incoming, Tail::Fail)
    }

    /// Never delivers anything.
    pub(crate) fn silent() -> Self {
        Self::with_tail(Vec::new(), Tail::Hang)
    }

    fn with_tail(incoming: Vec<Vec<u8>>, tail: Tail) -> Self {
        Self {
            incoming: incoming.into(),
            tail,
            refuse_sends: false,
            events: Vec::new(),
        }
    }

    /// Every `send` fails and is not recorded.
    pub(crate) fn refusing_sends(mut self) -> Self {
        self.refuse_sends = true;
        self
    }

    pub(crate) fn events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Sent(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| **event == Event::Closed)
            .count()
    }
}

impl Transport for ScriptedTransport {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        self.events.push(Event::Recv);
        if let Some(message) = self.incoming.pop_front() {
            return Ok(Some(message));
        }
        match self.tail {
            Tail::Close => Ok(None),
            Tail::Fail => Err(ProtocolError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "scripted read failure",
            ))),
            Tail::Hang => pending().await,
        }
    }

    async fn send(&mut self, message: Vec<u8>) -> Result<(), ProtocolError> {
        if self.refuse_sends {
            return Err(ProtocolError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "scripted write failure",
            )));
        }
        self.events.push(Event::Sent(message));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        self.events.push(Event::Closed);
        Ok(())
    }
}
