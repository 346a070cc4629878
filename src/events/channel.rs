//! Crossbeam-backed event channel.
//!
//! Events flow one way, from the scan pipeline or search engine to
//! whatever is rendering progress.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use super::{Event, ScanEvent, SearchEvent};

/// Cloneable sending half handed to the core library.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    pub fn new(sender: Sender<Event>) -> Self {
        Self { inner: sender }
    }

    /// Send an event, discarding it if nobody is listening.
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }

    pub fn scan(&self, event: ScanEvent) {
        self.send(Event::Scan(event));
    }

    pub fn search(&self, event: SearchEvent) {
        self.send(Event::Search(event));
    }
}

/// Receiving half used by front ends.
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Block until the next event, `None` once every sender is gone
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    pub fn try_recv(&self) -> Option<Event> {
        self.inner.try_recv().ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

/// Constructors for sender/receiver pairs.
pub struct EventChannel;

impl EventChannel {
    /// Unbounded channel; events are small.
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (EventSender::new(sender), EventReceiver { inner: receiver })
    }

    /// Bounded channel for consumers that need backpressure.
    pub fn bounded(capacity: usize) -> (EventSender, EventReceiver) {
        let (sender, receiver) = bounded(capacity);
        (EventSender::new(sender), EventReceiver { inner: receiver })
    }
}

/// A sender whose receiver is already gone, for runs without progress output.
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = EventChannel::new();
    sender
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ScanEvent, ScanProgress, SearchEvent};
    use std::thread;

    #[test]
    fn events_can_be_sent_across_threads() {
        let (sender, receiver) = EventChannel::new();

        let handle = thread::spawn(move || {
            sender.send(Event::Scan(ScanEvent::Progress(ScanProgress {
                processed: 25,
                total: 40,
                ..Default::default()
            })));
        });

        handle.join().unwrap();

        let event = receiver.recv().unwrap();
        match event {
            Event::Scan(ScanEvent::Progress(p)) => {
                assert_eq!(p.processed, 25);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn null_sender_does_not_panic() {
        let sender = null_sender();
        sender.send(Event::Scan(ScanEvent::Cancelled));
    }

    #[test]
    fn bounded_channel_respects_capacity() {
        let (sender, receiver) = EventChannel::bounded(2);

        let event = || {
            Event::Search(SearchEvent::MatchConfirmed {
                path: "/a.jpg".to_string(),
                similarity_score: 0.9,
            })
        };
        sender.send(event());
        sender.send(event());

        assert!(receiver.try_recv().is_some());
        assert!(receiver.try_recv().is_some());
        assert!(receiver.try_recv().is_none());
    }
}
