//! # Events Module
//!
//! Progress reporting for scans and searches.
//!
//! ## Design
//! The core library emits events through channels, allowing any front end
//! to subscribe and display progress.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! // In a separate thread, listen for events
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Scan(ScanEvent::Progress(p)) => println!("{}/{}", p.processed, p.total),
//!             Event::Search(SearchEvent::MatchConfirmed { path, .. }) => println!("{path}"),
//!             _ => {}
//!         }
//!     }
//! });
//!
//! // Run the scan with the sender
//! pipeline.scan_with_events(&options, &sender)?;
//! ```

mod channel;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender, null_sender};
pub use types::*;
