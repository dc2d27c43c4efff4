//! The event source abstraction.
//!
//! The day command only needs "give me the events in this window"; keeping
//! that behind [`EventSource`] lets tests run the pipeline without a network.

use std::future::Future;
use std::pin::Pin;

use getcal_core::{DayWindow, EventRecord};

use crate::error::ProviderResult;

/// A boxed future for async trait methods.
///
/// Boxed futures keep the traits object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that can list the events of one day.
pub trait EventSource {
    /// Returns the events starting inside `window`, ordered by start time.
    ///
    /// An empty day yields an empty vector, not an error.
    fn fetch_day<'a>(&'a self, window: &'a DayWindow)
        -> BoxFuture<'a, ProviderResult<Vec<EventRecord>>>;
}
