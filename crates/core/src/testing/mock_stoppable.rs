//! Mock stoppable resource for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::lifecycle::Stoppable;

/// Stoppable that counts how often it was stopped.
#[derive(Debug, Default)]
pub struct MockStoppable {
    name: String,
    stops: AtomicUsize,
}

impl MockStoppable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_count() > 0
    }
}

#[async_trait]
impl Stoppable for MockStoppable {
    fn describe(&self) -> String {
        format!("mock resource {}", self.name)
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}
