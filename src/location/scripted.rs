//! Position sources that do not talk to hardware.
//!
//! `FixedPositionSource` always reports the same place (kiosk setups, demos).
//! `ScriptedPositionSource` replays a queue of fixes and failures, which is
//! how walks through a quest are simulated.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{LocationError, PositionReading, PositionRequest, PositionSource};
use crate::geo::Coordinate;

/// Always reports the same coordinate, freshly stamped.
pub struct FixedPositionSource {
    coordinate: Coordinate,
    accuracy_meters: f64,
}

impl FixedPositionSource {
    pub fn new(coordinate: Coordinate, accuracy_meters: f64) -> Self {
        Self {
            coordinate,
            accuracy_meters,
        }
    }
}

#[async_trait]
impl PositionSource for FixedPositionSource {
    async fn locate(&self, _request: &PositionRequest) -> Result<PositionReading, LocationError> {
        Ok(PositionReading::new(self.coordinate, self.accuracy_meters))
    }
}

enum Scripted {
    /// Stamped when delivered.
    Fix(Coordinate, f64),
    Reading(PositionReading),
    Fail(LocationError),
}

/// Replays queued outcomes in order.
///
/// Once the queue is drained the last delivered fix is repeated; with no fix
/// ever delivered the source reports `PositionUnavailable`.
pub struct ScriptedPositionSource {
    queue: Mutex<VecDeque<Scripted>>,
    last: Mutex<Option<(Coordinate, f64)>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedPositionSource {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Wait this long before answering each query.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_ok(&self, coordinate: Coordinate, accuracy_meters: f64) {
        self.push(Scripted::Fix(coordinate, accuracy_meters));
    }

    pub fn push_reading(&self, reading: PositionReading) {
        self.push(Scripted::Reading(reading));
    }

    pub fn push_err(&self, error: LocationError) {
        self.push(Scripted::Fail(error));
    }

    /// Number of queries answered so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn push(&self, item: Scripted) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(item);
        }
    }

    fn next(&self) -> Option<Scripted> {
        self.queue.lock().ok().and_then(|mut queue| queue.pop_front())
    }
}

impl Default for ScriptedPositionSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionSource for ScriptedPositionSource {
    async fn locate(&self, _request: &PositionRequest) -> Result<PositionReading, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let remember = |coordinate: Coordinate, accuracy: f64| {
            if let Ok(mut last) = self.last.lock() {
                *last = Some((coordinate, accuracy));
            }
        };

        match self.next() {
            Some(Scripted::Fix(coordinate, accuracy)) => {
                remember(coordinate, accuracy);
                Ok(PositionReading::new(coordinate, accuracy))
            }
            Some(Scripted::Reading(reading)) => {
                remember(reading.coordinate, reading.accuracy_meters);
                Ok(reading)
            }
            Some(Scripted::Fail(error)) => Err(error),
            None => {
                let last = self.last.lock().ok().and_then(|last| *last);
                match last {
                    Some((coordinate, accuracy)) => Ok(PositionReading::new(coordinate, accuracy)),
                    None => Err(LocationError::PositionUnavailable(
                        "no position scripted".to_string(),
                    )),
                }
            }
        }
    }
}
