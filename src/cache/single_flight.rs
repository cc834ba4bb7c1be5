//! In-flight request coalescing.
//!
//! A mapping from cache key to a completion handle: the first caller
//! installs its loader, later callers await the same shared future, so at
//! most one loader runs per key at any moment.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::RiskError;

/// Loader outcome shared between coalesced callers
pub(crate) type SharedOutcome = Result<serde_json::Value, Arc<RiskError>>;

type Flight = Shared<BoxFuture<'static, SharedOutcome>>;

#[derive(Default)]
pub(crate) struct SingleFlight {
    // Generation counter guards removal: a slow caller finishing an old
    // flight must not evict a newer flight installed under the same key.
    flights: Mutex<HashMap<String, (u64, Flight)>>,
    generation: Mutex<u64>,
}

impl SingleFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of loaders currently in flight
    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.flights.lock().expect("flight map poisoned").len()
    }

    /// Join the flight for `key`, installing `make` as its loader if none
    /// is running. Returns the shared outcome and whether this caller
    /// joined an existing flight.
    pub(crate) async fn run<F>(&self, key: &str, make: F) -> (SharedOutcome, bool)
    where
        F: FnOnce() -> BoxFuture<'static, SharedOutcome>,
    {
        let (flight, generation, joined) = {
            let mut flights = self.flights.lock().expect("flight map poisoned");
            if let Some((generation, existing)) = flights.get(key) {
                debug!(key = %key, "Joining in-flight load");
                (existing.clone(), *generation, true)
            } else {
                let generation = {
                    let mut counter = self.generation.lock().expect("generation poisoned");
                    *counter += 1;
                    *counter
                };
                let flight = make().shared();
                flights.insert(key.to_string(), (generation, flight.clone()));
                (flight, generation, false)
            }
        };

        let outcome = flight.await;

        let mut flights = self.flights.lock().expect("flight map poisoned");
        if flights
            .get(key)
            .is_some_and(|(current, _)| *current == generation)
        {
            flights.remove(key);
        }

        (outcome, joined)
    }
}
