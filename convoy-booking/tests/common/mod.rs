#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use convoy_booking::{NewTrip, TripService};
use convoy_catalog::{CacheCoordinator, CacheSettings};
use convoy_core::{Clock, FixedClock, Trip, TripRepository};
use convoy_rules::{ContextBuilder, RuleRegistry, ValidationGateway};
use convoy_store::{InMemoryCache, InMemoryNotifier, InMemoryTripRepository};
use std::sync::Arc;

pub struct Harness {
    pub store: Arc<InMemoryTripRepository>,
    pub cache: Arc<InMemoryCache>,
    pub notifier: Arc<InMemoryNotifier>,
    pub service: TripService,
    pub now: DateTime<Utc>,
}

pub async fn harness() -> Harness {
    let store = Arc::new(InMemoryTripRepository::new());
    harness_over(store.clone(), store, 0).await
}

/// Service running against `repository`, which may wrap `store`.
pub async fn harness_over(
    store: Arc<InMemoryTripRepository>,
    repository: Arc<dyn TripRepository>,
    claim_retries: u32,
) -> Harness {
    let now = Utc::now();
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(now));
    let cache = Arc::new(InMemoryCache::new());
    let notifier = Arc::new(InMemoryNotifier::new());

    let coordinator = Arc::new(CacheCoordinator::new(
        cache.clone(),
        repository.clone(),
        clock.clone(),
        CacheSettings::default(),
    ));
    coordinator.init().await;

    let service = TripService::new(
        repository,
        ValidationGateway::new(Arc::new(RuleRegistry::builtin())),
        ContextBuilder::default(),
        coordinator,
        notifier.clone(),
        clock,
    )
    .with_claim_retries(claim_retries);

    Harness {
        store,
        cache,
        notifier,
        service,
        now,
    }
}

impl Harness {
    pub async fn published_trip(&self, seats: u32, departs_in: Duration) -> Trip {
        let draft = self
            .service
            .create_trip(
                "agency-1",
                NewTrip {
                    origin: "Lyon".to_string(),
                    destination: "Paris".to_string(),
                    departure_time: self.now + departs_in,
                    seats,
                },
            )
            .await
            .unwrap();
        self.service.publish_trip(draft.id).await.unwrap()
    }

    pub async fn reload(&self, trip: &Trip) -> Trip {
        self.store.load_trip(trip.id).await.unwrap().unwrap()
    }
}
