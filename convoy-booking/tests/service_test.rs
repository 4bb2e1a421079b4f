mod common;

use chrono::Duration;
use common::harness;
use convoy_booking::{BookingError, NewTrip, TripChanges};
use convoy_catalog::listing_key;
use convoy_core::{BookingStatus, TripStatus};
use convoy_rules::ErrorCode;
use convoy_shared::RideEventKind;
use uuid::Uuid;

fn code<T: std::fmt::Debug>(result: Result<T, BookingError>) -> ErrorCode {
    match result {
        Err(BookingError::Rejected(rejection)) => rejection.code,
        other => panic!("expected a rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_rejects_invalid_trips() {
    let h = harness().await;
    let request = |seats, departs_in: Duration| NewTrip {
        origin: "Lyon".to_string(),
        destination: "Paris".to_string(),
        departure_time: h.now + departs_in,
        seats,
    };

    assert!(matches!(
        h.service.create_trip("agency-1", request(0, Duration::hours(2))).await,
        Err(BookingError::Invalid(_))
    ));
    assert!(matches!(
        h.service.create_trip("agency-1", request(u32::MAX, Duration::hours(2))).await,
        Err(BookingError::Invalid(_))
    ));
    assert!(matches!(
        h.service.create_trip("agency-1", request(3, Duration::hours(-2))).await,
        Err(BookingError::Invalid(_))
    ));

    let draft = h.service.create_trip("agency-1", request(3, Duration::hours(2))).await.unwrap();
    assert_eq!(draft.status, TripStatus::Pending);
    assert!(h.service.listing().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_publish_only_from_pending() {
    let h = harness().await;
    let trip = h.published_trip(3, Duration::hours(6)).await;

    assert_eq!(trip.status, TripStatus::Active);
    assert!(matches!(h.service.publish_trip(trip.id).await, Err(BookingError::Lifecycle(_))));
    assert!(matches!(h.service.publish_trip(Uuid::new_v4()).await, Err(BookingError::NotFound(_))));
}

#[tokio::test]
async fn test_booking_a_draft_is_a_rule_violation() {
    let h = harness().await;
    let draft = h
        .service
        .create_trip(
            "agency-1",
            NewTrip {
                origin: "Lyon".to_string(),
                destination: "Paris".to_string(),
                departure_time: h.now + Duration::hours(6),
                seats: 2,
            },
        )
        .await
        .unwrap();

    assert_eq!(code(h.service.book_seat(draft.id, "rider-1").await), ErrorCode::BusinessRuleViolation);
}

#[tokio::test]
async fn test_book_seat_notifies_and_keeps_invariant() {
    let h = harness().await;
    let trip = h.published_trip(2, Duration::hours(6)).await;

    let claim = h.service.book_seat(trip.id, "rider-1").await.unwrap();

    assert_eq!(claim.booking.status, BookingStatus::Pending);
    assert_eq!(claim.trip.booked_seats, 1);
    assert!(claim.trip.is_consistent());
    assert_eq!(code(h.service.book_seat(trip.id, "rider-1").await), ErrorCode::AlreadyBooked);

    let created: Vec<_> = h
        .notifier
        .events()
        .into_iter()
        .filter(|e| e.kind == RideEventKind::BookingCreated)
        .collect();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].rider_ids[0].expose(), "rider-1");
}

#[tokio::test]
async fn test_reads_reflect_accepted_mutations() {
    let h = harness().await;
    let trip = h.published_trip(2, Duration::hours(6)).await;

    assert_eq!(h.service.listing().await.unwrap()[0].available_seats, 2);
    assert!(h.service.rider_trips("rider-1").await.unwrap().trips.is_empty());

    let claim = h.service.book_seat(trip.id, "rider-1").await.unwrap();
    assert_eq!(h.service.listing().await.unwrap()[0].available_seats, 1);
    assert_eq!(h.service.rider_trips("rider-1").await.unwrap().trips.len(), 1);

    h.service.cancel_booking(trip.id, claim.booking.id, Some("rider-1")).await.unwrap();
    assert_eq!(h.service.listing().await.unwrap()[0].available_seats, 2);
    assert!(h.service.rider_trips("rider-1").await.unwrap().trips.is_empty());
}

#[tokio::test]
async fn test_cache_outage_never_fails_a_mutation() {
    let h = harness().await;
    let trip = h.published_trip(2, Duration::hours(6)).await;
    h.cache.set_offline(true);

    h.service.book_seat(trip.id, "rider-1").await.unwrap();

    assert_eq!(h.service.listing().await.unwrap()[0].available_seats, 1);
    h.cache.set_offline(false);
    assert_eq!(h.service.warm_cache().await.unwrap(), 1);
    assert!(h.cache.contains(&listing_key()));
}

#[tokio::test]
async fn test_notifier_outage_never_fails_a_mutation() {
    let h = harness().await;
    let trip = h.published_trip(2, Duration::hours(6)).await;
    h.notifier.set_failing(true);

    let claim = h.service.book_seat(trip.id, "rider-1").await.unwrap();

    assert_eq!(h.reload(&trip).await.booked_seats, 1);
    assert!(h.reload(&trip).await.booking(claim.booking.id).is_some());
}

#[tokio::test]
async fn test_cancel_trip_notifies_booked_riders() {
    let h = harness().await;
    let trip = h.published_trip(3, Duration::hours(6)).await;
    h.service.book_seat(trip.id, "rider-1").await.unwrap();
    h.service.book_seat(trip.id, "rider-2").await.unwrap();

    let canceled = h.service.cancel_trip(trip.id, Some("agency-1")).await.unwrap();

    assert_eq!(canceled.status, TripStatus::Canceled);
    assert_eq!(canceled.booked_seats, 2);
    assert!(h.service.listing().await.unwrap().is_empty());

    let event = h
        .notifier
        .events()
        .into_iter()
        .find(|e| e.kind == RideEventKind::TripCanceled)
        .unwrap();
    let mut riders: Vec<String> = event.rider_ids.into_iter().map(|r| r.into_inner()).collect();
    riders.sort();
    assert_eq!(riders, vec!["rider-1", "rider-2"]);

    assert_eq!(code(h.service.cancel_trip(trip.id, None).await), ErrorCode::RideAlreadyCanceled);
    assert_eq!(code(h.service.book_seat(trip.id, "rider-3").await), ErrorCode::RideCanceled);
}

#[tokio::test]
async fn test_cancel_trip_too_close_to_departure() {
    let h = harness().await;
    let trip = h.published_trip(3, Duration::minutes(20)).await;

    assert_eq!(code(h.service.cancel_trip(trip.id, None).await), ErrorCode::CancellationTooLate);
    assert_eq!(h.reload(&trip).await.status, TripStatus::Active);
}

#[tokio::test]
async fn test_delete_requires_empty_trip() {
    let h = harness().await;
    let booked = h.published_trip(3, Duration::hours(6)).await;
    h.service.book_seat(booked.id, "rider-1").await.unwrap();

    assert_eq!(code(h.service.delete_trip(booked.id, None).await), ErrorCode::RideHasBookings);

    let empty = h.published_trip(3, Duration::hours(8)).await;
    h.service.delete_trip(empty.id, None).await.unwrap();
    assert!(matches!(h.service.get_trip(empty.id).await, Err(BookingError::NotFound(_))));
    assert_eq!(h.service.listing().await.unwrap().len(), 1);

    let deleted: Vec<_> = h
        .notifier
        .events()
        .into_iter()
        .filter(|e| e.kind == RideEventKind::TripDeleted)
        .collect();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].trip_id, empty.id);
}

#[tokio::test]
async fn test_update_trip() {
    let h = harness().await;
    let trip = h.published_trip(3, Duration::hours(6)).await;
    h.service.book_seat(trip.id, "rider-1").await.unwrap();
    h.service.book_seat(trip.id, "rider-2").await.unwrap();

    let shrink = TripChanges {
        seats: Some(1),
        ..TripChanges::default()
    };
    assert!(matches!(
        h.service.update_trip(trip.id, shrink, None).await,
        Err(BookingError::Invalid(_))
    ));

    let oversized = TripChanges {
        seats: Some(u32::MAX),
        ..TripChanges::default()
    };
    assert!(matches!(
        h.service.update_trip(trip.id, oversized, None).await,
        Err(BookingError::Invalid(_))
    ));

    let changes = TripChanges {
        destination: Some("Dijon".to_string()),
        seats: Some(4),
        ..TripChanges::default()
    };
    let updated = h.service.update_trip(trip.id, changes, Some("agency-1")).await.unwrap();

    assert_eq!(updated.destination, "Dijon");
    assert_eq!(updated.seats, 4);
    assert_eq!(updated.booked_seats, 2);
    assert!(updated.is_consistent());
    assert_eq!(h.service.listing().await.unwrap()[0].available_seats, 2);

    let event = h
        .notifier
        .events()
        .into_iter()
        .find(|e| e.kind == RideEventKind::TripUpdated)
        .unwrap();
    assert_eq!(event.rider_ids.len(), 2);
}

#[tokio::test]
async fn test_update_too_close_to_departure() {
    let h = harness().await;
    let trip = h.published_trip(3, Duration::minutes(45)).await;

    let changes = TripChanges {
        seats: Some(5),
        ..TripChanges::default()
    };
    assert_eq!(code(h.service.update_trip(trip.id, changes, None).await), ErrorCode::UpdateTooLate);
}

#[tokio::test]
async fn test_check_in_and_complete_finishes_trip() {
    let h = harness().await;
    let trip = h.published_trip(2, Duration::hours(6)).await;
    let first = h.service.book_seat(trip.id, "rider-1").await.unwrap().booking;
    let second = h.service.book_seat(trip.id, "rider-2").await.unwrap().booking;

    assert!(matches!(
        h.service.complete_booking(trip.id, first.id).await,
        Err(BookingError::Lifecycle(_))
    ));

    h.service.check_in(trip.id, first.id).await.unwrap();
    h.service.check_in(trip.id, second.id).await.unwrap();
    let partial = h.service.complete_booking(trip.id, first.id).await.unwrap();
    assert_eq!(partial.status, TripStatus::Active);

    let done = h.service.complete_booking(trip.id, second.id).await.unwrap();
    assert_eq!(done.status, TripStatus::Completed);
    assert!(done.is_consistent());
    assert!(h
        .notifier
        .events()
        .iter()
        .any(|e| e.kind == RideEventKind::TripCompleted));
    assert!(h.service.listing().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_booking_rules() {
    let h = harness().await;
    let trip = h.published_trip(2, Duration::hours(6)).await;
    let booking = h.service.book_seat(trip.id, "rider-1").await.unwrap().booking;
    h.service.check_in(trip.id, booking.id).await.unwrap();

    assert_eq!(
        code(h.service.cancel_booking(trip.id, booking.id, Some("rider-1")).await),
        ErrorCode::BookingAlreadyCheckedIn
    );
    assert!(matches!(
        h.service.cancel_booking(trip.id, Uuid::new_v4(), None).await,
        Err(BookingError::NotFound(_))
    ));
    assert_eq!(h.reload(&trip).await.booked_seats, 1);
}

#[tokio::test]
async fn test_release_returns_the_seat() {
    let h = harness().await;
    let trip = h.published_trip(1, Duration::hours(6)).await;
    let booking = h.service.book_seat(trip.id, "rider-1").await.unwrap().booking;
    assert_eq!(code(h.service.book_seat(trip.id, "rider-2").await), ErrorCode::RideFullyBooked);

    let release = h.service.cancel_booking(trip.id, booking.id, Some("rider-1")).await.unwrap();

    assert_eq!(release.trip.booked_seats, 0);
    assert!(release.trip.is_consistent());
    assert!(h
        .notifier
        .events()
        .iter()
        .any(|e| e.kind == RideEventKind::BookingCanceled));
    h.service.book_seat(trip.id, "rider-2").await.unwrap();
}
