use async_trait::async_trait;
use chrono::{DateTime, Utc};
use convoy_core::{
    Booking, BookingStatus, Precondition, RiderBooking, StoreError, StoreResult, Trip, TripRepository, TripStatus,
    WriteOutcome,
};
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use tracing::error;
use uuid::Uuid;

/// Postgres-backed trips. Seat changes lock the trip row with a conditional
/// `UPDATE` and touch `bookings` in the same transaction.
#[derive(Clone)]
pub struct PostgresTripRepository {
    pub pool: PgPool,
}

impl PostgresTripRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    operator_id: String,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    seats: i32,
    booked_seats: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    trip_id: Uuid,
    rider_id: String,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct RiderBookingRow {
    booking_id: Uuid,
    trip_id: Uuid,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    trip_status: String,
    status: String,
}

impl BookingRow {
    fn into_booking(self) -> StoreResult<Booking> {
        Ok(Booking {
            id: self.id,
            trip_id: self.trip_id,
            rider_id: self.rider_id,
            status: self.status.parse()?,
            created_at: self.created_at,
        })
    }
}

impl TripRow {
    fn into_trip(self, bookings: Vec<Booking>) -> StoreResult<Trip> {
        Ok(Trip {
            id: self.id,
            operator_id: self.operator_id,
            origin: self.origin,
            destination: self.destination,
            departure_time: self.departure_time,
            seats: count(self.seats)?,
            booked_seats: count(self.booked_seats)?,
            status: self.status.parse()?,
            bookings,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl RiderBookingRow {
    fn into_rider_booking(self) -> StoreResult<RiderBooking> {
        Ok(RiderBooking {
            booking_id: self.booking_id,
            trip_id: self.trip_id,
            origin: self.origin,
            destination: self.destination,
            departure_time: self.departure_time,
            trip_status: self.trip_status.parse()?,
            status: self.status.parse()?,
        })
    }
}

fn count(value: i32) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Malformed(format!("negative seat count {value}")))
}

fn db_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut => StoreError::Timeout("connection pool exhausted".to_string()),
        sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
            StoreError::Unavailable(err.to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Malformed(err.to_string())
        }
        _ => {
            error!(error = %err, "database error");
            StoreError::Unavailable(err.to_string())
        }
    }
}

const TRIP_COLUMNS: &str =
    "id, operator_id, origin, destination, departure_time, seats, booked_seats, status, created_at, updated_at";

async fn fetch_trip(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<Trip>> {
    let row = sqlx::query_as::<_, TripRow>(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;

    let Some(row) = row else {
        return Ok(None);
    };

    let bookings = sqlx::query_as::<_, BookingRow>(
        "SELECT id, trip_id, rider_id, status, created_at FROM bookings WHERE trip_id = $1 ORDER BY created_at, id",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error)?
    .into_iter()
    .map(BookingRow::into_booking)
    .collect::<StoreResult<Vec<_>>>()?;

    row.into_trip(bookings).map(Some)
}

/// Reads the post-write document inside the transaction and commits it.
async fn commit_with_trip(mut tx: sqlx::Transaction<'_, sqlx::Postgres>, id: Uuid) -> StoreResult<WriteOutcome> {
    let trip = fetch_trip(&mut tx, id).await?;
    tx.commit().await.map_err(db_error)?;
    Ok(trip.map_or(WriteOutcome::PreconditionFailed, WriteOutcome::Applied))
}

async fn abandon(tx: sqlx::Transaction<'_, sqlx::Postgres>) -> StoreResult<WriteOutcome> {
    tx.rollback().await.map_err(db_error)?;
    Ok(WriteOutcome::PreconditionFailed)
}

#[async_trait]
impl TripRepository for PostgresTripRepository {
    async fn load_trip(&self, id: Uuid) -> StoreResult<Option<Trip>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        fetch_trip(&mut conn, id).await
    }

    async fn insert_trip(&self, trip: &Trip) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO trips (id, operator_id, origin, destination, departure_time, seats, booked_seats, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(trip.id)
        .bind(&trip.operator_id)
        .bind(&trip.origin)
        .bind(&trip.destination)
        .bind(trip.departure_time)
        .bind(trip.seats as i32)
        .bind(trip.booked_seats as i32)
        .bind(trip.status.as_str())
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn push_booking(&self, trip_id: Uuid, expected_booked: u32, booking: &Booking) -> StoreResult<WriteOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let claimed = sqlx::query(
            r#"
            UPDATE trips SET booked_seats = booked_seats + 1, updated_at = NOW()
            WHERE id = $1 AND booked_seats = $2 AND booked_seats < seats AND status = 'active'
            "#,
        )
        .bind(trip_id)
        .bind(expected_booked as i32)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if claimed.rows_affected() == 0 {
            return abandon(tx).await;
        }

        sqlx::query("INSERT INTO bookings (id, trip_id, rider_id, status, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(booking.id)
            .bind(trip_id)
            .bind(&booking.rider_id)
            .bind(booking.status.as_str())
            .bind(booking.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        commit_with_trip(tx, trip_id).await
    }

    async fn pull_booking(
        &self,
        trip_id: Uuid,
        expected_booked: u32,
        booking_id: Uuid,
        expected_status: BookingStatus,
    ) -> StoreResult<WriteOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let released = sqlx::query(
            r#"
            UPDATE trips SET booked_seats = booked_seats - 1, updated_at = NOW()
            WHERE id = $1 AND booked_seats = $2 AND booked_seats > 0
            "#,
        )
        .bind(trip_id)
        .bind(expected_booked as i32)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if released.rows_affected() == 0 {
            return abandon(tx).await;
        }

        let removed = sqlx::query("DELETE FROM bookings WHERE id = $1 AND trip_id = $2 AND status = $3")
            .bind(booking_id)
            .bind(trip_id)
            .bind(expected_status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        if removed.rows_affected() == 0 {
            return abandon(tx).await;
        }

        commit_with_trip(tx, trip_id).await
    }

    async fn update_trip(&self, trip: &Trip, expected: Precondition) -> StoreResult<WriteOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE trips
            SET origin = $2, destination = $3, departure_time = $4, seats = $5, status = $6, updated_at = NOW()
            WHERE id = $1 AND booked_seats = $7 AND status = $8 AND $5 >= booked_seats
            "#,
        )
        .bind(trip.id)
        .bind(&trip.origin)
        .bind(&trip.destination)
        .bind(trip.departure_time)
        .bind(trip.seats as i32)
        .bind(trip.status.as_str())
        .bind(expected.booked_seats as i32)
        .bind(expected.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if updated.rows_affected() == 0 {
            return abandon(tx).await;
        }

        commit_with_trip(tx, trip.id).await
    }

    async fn advance_booking(
        &self,
        trip_id: Uuid,
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<WriteOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // Locks the trip row so completion is derived from a stable booking set.
        let locked = sqlx::query("UPDATE trips SET updated_at = NOW() WHERE id = $1 AND status = 'active'")
            .bind(trip_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        if locked.rows_affected() == 0 {
            return abandon(tx).await;
        }

        let advanced = sqlx::query("UPDATE bookings SET status = $3 WHERE id = $1 AND trip_id = $2 AND status = $4")
            .bind(booking_id)
            .bind(trip_id)
            .bind(to.as_str())
            .bind(from.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        if advanced.rows_affected() == 0 {
            return abandon(tx).await;
        }

        sqlx::query(
            r#"
            UPDATE trips SET status = 'completed'
            WHERE id = $1
              AND EXISTS (SELECT 1 FROM bookings WHERE trip_id = $1)
              AND NOT EXISTS (SELECT 1 FROM bookings WHERE trip_id = $1 AND status <> 'completed')
            "#,
        )
        .bind(trip_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        commit_with_trip(tx, trip_id).await
    }

    async fn delete_trip(&self, trip_id: Uuid, expected: Precondition) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM trips WHERE id = $1 AND booked_seats = $2 AND status = $3")
            .bind(trip_id)
            .bind(expected.booked_seats as i32)
            .bind(expected.status.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(deleted.rows_affected() > 0)
    }

    async fn list_trips(&self, statuses: &[TripStatus]) -> StoreResult<Vec<Trip>> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();

        let rows = sqlx::query_as::<_, TripRow>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE status = ANY($1) ORDER BY departure_time, id"
        ))
        .bind(statuses)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut by_trip: HashMap<Uuid, Vec<Booking>> = HashMap::new();
        let bookings = sqlx::query_as::<_, BookingRow>(
            "SELECT id, trip_id, rider_id, status, created_at FROM bookings WHERE trip_id = ANY($1) ORDER BY created_at, id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        for row in bookings {
            let booking = row.into_booking()?;
            by_trip.entry(booking.trip_id).or_default().push(booking);
        }

        rows.into_iter()
            .map(|row| {
                let bookings = by_trip.remove(&row.id).unwrap_or_default();
                row.into_trip(bookings)
            })
            .collect()
    }

    async fn rider_bookings(&self, rider_id: &str) -> StoreResult<Vec<RiderBooking>> {
        sqlx::query_as::<_, RiderBookingRow>(
            r#"
            SELECT b.id AS booking_id, b.trip_id, t.origin, t.destination, t.departure_time,
                   t.status AS trip_status, b.status
            FROM bookings b
            JOIN trips t ON t.id = b.trip_id
            WHERE b.rider_id = $1
            ORDER BY t.departure_time
            "#,
        )
        .bind(rider_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(RiderBookingRow::into_rider_booking)
        .collect()
    }
}
