// src/scheduling.rs
//
// Availability reconciliation: keeps a doctor's availability_slot rows in step
// with the active appointments that reference them. Slots are flipped on
// reschedule and cancellation; appointment creation does not touch them (see
// the TODO in routes/appointment_routes.rs).

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("appointment not found")]
    NotFound,
    #[error("doctor is not available at the requested date and time")]
    Conflict,
    #[error("data access failed: {0}")]
    Infrastructure(String),
}

impl From<sqlx::Error> for ScheduleError {
    fn from(e: sqlx::Error) -> Self {
        ScheduleError::Infrastructure(format!("db error: {e}"))
    }
}

/// Slot state stored as smallint: 1 free, 0 occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Occupied,
    Free,
}

impl SlotStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            SlotStatus::Occupied => 0,
            SlotStatus::Free => 1,
        }
    }

    pub fn from_i16(v: i16) -> Self {
        if v == 0 { SlotStatus::Occupied } else { SlotStatus::Free }
    }
}

/// Persistence seam for the reconciliation rule. The slot table is addressed
/// by (doctor, date, time); `set_slot_status` is a no-op when no such row
/// exists and idempotent when the row is already in the requested state.
#[async_trait]
pub trait SlotStore {
    async fn check_availability(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, ScheduleError>;

    async fn set_slot_status(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        time: NaiveTime,
        status: SlotStatus,
    ) -> Result<(), ScheduleError>;
}

pub async fn release_slot<S: SlotStore + ?Sized>(
    store: &S,
    doctor_id: i64,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<(), ScheduleError> {
    store.set_slot_status(doctor_id, date, time, SlotStatus::Free).await
}

pub async fn occupy_slot<S: SlotStore + ?Sized>(
    store: &S,
    doctor_id: i64,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<(), ScheduleError> {
    store.set_slot_status(doctor_id, date, time, SlotStatus::Occupied).await
}

/// Move a booking from `old` to `new` for one doctor.
///
/// Fails with `Conflict` before any write when the new slot is not free.
/// Otherwise releases the old slot, then occupies the new one, as two separate
/// statements (no transaction). The check and the flips are not atomic, so two
/// concurrent reschedules can both pass the check; that race is inherited from
/// the system this replaces and is not guarded here.
pub async fn reschedule<S: SlotStore + ?Sized>(
    store: &S,
    doctor_id: i64,
    old: (NaiveDate, NaiveTime),
    new: (NaiveDate, NaiveTime),
) -> Result<(), ScheduleError> {
    if !store.check_availability(doctor_id, new.0, new.1).await? {
        return Err(ScheduleError::Conflict);
    }

    release_slot(store, doctor_id, old.0, old.1).await?;
    occupy_slot(store, doctor_id, new.0, new.1).await?;
    Ok(())
}

/// Reschedule only when the coordinates actually changed. An update that
/// keeps the same date and time must not touch the slot table at all, so it
/// returns `Ok(false)` without calling the store. Returns `Ok(true)` when a
/// reschedule ran.
pub async fn reschedule_if_changed<S: SlotStore + ?Sized>(
    store: &S,
    doctor_id: i64,
    old: (NaiveDate, NaiveTime),
    new: (NaiveDate, NaiveTime),
) -> Result<bool, ScheduleError> {
    if old == new {
        return Ok(false);
    }
    reschedule(store, doctor_id, old, new).await?;
    Ok(true)
}

#[async_trait]
impl SlotStore for PgPool {
    async fn check_availability(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, ScheduleError> {
        let row: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT slot_id
            FROM availability_slot
            WHERE doctor_id = $1 AND slot_date = $2 AND slot_time = $3
              AND status = 1
            "#,
        )
        .bind(doctor_id)
        .bind(date)
        .bind(time)
        .fetch_optional(self)
        .await?;

        Ok(row.is_some())
    }

    async fn set_slot_status(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        time: NaiveTime,
        status: SlotStatus,
    ) -> Result<(), ScheduleError> {
        // Missing rows are deliberately swallowed: releasing a slot that was
        // never published must not fail the containing operation.
        sqlx::query(
            r#"
            UPDATE availability_slot
            SET status = $4
            WHERE doctor_id = $1 AND slot_date = $2 AND slot_time = $3
            "#,
        )
        .bind(doctor_id)
        .bind(date)
        .bind(time)
        .bind(status.as_i16())
        .execute(self)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory slot table keyed by (doctor, date, time), with the same
    /// swallow-missing-rows semantics as the Postgres implementation.
    struct MemSlots {
        slots: Mutex<HashMap<(i64, NaiveDate, NaiveTime), SlotStatus>>,
    }

    impl MemSlots {
        fn new() -> Self {
            Self {
                slots: Mutex::new(HashMap::new()),
            }
        }

        fn publish(&self, doctor_id: i64, date: NaiveDate, time: NaiveTime) {
            self.slots
                .lock()
                .unwrap()
                .insert((doctor_id, date, time), SlotStatus::Free);
        }

        fn status_of(&self, doctor_id: i64, date: NaiveDate, time: NaiveTime) -> Option<SlotStatus> {
            self.slots.lock().unwrap().get(&(doctor_id, date, time)).copied()
        }
    }

    #[async_trait]
    impl SlotStore for MemSlots {
        async fn check_availability(
            &self,
            doctor_id: i64,
            date: NaiveDate,
            time: NaiveTime,
        ) -> Result<bool, ScheduleError> {
            Ok(self.status_of(doctor_id, date, time) == Some(SlotStatus::Free))
        }

        async fn set_slot_status(
            &self,
            doctor_id: i64,
            date: NaiveDate,
            time: NaiveTime,
            status: SlotStatus,
        ) -> Result<(), ScheduleError> {
            let mut slots = self.slots.lock().unwrap();
            if let Some(s) = slots.get_mut(&(doctor_id, date, time)) {
                *s = status;
            }
            Ok(())
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    #[tokio::test]
    async fn occupy_then_release_round_trip() {
        let store = MemSlots::new();
        store.publish(1, d("2024-06-01"), t("09:00"));

        occupy_slot(&store, 1, d("2024-06-01"), t("09:00")).await.unwrap();
        assert!(!store.check_availability(1, d("2024-06-01"), t("09:00")).await.unwrap());

        release_slot(&store, 1, d("2024-06-01"), t("09:00")).await.unwrap();
        assert!(store.check_availability(1, d("2024-06-01"), t("09:00")).await.unwrap());
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let store = MemSlots::new();
        store.publish(1, d("2024-06-01"), t("09:00"));

        release_slot(&store, 1, d("2024-06-01"), t("09:00")).await.unwrap();
        release_slot(&store, 1, d("2024-06-01"), t("09:00")).await.unwrap();
        assert_eq!(
            store.status_of(1, d("2024-06-01"), t("09:00")),
            Some(SlotStatus::Free)
        );
    }

    #[tokio::test]
    async fn set_status_on_missing_row_is_a_noop() {
        let store = MemSlots::new();

        // No slot was ever published for this coordinate.
        release_slot(&store, 7, d("2024-06-01"), t("09:00")).await.unwrap();
        occupy_slot(&store, 7, d("2024-06-01"), t("09:00")).await.unwrap();
        assert_eq!(store.status_of(7, d("2024-06-01"), t("09:00")), None);
    }

    #[tokio::test]
    async fn check_availability_false_when_slot_absent() {
        let store = MemSlots::new();
        assert!(!store.check_availability(1, d("2024-06-01"), t("09:00")).await.unwrap());
    }

    #[tokio::test]
    async fn reschedule_conflict_leaves_slots_untouched() {
        let store = MemSlots::new();
        store.publish(1, d("2024-06-01"), t("09:00"));
        store.publish(1, d("2024-06-01"), t("10:00"));
        occupy_slot(&store, 1, d("2024-06-01"), t("09:00")).await.unwrap();
        occupy_slot(&store, 1, d("2024-06-01"), t("10:00")).await.unwrap();

        let err = reschedule(
            &store,
            1,
            (d("2024-06-01"), t("09:00")),
            (d("2024-06-01"), t("10:00")),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ScheduleError::Conflict));
        assert_eq!(
            store.status_of(1, d("2024-06-01"), t("09:00")),
            Some(SlotStatus::Occupied)
        );
        assert_eq!(
            store.status_of(1, d("2024-06-01"), t("10:00")),
            Some(SlotStatus::Occupied)
        );
    }

    #[tokio::test]
    async fn reschedule_moves_occupancy() {
        let store = MemSlots::new();
        store.publish(1, d("2024-06-01"), t("09:00"));
        store.publish(1, d("2024-06-02"), t("11:30"));
        occupy_slot(&store, 1, d("2024-06-01"), t("09:00")).await.unwrap();

        reschedule(
            &store,
            1,
            (d("2024-06-01"), t("09:00")),
            (d("2024-06-02"), t("11:30")),
        )
        .await
        .unwrap();

        assert_eq!(
            store.status_of(1, d("2024-06-01"), t("09:00")),
            Some(SlotStatus::Free)
        );
        assert_eq!(
            store.status_of(1, d("2024-06-02"), t("11:30")),
            Some(SlotStatus::Occupied)
        );
    }

    // Booking never occupies a slot today (see the TODO at the create
    // handler), so a later reschedule releases a slot that was never taken.
    // This mirrors the shipped behavior; it is a known gap, not a guarantee.
    #[tokio::test]
    async fn create_then_reschedule_scenario() {
        let store = MemSlots::new();
        store.publish(1, d("2024-06-01"), t("09:00"));
        store.publish(1, d("2024-06-01"), t("10:00"));

        // "Create" for (2024-06-01, 09:00): no store interaction at all.
        assert_eq!(
            store.status_of(1, d("2024-06-01"), t("09:00")),
            Some(SlotStatus::Free)
        );

        // Reschedule to 10:00. The 09:00 release is a harmless flip of an
        // already-free row; 10:00 becomes occupied.
        reschedule(
            &store,
            1,
            (d("2024-06-01"), t("09:00")),
            (d("2024-06-01"), t("10:00")),
        )
        .await
        .unwrap();

        assert_eq!(
            store.status_of(1, d("2024-06-01"), t("09:00")),
            Some(SlotStatus::Free)
        );
        assert_eq!(
            store.status_of(1, d("2024-06-01"), t("10:00")),
            Some(SlotStatus::Occupied)
        );
    }

    // The appointment itself is booked into the only published slot. If the
    // availability check ran for an unchanged date/time it would see the slot
    // occupied and Conflict, so Ok(false) here proves the store was never
    // consulted.
    #[tokio::test]
    async fn unchanged_coordinates_skip_the_slot_table() {
        let store = MemSlots::new();
        store.publish(1, d("2024-06-01"), t("09:00"));
        occupy_slot(&store, 1, d("2024-06-01"), t("09:00")).await.unwrap();

        let moved = reschedule_if_changed(
            &store,
            1,
            (d("2024-06-01"), t("09:00")),
            (d("2024-06-01"), t("09:00")),
        )
        .await
        .unwrap();

        assert!(!moved);
        assert_eq!(
            store.status_of(1, d("2024-06-01"), t("09:00")),
            Some(SlotStatus::Occupied)
        );
    }

    #[tokio::test]
    async fn changed_coordinates_reschedule() {
        let store = MemSlots::new();
        store.publish(1, d("2024-06-01"), t("09:00"));
        store.publish(1, d("2024-06-01"), t("10:00"));
        occupy_slot(&store, 1, d("2024-06-01"), t("09:00")).await.unwrap();

        let moved = reschedule_if_changed(
            &store,
            1,
            (d("2024-06-01"), t("09:00")),
            (d("2024-06-01"), t("10:00")),
        )
        .await
        .unwrap();

        assert!(moved);
        assert_eq!(
            store.status_of(1, d("2024-06-01"), t("09:00")),
            Some(SlotStatus::Free)
        );
        assert_eq!(
            store.status_of(1, d("2024-06-01"), t("10:00")),
            Some(SlotStatus::Occupied)
        );
    }

    #[test]
    fn slot_status_smallint_mapping() {
        assert_eq!(SlotStatus::Free.as_i16(), 1);
        assert_eq!(SlotStatus::Occupied.as_i16(), 0);
        assert_eq!(SlotStatus::from_i16(1), SlotStatus::Free);
        assert_eq!(SlotStatus::from_i16(0), SlotStatus::Occupied);
    }
}
