//! Serializable unit-of-work helper and the translation of database failures
//! into the typed markers use cases recognise.

use diesel::{
    PgConnection,
    result::{DatabaseErrorKind, Error as DieselError},
};

use crate::domain::value_objects::storage_errors::{DuplicateRecord, SlotOverlap, TransactionConflict};

pub const BOOKINGS_NO_OVERLAP: &str = "bookings_no_overlap";

/// Runs `work` under SERIALIZABLE isolation. Failures are mapped through
/// [`map_database_error`]; the caller decides whether to retry.
pub fn run_serializable<T, F>(conn: &mut PgConnection, work: F) -> anyhow::Result<T>
where
    F: FnOnce(&mut PgConnection) -> Result<T, DieselError>,
{
    conn.build_transaction()
        .serializable()
        .run(work)
        .map_err(map_database_error)
}

pub fn map_database_error(err: DieselError) -> anyhow::Error {
    if let DieselError::DatabaseError(kind, info) = &err {
        if matches!(kind, DatabaseErrorKind::SerializationFailure) {
            return TransactionConflict.into();
        }

        if info.constraint_name() == Some(BOOKINGS_NO_OVERLAP) {
            return SlotOverlap.into();
        }

        if matches!(kind, DatabaseErrorKind::UniqueViolation) {
            return DuplicateRecord {
                constraint: info.constraint_name().unwrap_or_default().to_string(),
            }
            .into();
        }
    }

    anyhow::Error::new(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_diesel_errors_stay_untyped() {
        let err = map_database_error(DieselError::NotFound);

        assert!(!err.is::<TransactionConflict>());
        assert!(!err.is::<SlotOverlap>());
        assert!(err.downcast_ref::<DieselError>().is_some());
    }

    #[test]
    fn rollback_is_not_a_conflict() {
        let err = map_database_error(DieselError::RollbackTransaction);
        assert!(!err.is::<TransactionConflict>());
    }
}
