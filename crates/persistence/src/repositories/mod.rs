//! Repository implementations for database operations.

pub mod equipment;
pub mod position;
pub mod zone;

use std::sync::Arc;

use domain::error::StoreError;
use domain::services::Stores;
use sqlx::PgPool;

pub use equipment::EquipmentRepository;
pub use position::PositionRepository;
pub use zone::ZoneRepository;

pub(crate) fn db_error(err: sqlx::Error) -> StoreError {
    StoreError::Database(err.to_string())
}

/// PostgreSQL-backed stores sharing one pool.
pub fn pg_stores(pool: PgPool) -> Stores {
    Stores {
        equipment: Arc::new(EquipmentRepository::new(pool.clone())),
        positions: Arc::new(PositionRepository::new(pool.clone())),
        zones: Arc::new(ZoneRepository::new(pool)),
    }
}
