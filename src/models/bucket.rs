//! The single bucket a gateway instance serves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Bucket row. The gateway is configured with one bucket name and creates the
/// row on first start; every object key lives inside it.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Bucket {
    pub id: Uuid,

    /// S3-style bucket name (3-63 chars, lowercase, digits, dots, hyphens).
    pub name: String,

    pub owner_id: Uuid,

    /// Region label, `local` unless configured otherwise.
    pub region: String,

    pub created_at: DateTime<Utc>,

    pub versioning_enabled: bool,
}
