//! Data models shared by the gateway and the client core.
//!
//! `bucket` and `object` are the gateway's SQLite rows. `listing` holds the
//! JSON shapes exchanged over the `/api/*` surface, which the client
//! deserializes back into the same types.

pub mod bucket;
pub mod listing;
pub mod object;
