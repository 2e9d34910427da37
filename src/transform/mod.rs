//! Row derivation from parsed source records
//!
//! - dimensions: time and user rows from playback events
//! - facts: songplay rows, with catalog ids resolved by natural key

pub mod dimensions;
pub mod facts;

pub use dimensions::{
    build_dimensions, playback_events, start_time_key, Dimensions, TimeRow, UserRow,
};
pub use facts::{resolve_facts, CatalogIndex, SongMatch, SongResolver, SongplayRow};
