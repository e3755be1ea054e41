//! Input readers producing the raw frames a [`crate::TrackTable`] wraps.

pub mod tsv;

pub use tsv::read_track_tsv;
