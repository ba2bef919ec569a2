//! Handles serialising and saving frames to disk in the _parquet_ file format.

pub mod frame;

pub use frame::save_frame;
