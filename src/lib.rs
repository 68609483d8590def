//! Shelf application library.
//!
//! Project modules (books) and their wiring against the shelf framework
//! crates.

pub mod modules;
