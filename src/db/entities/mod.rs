//! Database entities

pub mod chapter;
pub mod manga;
pub mod page;
