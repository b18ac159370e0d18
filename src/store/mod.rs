//! Persistence seams: the punch log, the employee directory and the
//! in-process change feed that announces writes.

pub mod change_feed;
pub mod directory;
pub mod error;
pub mod punches;

#[cfg(test)]
pub mod memory;
