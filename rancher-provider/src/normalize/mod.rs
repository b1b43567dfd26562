//! Mappers between nested wire structures and flat attribute blocks

pub mod compose;
pub mod members;
pub mod policy;
