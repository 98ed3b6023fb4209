//! System call conventions shared by guarded wrappers and their callers

pub mod interface;
pub mod types;
