// lib.rs
pub mod alignment_record;
pub mod commands;
pub mod contact;
pub mod group;
pub mod paf;
pub mod partition;
