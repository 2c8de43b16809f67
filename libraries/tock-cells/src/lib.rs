//! Tock Cell types.

#![no_std]

pub mod map_cell;
pub mod optional_cell;
