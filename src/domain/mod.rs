//! Domain logic

pub mod discount;
