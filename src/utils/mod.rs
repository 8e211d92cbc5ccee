// src/utils/mod.rs

pub mod json;
pub mod jwt;
pub mod notify;
