// src/handlers/mod.rs

pub mod student;
pub mod teacher;
