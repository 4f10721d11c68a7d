// src/search/providers/mod.rs
pub mod olcc;
