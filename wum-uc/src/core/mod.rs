//! Pure, deterministic startup logic (no I/O).

pub mod layers;
pub mod level;
