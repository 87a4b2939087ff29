//! # Tuition Tracker Core
//!
//! Library surface for a small tutoring business: students, classes,
//! teachers, enrollments and per-date class sessions, with revenue, payroll
//! and invoice projections derived on demand.
//!
//! The entire state is one JSON document owned by a [`storage::DocumentStore`]
//! and mutated synchronously through the services in [`domain`]. Every
//! committed mutation triggers a best-effort save of the backing file and a
//! "data changed" notification for observers (typically a UI re-rendering
//! derived views).

pub mod domain;
pub mod storage;
