//! # Domain
//!
//! Business logic of the tuition tracker, independent of any UI.
//!
//! Each service holds an `Arc<DocumentStore>` and mutates the document
//! through it, so every committed change saves the backing file and fires
//! the data-changed notification. Lookups that miss return `None`, never an
//! error.
//!
//! - **student/class/teacher services**: entity CRUD with the cascade rules
//!   (student deletion drops its enrollments; class deletion drops its
//!   enrollments and sessions; teacher deletion only nulls references).
//! - **enrollment_service**: the reconciler keeping (student, class) rows
//!   unique and applying full desired-state membership updates.
//! - **session_service**: per-date session upkeep, calendar toggles and
//!   attendance marks, with teacher rate snapshots frozen at save time.
//! - **billing**: pure projections over the document (revenue, invoices,
//!   teacher cost, payroll and the monthly finance summary). Always
//!   recomputed, never cached.
//! - **export_service**: CSV and print renderings of invoices and payroll.
//! - **meta_service**: admin notes and ad hoc monthly expenses.

pub mod billing;
pub mod class_service;
pub mod enrollment_service;
pub mod export_service;
pub mod meta_service;
pub mod session_service;
pub mod student_service;
pub mod teacher_service;

pub use billing::*;
pub use class_service::*;
pub use enrollment_service::*;
pub use export_service::*;
pub use meta_service::*;
pub use session_service::*;
pub use student_service::*;
pub use teacher_service::*;
