use chrono::Utc;
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::storage::{ChangeSource, DocumentStore};
use shared::{Document, EnrollOptions, Enrollment, ENROLLMENT_PREFIX};

/// The enrollment reconciler. Keeps at most one enrollment row per
/// (student, class) pair: re-enrolling updates the existing row, and the
/// desired-state setter applies a full membership reconciliation.
#[derive(Clone)]
pub struct EnrollmentService {
    store: Arc<DocumentStore>,
}

impl EnrollmentService {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// Enroll a student in a class. If a row for the pair already exists,
    /// only the explicitly supplied discount and enrollment date change and
    /// the existing row is returned. Otherwise a new row is created with a
    /// zero discount and today's date.
    pub fn enroll(&self, student_id: &str, class_id: &str, opts: EnrollOptions) -> Enrollment {
        self.store.mutate(ChangeSource::Enrollments, |doc| {
            Self::enroll_in(doc, student_id, class_id, &opts)
        })
    }

    /// Reconcile a student's memberships against a desired map of class id to
    /// discount percent. Enrollments outside the map are removed, the rest
    /// are created or updated. The outcome does not depend on prior state.
    pub fn set_student_classes(&self, student_id: &str, desired: &BTreeMap<String, f64>) {
        info!(
            "Reconciling classes for student {}: {} target classes",
            student_id,
            desired.len()
        );
        self.store.mutate(ChangeSource::Enrollments, |doc| {
            doc.enrollments
                .retain(|e| e.student_id != student_id || desired.contains_key(&e.class_id));
            for (class_id, discount) in desired {
                Self::enroll_in(
                    doc,
                    student_id,
                    class_id,
                    &EnrollOptions {
                        discount_pct: Some(*discount),
                        ..Default::default()
                    },
                );
            }
        });
    }

    pub fn enrollments_for_student(&self, student_id: &str) -> Vec<Enrollment> {
        self.store.read(|doc| {
            doc.enrollments
                .iter()
                .filter(|e| e.student_id == student_id)
                .cloned()
                .collect()
        })
    }

    /// Student ids enrolled in a class, derived from enrollment rows.
    pub fn roster_for_class(&self, class_id: &str) -> Vec<String> {
        self.store.read(|doc| doc.roster_for_class(class_id))
    }

    fn enroll_in(
        doc: &mut Document,
        student_id: &str,
        class_id: &str,
        opts: &EnrollOptions,
    ) -> Enrollment {
        if let Some(row) = doc
            .enrollments
            .iter_mut()
            .find(|e| e.student_id == student_id && e.class_id == class_id)
        {
            if let Some(discount) = opts.discount_pct {
                row.discount_pct = discount;
            }
            if let Some(at) = &opts.enrolled_at {
                row.enrolled_at = at.clone();
            }
            return row.clone();
        }

        let row = Enrollment {
            id: doc.meta.next_id(ENROLLMENT_PREFIX),
            student_id: student_id.to_string(),
            class_id: class_id.to_string(),
            discount_pct: opts.discount_pct.unwrap_or(0.0),
            enrolled_at: opts
                .enrolled_at
                .clone()
                .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string()),
            notes: opts.notes.clone().unwrap_or_default(),
        };
        doc.enrollments.push(row.clone());
        row
    }
}
