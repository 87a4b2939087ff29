use log::{info, warn};
use std::sync::Arc;

use crate::storage::{ChangeSource, DocumentStore};
use shared::{Student, StudentInput, StudentPatch, STUDENT_PREFIX};

/// Service for managing students.
#[derive(Clone)]
pub struct StudentService {
    store: Arc<DocumentStore>,
}

impl StudentService {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// Create a new student. When no display code is supplied the code
    /// defaults to the newly allocated internal id.
    pub fn add_student(&self, input: StudentInput) -> Student {
        info!("Creating student: name={}", input.name);
        self.store.mutate(ChangeSource::Students, |doc| {
            let id = doc.meta.next_id(STUDENT_PREFIX);
            let display_code = input
                .student_id
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| id.clone());
            let student = Student {
                id,
                student_id: display_code,
                name: input.name,
                status: input.status.unwrap_or_else(|| "active".to_string()),
                phone: input.phone.unwrap_or_default(),
                email: input.email.unwrap_or_default(),
                note: input.note.unwrap_or_default(),
            };
            doc.students.push(student.clone());
            student
        })
    }

    /// Shallow-merge a patch onto a student. `None` means not found.
    pub fn update_student(&self, id: &str, patch: StudentPatch) -> Option<Student> {
        let updated = self.store.try_mutate(ChangeSource::Students, |doc| {
            let student = doc.students.iter_mut().find(|s| s.id == id)?;
            if let Some(code) = patch.student_id {
                student.student_id = code;
            }
            if let Some(name) = patch.name {
                student.name = name;
            }
            if let Some(status) = patch.status {
                student.status = status;
            }
            if let Some(phone) = patch.phone {
                student.phone = phone;
            }
            if let Some(email) = patch.email {
                student.email = email;
            }
            if let Some(note) = patch.note {
                student.note = note;
            }
            Some(student.clone())
        });
        if updated.is_none() {
            warn!("Student not found: {}", id);
        }
        updated
    }

    /// Delete a student and every enrollment referencing it. Returns whether
    /// the student existed.
    pub fn delete_student(&self, id: &str) -> bool {
        let removed = self.store.try_mutate(ChangeSource::Students, |doc| {
            let before = doc.students.len();
            doc.students.retain(|s| s.id != id);
            if doc.students.len() == before {
                return None;
            }
            doc.enrollments.retain(|e| e.student_id != id);
            Some(())
        });
        if removed.is_some() {
            info!("Deleted student {} and their enrollments", id);
            true
        } else {
            warn!("Student not found: {}", id);
            false
        }
    }

    pub fn get_student(&self, id: &str) -> Option<Student> {
        self.store.read(|doc| doc.student_by_id(id).cloned())
    }

    pub fn list_students(&self) -> Vec<Student> {
        self.store.read(|doc| doc.students.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enrollment_service::EnrollmentService;
    use shared::EnrollOptions;

    fn setup_test() -> (Arc<DocumentStore>, StudentService) {
        let store = Arc::new(DocumentStore::in_memory());
        let service = StudentService::new(store.clone());
        (store, service)
    }

    #[test]
    fn test_add_student_assigns_id_and_defaults() {
        let (_store, service) = setup_test();
        let student = service.add_student(StudentInput {
            name: "Linh Tran".to_string(),
            ..Default::default()
        });
        assert_eq!(student.id, "STU-000001");
        // No display code supplied: defaults to the internal id
        assert_eq!(student.student_id, "STU-000001");
        assert_eq!(student.status, "active");
    }

    #[test]
    fn test_add_student_keeps_supplied_display_code() {
        let (_store, service) = setup_test();
        let student = service.add_student(StudentInput {
            name: "Linh Tran".to_string(),
            student_id: Some("A-17".to_string()),
            ..Default::default()
        });
        assert_eq!(student.student_id, "A-17");
        // Blank codes count as unsupplied
        let other = service.add_student(StudentInput {
            name: "Minh".to_string(),
            student_id: Some("   ".to_string()),
            ..Default::default()
        });
        assert_eq!(other.student_id, other.id);
    }

    #[test]
    fn test_update_student_merges_only_supplied_fields() {
        let (_store, service) = setup_test();
        let student = service.add_student(StudentInput {
            name: "Linh Tran".to_string(),
            phone: Some("0901".to_string()),
            ..Default::default()
        });

        let updated = service
            .update_student(
                &student.id,
                StudentPatch {
                    name: Some("Linh T.".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Linh T.");
        assert_eq!(updated.phone, "0901");
    }

    #[test]
    fn test_update_missing_student_returns_none() {
        let (_store, service) = setup_test();
        assert!(service
            .update_student("STU-999999", StudentPatch::default())
            .is_none());
    }

    #[test]
    fn test_delete_student_cascades_to_enrollments() {
        let (store, service) = setup_test();
        let enrollments = EnrollmentService::new(store.clone());

        let student = service.add_student(StudentInput {
            name: "Linh".to_string(),
            ..Default::default()
        });
        let other = service.add_student(StudentInput {
            name: "Minh".to_string(),
            ..Default::default()
        });
        enrollments.enroll(&student.id, "CLS-000001", EnrollOptions::default());
        enrollments.enroll(&other.id, "CLS-000001", EnrollOptions::default());

        assert!(service.delete_student(&student.id));
        store.read(|doc| {
            assert!(doc.student_by_id(&student.id).is_none());
            assert_eq!(doc.enrollments.len(), 1);
            assert_eq!(doc.enrollments[0].student_id, other.id);
        });
    }
}
