use log::{info, warn};
use std::sync::Arc;

use crate::storage::{ChangeSource, DocumentStore};
use shared::{Teacher, TeacherInput, TeacherPatch, TEACHER_PREFIX};

/// Service for managing teachers.
#[derive(Clone)]
pub struct TeacherService {
    store: Arc<DocumentStore>,
}

impl TeacherService {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    pub fn add_teacher(&self, input: TeacherInput) -> Teacher {
        info!("Creating teacher: name={}", input.name);
        self.store.mutate(ChangeSource::Teachers, |doc| {
            let teacher = Teacher {
                id: doc.meta.next_id(TEACHER_PREFIX),
                name: input.name,
                rate_per_hour: input.rate_per_hour.unwrap_or(0.0),
                subjects: input.subjects.unwrap_or_default(),
                phone: input.phone.unwrap_or_default(),
                email: input.email.unwrap_or_default(),
            };
            doc.teachers.push(teacher.clone());
            teacher
        })
    }

    /// Shallow-merge a patch onto a teacher. `None` means not found.
    ///
    /// Changing the rate here does not rewrite rate snapshots already frozen
    /// onto classes or past sessions.
    pub fn update_teacher(&self, id: &str, patch: TeacherPatch) -> Option<Teacher> {
        let updated = self.store.try_mutate(ChangeSource::Teachers, |doc| {
            let teacher = doc.teachers.iter_mut().find(|t| t.id == id)?;
            if let Some(name) = patch.name {
                teacher.name = name;
            }
            if let Some(rate) = patch.rate_per_hour {
                teacher.rate_per_hour = rate;
            }
            if let Some(subjects) = patch.subjects {
                teacher.subjects = subjects;
            }
            if let Some(phone) = patch.phone {
                teacher.phone = phone;
            }
            if let Some(email) = patch.email {
                teacher.email = email;
            }
            Some(teacher.clone())
        });
        if updated.is_none() {
            warn!("Teacher not found: {}", id);
        }
        updated
    }

    /// Delete a teacher. Classes and sessions referencing them are kept;
    /// their `teacher_id`/`teacher_name` are nulled instead.
    pub fn delete_teacher(&self, id: &str) -> bool {
        let removed = self.store.try_mutate(ChangeSource::Teachers, |doc| {
            let before = doc.teachers.len();
            doc.teachers.retain(|t| t.id != id);
            if doc.teachers.len() == before {
                return None;
            }
            for class in doc.classes.iter_mut() {
                if class.teacher_id.as_deref() == Some(id) {
                    class.teacher_id = None;
                    class.teacher_name = None;
                }
            }
            for session in doc.sessions.iter_mut() {
                if session.teacher_id.as_deref() == Some(id) {
                    session.teacher_id = None;
                    session.teacher_name = None;
                }
            }
            Some(())
        });
        if removed.is_some() {
            info!("Deleted teacher {}, references nulled", id);
            true
        } else {
            warn!("Teacher not found: {}", id);
            false
        }
    }

    pub fn get_teacher(&self, id: &str) -> Option<Teacher> {
        self.store.read(|doc| doc.teacher_by_id(id).cloned())
    }

    pub fn list_teachers(&self) -> Vec<Teacher> {
        self.store.read(|doc| doc.teachers.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::class_service::ClassService;
    use crate::domain::session_service::SessionService;
    use shared::ClassInput;

    fn setup_test() -> (Arc<DocumentStore>, TeacherService) {
        let store = Arc::new(DocumentStore::in_memory());
        let service = TeacherService::new(store.clone());
        (store, service)
    }

    #[test]
    fn test_add_and_update_teacher() {
        let (_store, service) = setup_test();
        let teacher = service.add_teacher(TeacherInput {
            name: "Mr. Nam".to_string(),
            rate_per_hour: Some(200_000.0),
            ..Default::default()
        });
        assert_eq!(teacher.id, "TEA-000001");

        let updated = service
            .update_teacher(
                &teacher.id,
                TeacherPatch {
                    rate_per_hour: Some(250_000.0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.rate_per_hour, 250_000.0);
        assert_eq!(updated.name, "Mr. Nam");
    }

    #[test]
    fn test_delete_teacher_nulls_references_without_deleting_rows() {
        let (store, service) = setup_test();
        let classes = ClassService::new(store.clone());
        let sessions = SessionService::new(store.clone());

        let teacher = service.add_teacher(TeacherInput {
            name: "Mr. Nam".to_string(),
            rate_per_hour: Some(200_000.0),
            ..Default::default()
        });
        let class = classes.add_class(ClassInput {
            name: "Math 8".to_string(),
            ..Default::default()
        });
        classes.set_class_teacher(&class.id, Some(&teacher.id));
        sessions.toggle_held(&class.id, "2024-05-07");

        assert!(service.delete_teacher(&teacher.id));
        store.read(|doc| {
            // Rows survive, references are nulled
            assert_eq!(doc.classes.len(), 1);
            assert!(doc.classes[0].teacher_id.is_none());
            assert!(doc.classes[0].teacher_name.is_none());
            assert_eq!(doc.sessions.len(), 1);
            assert!(doc.sessions[0].teacher_id.is_none());
            assert!(doc.sessions[0].teacher_name.is_none());
            // The frozen rate snapshot on the session is untouched
            assert_eq!(doc.sessions[0].teacher_rate_per_hour_snap, Some(200_000.0));
        });
    }

    #[test]
    fn test_delete_missing_teacher_returns_false() {
        let (_store, service) = setup_test();
        assert!(!service.delete_teacher("TEA-999999"));
    }
}
