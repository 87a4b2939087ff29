use log::{info, warn};
use std::sync::Arc;

use crate::storage::{ChangeSource, DocumentStore};
use shared::{ClassInput, ClassPatch, ClassRecord, CLASS_PREFIX};

/// Service for managing classes: CRUD, teacher assignment with the rate
/// snapshot, and per-month notes.
#[derive(Clone)]
pub struct ClassService {
    store: Arc<DocumentStore>,
}

impl ClassService {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    pub fn add_class(&self, input: ClassInput) -> ClassRecord {
        info!("Creating class: name={}", input.name);
        self.store.mutate(ChangeSource::Classes, |doc| {
            let class = ClassRecord {
                id: doc.meta.next_id(CLASS_PREFIX),
                name: input.name,
                price_vnd: input.price_vnd.unwrap_or(0),
                default_duration_hrs: input.default_duration_hrs.unwrap_or(1.0),
                teacher_id: None,
                teacher_name: None,
                teacher_rate_per_hour: 0.0,
                capacity: input.capacity,
                level: input.level.unwrap_or_default(),
                notes: input.notes.unwrap_or_default(),
                month_notes: Default::default(),
            };
            doc.classes.push(class.clone());
            class
        })
    }

    /// Shallow-merge a patch onto a class. `None` means not found.
    pub fn update_class(&self, id: &str, patch: ClassPatch) -> Option<ClassRecord> {
        let updated = self.store.try_mutate(ChangeSource::Classes, |doc| {
            let class = doc.classes.iter_mut().find(|c| c.id == id)?;
            if let Some(name) = patch.name {
                class.name = name;
            }
            if let Some(price) = patch.price_vnd {
                class.price_vnd = price;
            }
            if let Some(hrs) = patch.default_duration_hrs {
                class.default_duration_hrs = hrs;
            }
            if let Some(capacity) = patch.capacity {
                class.capacity = Some(capacity);
            }
            if let Some(level) = patch.level {
                class.level = level;
            }
            if let Some(notes) = patch.notes {
                class.notes = notes;
            }
            Some(class.clone())
        });
        if updated.is_none() {
            warn!("Class not found: {}", id);
        }
        updated
    }

    /// Delete a class and everything referencing it: enrollments and
    /// sessions. Returns whether the class existed.
    pub fn delete_class(&self, id: &str) -> bool {
        let removed = self.store.try_mutate(ChangeSource::Classes, |doc| {
            let before = doc.classes.len();
            doc.classes.retain(|c| c.id != id);
            if doc.classes.len() == before {
                return None;
            }
            doc.enrollments.retain(|e| e.class_id != id);
            doc.sessions.retain(|s| s.class_id != id);
            Some(())
        });
        if removed.is_some() {
            info!("Deleted class {} with its enrollments and sessions", id);
            true
        } else {
            warn!("Class not found: {}", id);
            false
        }
    }

    /// Assign or unassign the class teacher. Assigning copies the teacher's
    /// name and hourly rate onto the class; unassigning nulls the name and id
    /// but keeps the last copied rate as the class default. A missing class
    /// is a no-op; a missing teacher id unassigns.
    pub fn set_class_teacher(&self, class_id: &str, teacher_id: Option<&str>) -> Option<ClassRecord> {
        self.store.try_mutate(ChangeSource::Classes, |doc| {
            let teacher = teacher_id.and_then(|tid| doc.teacher_by_id(tid)).cloned();
            let class = doc.classes.iter_mut().find(|c| c.id == class_id)?;
            match teacher {
                Some(t) => {
                    class.teacher_id = Some(t.id.clone());
                    class.teacher_name = Some(t.name.clone());
                    class.teacher_rate_per_hour = t.rate_per_hour;
                }
                None => {
                    class.teacher_id = None;
                    class.teacher_name = None;
                }
            }
            Some(class.clone())
        })
    }

    /// Set the free-text note for a class and month ("YYYY-MM").
    pub fn set_month_note(&self, class_id: &str, ym: &str, note: &str) -> Option<ClassRecord> {
        self.store.try_mutate(ChangeSource::Classes, |doc| {
            let class = doc.classes.iter_mut().find(|c| c.id == class_id)?;
            class.month_notes.insert(ym.to_string(), note.to_string());
            Some(class.clone())
        })
    }

    pub fn get_class(&self, id: &str) -> Option<ClassRecord> {
        self.store.read(|doc| doc.class_by_id(id).cloned())
    }

    pub fn list_classes(&self) -> Vec<ClassRecord> {
        self.store.read(|doc| doc.classes.clone())
    }
}
