use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::storage::{ChangeSource, DocumentStore};
use shared::{AttendanceStatus, Document, Session, SessionDraft, SessionStatus, SESSION_PREFIX};

/// Service for per-date session upkeep: the calendar toggles, the session
/// editor upsert, and attendance marks.
///
/// Sessions are keyed by (class, date); at most one row exists per pair. The
/// teacher's name and hourly rate are snapshotted onto the session at save
/// time so later teacher edits do not rewrite history.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<DocumentStore>,
}

impl SessionService {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// Create or replace the session for a class and date from editor
    /// fields. The assigned teacher's name and rate are frozen onto the row;
    /// an existing row keeps its attendance.
    pub fn upsert_session(&self, class_id: &str, date: &str, draft: SessionDraft) -> Session {
        let date: String = date.chars().take(10).collect();
        self.store.mutate(ChangeSource::Sessions, |doc| {
            let class = doc.class_by_id(class_id).cloned();
            let teacher = draft
                .teacher_id
                .as_deref()
                .and_then(|tid| doc.teacher_by_id(tid))
                .cloned();
            let teacher_name = teacher
                .as_ref()
                .map(|t| t.name.clone())
                .or_else(|| draft.teacher_id.clone());
            let rate_snap = teacher.as_ref().map(|t| t.rate_per_hour);
            let duration = draft.duration_hrs.unwrap_or_else(|| {
                class.as_ref().map(|c| c.default_duration_hrs).unwrap_or(1.0)
            });

            if let Some(session) = doc
                .sessions
                .iter_mut()
                .find(|s| s.class_id == class_id && s.date == date)
            {
                session.status = draft.status;
                session.duration_hrs = duration;
                session.teacher_id = draft.teacher_id.clone();
                session.teacher_name = teacher_name;
                session.teacher_rate_per_hour_snap = rate_snap;
                session.note = draft.note.clone().unwrap_or_default();
                return session.clone();
            }

            let session = Session {
                id: doc.meta.next_id(SESSION_PREFIX),
                class_id: class_id.to_string(),
                date: date.clone(),
                status: draft.status,
                duration_hrs: duration,
                teacher_id: draft.teacher_id.clone(),
                teacher_name,
                teacher_rate_per_hour_snap: rate_snap,
                note: draft.note.clone().unwrap_or_default(),
                attendance: BTreeMap::new(),
            };
            doc.sessions.push(session.clone());
            session
        })
    }

    /// Single-click toggle: no session or a non-held one becomes held
    /// (seeded from class defaults when created); a held one is removed.
    /// Returns the resulting session, or `None` when the row was removed.
    pub fn toggle_held(&self, class_id: &str, date: &str) -> Option<Session> {
        let date: String = date.chars().take(10).collect();
        self.store.mutate(ChangeSource::Sessions, |doc| {
            let position = doc
                .sessions
                .iter()
                .position(|s| s.class_id == class_id && s.date == date);
            match position {
                Some(i) if doc.sessions[i].status == SessionStatus::Held => {
                    doc.sessions.remove(i);
                    None
                }
                Some(i) => {
                    doc.sessions[i].status = SessionStatus::Held;
                    Some(doc.sessions[i].clone())
                }
                None => Some(Self::seed_session(doc, class_id, &date, SessionStatus::Held)),
            }
        })
    }

    /// Right-click toggle: no session becomes a cancelled one; a cancelled
    /// one is removed; anything else is marked cancelled.
    pub fn toggle_cancelled(&self, class_id: &str, date: &str) -> Option<Session> {
        let date: String = date.chars().take(10).collect();
        self.store.mutate(ChangeSource::Sessions, |doc| {
            let position = doc
                .sessions
                .iter()
                .position(|s| s.class_id == class_id && s.date == date);
            match position {
                Some(i) if doc.sessions[i].status == SessionStatus::Cancelled => {
                    doc.sessions.remove(i);
                    None
                }
                Some(i) => {
                    doc.sessions[i].status = SessionStatus::Cancelled;
                    Some(doc.sessions[i].clone())
                }
                None => Some(Self::seed_session(
                    doc,
                    class_id,
                    &date,
                    SessionStatus::Cancelled,
                )),
            }
        })
    }

    /// Set or clear one student's attendance mark on a session. Clearing
    /// returns the student to the default (billable). `None` when the
    /// session does not exist.
    pub fn set_attendance(
        &self,
        class_id: &str,
        date: &str,
        student_id: &str,
        mark: Option<AttendanceStatus>,
    ) -> Option<Session> {
        let updated = self.store.try_mutate(ChangeSource::Sessions, |doc| {
            let session = doc
                .sessions
                .iter_mut()
                .find(|s| s.class_id == class_id && s.date == date)?;
            match mark {
                Some(status) => {
                    session.attendance.insert(student_id.to_string(), status);
                }
                None => {
                    session.attendance.remove(student_id);
                }
            }
            Some(session.clone())
        });
        if updated.is_none() {
            warn!("No session for class {} on {}", class_id, date);
        }
        updated
    }

    /// Remove the session for a class and date entirely.
    pub fn clear_session(&self, class_id: &str, date: &str) -> bool {
        self.store
            .try_mutate(ChangeSource::Sessions, |doc| {
                let before = doc.sessions.len();
                doc.sessions
                    .retain(|s| !(s.class_id == class_id && s.date == date));
                (doc.sessions.len() != before).then_some(())
            })
            .is_some()
    }

    pub fn get_session(&self, class_id: &str, date: &str) -> Option<Session> {
        self.store
            .read(|doc| doc.session_by_key(class_id, date).cloned())
    }

    /// All of a class's sessions in a "YYYY-MM" month, any status, sorted by
    /// date.
    pub fn sessions_for_month(&self, class_id: &str, ym: &str) -> Vec<Session> {
        self.store.read(|doc| {
            let mut sessions: Vec<Session> = doc
                .sessions
                .iter()
                .filter(|s| s.class_id == class_id && s.date.get(..7) == Some(ym))
                .cloned()
                .collect();
            sessions.sort_by(|a, b| a.date.cmp(&b.date));
            sessions
        })
    }

    fn seed_session(
        doc: &mut Document,
        class_id: &str,
        date: &str,
        status: SessionStatus,
    ) -> Session {
        let class = doc.class_by_id(class_id).cloned();
        info!(
            "Creating {:?} session for class {} on {}",
            status, class_id, date
        );
        let session = Session {
            id: doc.meta.next_id(SESSION_PREFIX),
            class_id: class_id.to_string(),
            date: date.to_string(),
            status,
            duration_hrs: class.as_ref().map(|c| c.default_duration_hrs).unwrap_or(1.0),
            teacher_id: class.as_ref().and_then(|c| c.teacher_id.clone()),
            teacher_name: class.as_ref().and_then(|c| c.teacher_name.clone()),
            teacher_rate_per_hour_snap: class.as_ref().map(|c| c.teacher_rate_per_hour),
            note: String::new(),
            attendance: BTreeMap::new(),
        };
        doc.sessions.push(session.clone());
        session
    }
}
