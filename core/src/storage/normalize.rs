//! Normalizer for externally supplied documents.
//!
//! Any JSON value is coerced into the canonical [`Document`] shape: missing
//! or mistyped collections become empty, class and session records get their
//! numeric defaults backfilled, session dates are truncated to `YYYY-MM-DD`,
//! and the legacy `present` array on sessions is folded into the attendance
//! map so the rest of the system only ever sees one representation.
//!
//! Normalizing an already-canonical document is a no-op.

use serde_json::Value;
use shared::{
    AttendanceStatus, ClassRecord, Document, DocumentMeta, Enrollment, ExtraExpense, Session,
    SessionStatus, Student, Teacher,
};
use std::collections::BTreeMap;

/// Coerce an arbitrary JSON value into a canonical document. Never fails;
/// unexpected field types fall back to defaults instead of being rejected.
pub fn normalize(raw: &Value) -> Document {
    Document {
        students: objects(raw.get("students")).map(student_from).collect(),
        classes: objects(raw.get("classes")).map(class_from).collect(),
        teachers: objects(raw.get("teachers")).map(teacher_from).collect(),
        enrollments: objects(raw.get("enrollments")).map(enrollment_from).collect(),
        sessions: objects(raw.get("sessions")).map(session_from).collect(),
        meta: meta_from(raw.get("meta")),
    }
}

/// Iterate the object entries of a field that should be a JSON array.
/// Non-arrays yield nothing; non-object elements are dropped.
fn objects(value: Option<&Value>) -> impl Iterator<Item = &serde_json::Map<String, Value>> {
    value
        .and_then(Value::as_array)
        .map(|a| a.as_slice())
        .unwrap_or(&[])
        .iter()
        .filter_map(Value::as_object)
}

fn string_or(obj: &serde_json::Map<String, Value>, key: &str, default: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn opt_string(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn f64_or(obj: &serde_json::Map<String, Value>, key: &str, default: f64) -> f64 {
    obj.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn i64_or(obj: &serde_json::Map<String, Value>, key: &str, default: i64) -> i64 {
    match obj.get(key) {
        Some(v) => v
            .as_i64()
            .or_else(|| v.as_f64().map(|f| f.round() as i64))
            .unwrap_or(default),
        None => default,
    }
}

fn student_from(obj: &serde_json::Map<String, Value>) -> Student {
    Student {
        id: string_or(obj, "id", ""),
        student_id: string_or(obj, "studentId", ""),
        name: string_or(obj, "name", ""),
        status: string_or(obj, "status", "active"),
        phone: string_or(obj, "phone", ""),
        email: string_or(obj, "email", ""),
        note: string_or(obj, "note", ""),
    }
}

fn class_from(obj: &serde_json::Map<String, Value>) -> ClassRecord {
    let month_notes = obj
        .get("monthNotes")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    ClassRecord {
        id: string_or(obj, "id", ""),
        name: string_or(obj, "name", ""),
        price_vnd: i64_or(obj, "priceVnd", 0),
        default_duration_hrs: f64_or(obj, "defaultDurationHrs", 1.0),
        teacher_id: opt_string(obj, "teacherId"),
        teacher_name: opt_string(obj, "teacherName"),
        teacher_rate_per_hour: f64_or(obj, "teacherRatePerHour", 0.0),
        capacity: obj
            .get("capacity")
            .and_then(Value::as_u64)
            .map(|n| n as u32),
        level: string_or(obj, "level", ""),
        notes: string_or(obj, "notes", ""),
        month_notes,
    }
}

fn teacher_from(obj: &serde_json::Map<String, Value>) -> Teacher {
    Teacher {
        id: string_or(obj, "id", ""),
        name: string_or(obj, "name", ""),
        rate_per_hour: f64_or(obj, "ratePerHour", 0.0),
        subjects: string_or(obj, "subjects", ""),
        phone: string_or(obj, "phone", ""),
        email: string_or(obj, "email", ""),
    }
}

fn enrollment_from(obj: &serde_json::Map<String, Value>) -> Enrollment {
    Enrollment {
        id: string_or(obj, "id", ""),
        student_id: string_or(obj, "studentId", ""),
        class_id: string_or(obj, "classId", ""),
        discount_pct: f64_or(obj, "discountPct", 0.0),
        enrolled_at: string_or(obj, "enrolledAt", ""),
        notes: string_or(obj, "notes", ""),
    }
}

fn session_from(obj: &serde_json::Map<String, Value>) -> Session {
    let date: String = string_or(obj, "date", "").chars().take(10).collect();

    let status = match obj.get("status").and_then(Value::as_str) {
        Some("held") => SessionStatus::Held,
        Some("cancelled") => SessionStatus::Cancelled,
        _ => SessionStatus::Unknown,
    };

    // Explicit attendance entries win; the legacy `present` array only adds
    // marks for students without one.
    let mut attendance: BTreeMap<String, AttendanceStatus> = obj
        .get("attendance")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(sid, v)| v.as_str().map(|s| (sid.clone(), attendance_mark(s))))
                .collect()
        })
        .unwrap_or_default();

    if let Some(present) = obj.get("present").and_then(Value::as_array) {
        for sid in present.iter().filter_map(Value::as_str) {
            attendance
                .entry(sid.to_string())
                .or_insert(AttendanceStatus::Present);
        }
    }

    Session {
        id: string_or(obj, "id", ""),
        class_id: string_or(obj, "classId", ""),
        date,
        status,
        duration_hrs: f64_or(obj, "durationHrs", 1.0),
        teacher_id: opt_string(obj, "teacherId"),
        teacher_name: opt_string(obj, "teacherName"),
        teacher_rate_per_hour_snap: obj.get("teacherRatePerHourSnap").and_then(Value::as_f64),
        note: string_or(obj, "note", ""),
        attendance,
    }
}

fn attendance_mark(s: &str) -> AttendanceStatus {
    match s {
        "excused" => AttendanceStatus::Excused,
        "absent" => AttendanceStatus::Absent,
        // Anything unrecognized is billable, same as present
        _ => AttendanceStatus::Present,
    }
}

fn meta_from(value: Option<&Value>) -> DocumentMeta {
    let Some(obj) = value.and_then(Value::as_object) else {
        return DocumentMeta::default();
    };

    let extra_expenses = obj
        .get("extraExpenses")
        .and_then(Value::as_object)
        .map(|months| {
            months
                .iter()
                .filter_map(|(ym, list)| {
                    list.as_array().map(|items| {
                        let expenses = items
                            .iter()
                            .filter_map(Value::as_object)
                            .map(|e| ExtraExpense {
                                name: string_or(e, "name", ""),
                                amount: i64_or(e, "amount", 0),
                            })
                            .collect();
                        (ym.clone(), expenses)
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    // Meta is free-form: everything we do not model, the id counters
    // included, is kept verbatim so it survives an import/export cycle.
    let extra = obj
        .iter()
        .filter(|(k, _)| k.as_str() != "adminNotes" && k.as_str() != "extraExpenses")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    DocumentMeta {
        admin_notes: obj
            .get("adminNotes")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        extra_expenses,
        extra,
    }
}
