use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Id prefix for students (`STU-000001`, ...).
pub const STUDENT_PREFIX: &str = "STU";
/// Id prefix for classes.
pub const CLASS_PREFIX: &str = "CLS";
/// Id prefix for teachers.
pub const TEACHER_PREFIX: &str = "TEA";
/// Id prefix for enrollments.
pub const ENROLLMENT_PREFIX: &str = "ENR";
/// Id prefix for sessions.
pub const SESSION_PREFIX: &str = "SES";

/// A student of the tutoring centre.
///
/// `student_id` is the display code shown on rosters and invoices; when no
/// code is supplied at creation time it defaults to the internal `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub name: String,
    /// Free text; "active" by convention for current students.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub note: String,
}

/// A class offered by the centre, with a per-session price in whole VND and a
/// denormalized snapshot of the currently assigned teacher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Charge per held session, whole VND.
    #[serde(default)]
    pub price_vnd: i64,
    /// Scheduled length of a session in hours; also the payroll floor.
    #[serde(default)]
    pub default_duration_hrs: f64,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub teacher_name: Option<String>,
    /// Hourly rate copied from the teacher at assignment time. Not cleared
    /// when the teacher is unassigned.
    #[serde(default)]
    pub teacher_rate_per_hour: f64,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub notes: String,
    /// Free text keyed by "YYYY-MM".
    #[serde(default)]
    pub month_notes: BTreeMap<String, String>,
}

/// A teacher and their live hourly rate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rate_per_hour: f64,
    #[serde(default)]
    pub subjects: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

/// A student's membership in a class. At most one row exists per
/// (student, class) pair; re-enrolling updates the existing row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    /// Personal discount in percent, applied to every billed session.
    #[serde(default)]
    pub discount_pct: f64,
    /// "YYYY-MM-DD".
    #[serde(default)]
    pub enrolled_at: String,
    #[serde(default)]
    pub notes: String,
}

/// Status of a scheduled session. Only held sessions are billable and
/// payable; anything else counts as "no session" for billing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Held,
    Cancelled,
    /// Preserved on load but ignored by billing.
    #[serde(other)]
    Unknown,
}

/// Per-student attendance mark on a session. A missing entry is billable;
/// only an explicit `Excused` exempts the student from the session charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Excused,
    Absent,
}

/// One occurrence of a class on a calendar date. At most one session exists
/// per (class, date) pair.
///
/// `teacher_name` and `teacher_rate_per_hour_snap` are snapshots frozen at
/// save time so historical payroll stays stable when the teacher's record
/// later changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub class_id: String,
    /// "YYYY-MM-DD"; always truncated to 10 characters on load.
    pub date: String,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub duration_hrs: f64,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub teacher_name: Option<String>,
    #[serde(default)]
    pub teacher_rate_per_hour_snap: Option<f64>,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub attendance: BTreeMap<String, AttendanceStatus>,
}

/// An ad hoc monthly expense tracked on the finance page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraExpense {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub amount: i64,
}

/// Document-level metadata: id sequence counters plus ad hoc aggregates.
///
/// Meta is free-form on the wire. Keys we do not model, including the
/// `"seq:STU"`, `"seq:CLS"`, ... counters, live in the flattened `extra`
/// map and persist verbatim, so a foreign document's ad hoc metadata
/// survives an import/export cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub admin_notes: String,
    /// Extra expenses keyed by "YYYY-MM".
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_expenses: BTreeMap<String, Vec<ExtraExpense>>,
    /// Everything else under `meta`, counters included, kept as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DocumentMeta {
    /// Issue the next id for an entity kind: `<prefix>-NNNNNN`, 6-digit
    /// zero-padded, monotonically increasing, never recycled.
    ///
    /// A counter that is missing or not an integer restarts at 1.
    pub fn next_id(&mut self, prefix: &str) -> String {
        let key = format!("seq:{prefix}");
        let n = self
            .extra
            .get(&key)
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0)
            + 1;
        self.extra.insert(key, serde_json::Value::from(n));
        format!("{prefix}-{n:06}")
    }

    /// Current value of an id counter, if set.
    pub fn sequence(&self, prefix: &str) -> Option<u64> {
        self.extra
            .get(&format!("seq:{prefix}"))
            .and_then(serde_json::Value::as_u64)
    }
}

/// The entire tuition document: one JSON object holding every collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub classes: Vec<ClassRecord>,
    #[serde(default)]
    pub teachers: Vec<Teacher>,
    #[serde(default)]
    pub enrollments: Vec<Enrollment>,
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub meta: DocumentMeta,
}

impl Document {
    pub fn student_by_id(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn class_by_id(&self, id: &str) -> Option<&ClassRecord> {
        self.classes.iter().find(|c| c.id == id)
    }

    pub fn teacher_by_id(&self, id: &str) -> Option<&Teacher> {
        self.teachers.iter().find(|t| t.id == id)
    }

    /// Look up the unique session for a class on a date, if scheduled.
    pub fn session_by_key(&self, class_id: &str, date: &str) -> Option<&Session> {
        self.sessions
            .iter()
            .find(|s| s.class_id == class_id && s.date == date)
    }

    /// Student ids enrolled in a class, in enrollment order. Derived from
    /// enrollment rows; the roster is never stored directly.
    pub fn roster_for_class(&self, class_id: &str) -> Vec<String> {
        self.enrollments
            .iter()
            .filter(|e| e.class_id == class_id)
            .map(|e| e.student_id.clone())
            .collect()
    }
}

/// Request to create a student. Unsupplied fields get the type defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentInput {
    pub name: String,
    /// Display code; defaults to the newly allocated internal id when blank.
    pub student_id: Option<String>,
    pub status: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub note: Option<String>,
}

/// Partial update of a student; only supplied fields change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentPatch {
    pub student_id: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub note: Option<String>,
}

/// Request to create a class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassInput {
    pub name: String,
    pub price_vnd: Option<i64>,
    pub default_duration_hrs: Option<f64>,
    pub capacity: Option<u32>,
    pub level: Option<String>,
    pub notes: Option<String>,
}

/// Partial update of a class. Teacher assignment goes through the dedicated
/// operation so the rate snapshot stays consistent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassPatch {
    pub name: Option<String>,
    pub price_vnd: Option<i64>,
    pub default_duration_hrs: Option<f64>,
    pub capacity: Option<u32>,
    pub level: Option<String>,
    pub notes: Option<String>,
}

/// Request to create a teacher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeacherInput {
    pub name: String,
    pub rate_per_hour: Option<f64>,
    pub subjects: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Partial update of a teacher; only supplied fields change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeacherPatch {
    pub name: Option<String>,
    pub rate_per_hour: Option<f64>,
    pub subjects: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Optional fields for an enrollment. On an existing row only the fields
/// explicitly supplied are updated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrollOptions {
    pub discount_pct: Option<f64>,
    pub enrolled_at: Option<String>,
    pub notes: Option<String>,
}

/// Fields saved from the session editor. The teacher's name and rate are
/// snapshotted onto the session at save time from `teacher_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionDraft {
    pub status: SessionStatus,
    pub duration_hrs: Option<f64>,
    pub teacher_id: Option<String>,
    pub note: Option<String>,
}

/// One class line on a student invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub class_id: String,
    pub class_name: String,
    pub amount: i64,
}

/// A student's tuition invoice for one month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub student_id: String,
    pub student_name: String,
    /// "YYYY-MM".
    pub month: String,
    pub total: i64,
    pub items: Vec<InvoiceItem>,
}

/// One paid session on a teacher's payroll statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollLine {
    pub date: String,
    pub class_id: String,
    pub class_name: String,
    pub hours: f64,
    pub rate_per_hour: f64,
    pub pay: i64,
}

/// A teacher's pay for one month, one line per held session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollStatement {
    pub teacher_id: String,
    pub teacher_name: String,
    pub month: String,
    pub lines: Vec<PayrollLine>,
    pub total_hours: f64,
    pub total_pay: i64,
}

/// Revenue, teacher cost and net for one class in one month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassFinanceRow {
    pub class_id: String,
    pub class_name: String,
    pub revenue: i64,
    pub cost: i64,
    pub net: i64,
}

/// The month's finance dashboard: per-class rows, grand totals and extra
/// expenses taken from document metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceSummary {
    pub month: String,
    pub rows: Vec<ClassFinanceRow>,
    pub total_revenue: i64,
    pub total_cost: i64,
    pub extra_expenses: i64,
    pub net_profit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_id_format_and_monotonicity() {
        let mut meta = DocumentMeta::default();
        assert_eq!(meta.next_id(STUDENT_PREFIX), "STU-000001");
        assert_eq!(meta.next_id(STUDENT_PREFIX), "STU-000002");
        // Independent counter per prefix
        assert_eq!(meta.next_id(CLASS_PREFIX), "CLS-000001");
        assert_eq!(meta.sequence(STUDENT_PREFIX), Some(2));
    }

    #[test]
    fn test_next_id_never_recycles() {
        let mut meta = DocumentMeta::default();
        let first = meta.next_id(SESSION_PREFIX);
        // Deleting entities does not touch the counter; the next id moves on
        let second = meta.next_id(SESSION_PREFIX);
        assert_ne!(first, second);
        assert_eq!(second, "SES-000002");
    }

    #[test]
    fn test_meta_serializes_counters_under_wire_keys() {
        let mut meta = DocumentMeta::default();
        meta.next_id(TEACHER_PREFIX);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["seq:TEA"], 1);
    }

    #[test]
    fn test_document_serializes_camel_case() {
        let doc = Document {
            classes: vec![ClassRecord {
                id: "CLS-000001".to_string(),
                name: "Math".to_string(),
                price_vnd: 500_000,
                default_duration_hrs: 1.5,
                ..Default::default()
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(&doc).unwrap();
        let cls = &json["classes"][0];
        assert_eq!(cls["priceVnd"], 500_000);
        assert_eq!(cls["defaultDurationHrs"], 1.5);
        assert!(cls.get("price_vnd").is_none());
    }

    #[test]
    fn test_session_status_round_trip() {
        let s: SessionStatus = serde_json::from_str("\"held\"").unwrap();
        assert_eq!(s, SessionStatus::Held);
        let s: SessionStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(s, SessionStatus::Cancelled);
        // Anything else is preserved as an unknown status, not an error
        let s: SessionStatus = serde_json::from_str("\"makeup\"").unwrap();
        assert_eq!(s, SessionStatus::Unknown);
    }

    #[test]
    fn test_roster_is_derived_from_enrollments() {
        let doc = Document {
            enrollments: vec![
                Enrollment {
                    id: "ENR-000001".to_string(),
                    student_id: "STU-000001".to_string(),
                    class_id: "CLS-000001".to_string(),
                    ..Default::default()
                },
                Enrollment {
                    id: "ENR-000002".to_string(),
                    student_id: "STU-000002".to_string(),
                    class_id: "CLS-000002".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(doc.roster_for_class("CLS-000001"), vec!["STU-000001"]);
        assert!(doc.roster_for_class("CLS-000999").is_empty());
    }
}
