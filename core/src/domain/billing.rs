//! The billing engine: revenue, invoices, teacher cost, payroll and the
//! monthly finance summary.
//!
//! Every function here is a pure, read-only projection over the current
//! document for a `(class or student, "YYYY-MM")` pair; nothing is cached or
//! persisted. A session is billable and payable only when its status is
//! held. A student is billed for a held session unless their attendance is
//! explicitly marked excused; a missing mark bills by default.
//!
//! Two revenue variants exist on purpose. `revenue_for` is the coarse
//! estimate (`price × held sessions × roster size`), kept for quick
//! summaries; `revenue_for_detailed` applies discounts and attendance and is
//! authoritative for invoicing. Payroll never pays less than the class's
//! default session length, even when the session itself was shorter.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::storage::DocumentStore;
use shared::{
    AttendanceStatus, ClassFinanceRow, ClassRecord, Document, FinanceSummary, Invoice,
    InvoiceItem, PayrollLine, PayrollStatement, Session, SessionStatus,
};

/// Read-only billing projections over the document store.
#[derive(Clone)]
pub struct BillingService {
    store: Arc<DocumentStore>,
}

impl BillingService {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// All sessions of a class whose date falls in the month, any status.
    pub fn sessions_for(&self, class_id: &str, ym: &str) -> Vec<Session> {
        self.store.read(|doc| {
            sessions_for(doc, class_id, ym)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Coarse monthly revenue estimate for a class, ignoring discounts and
    /// attendance. `None` when the class does not exist.
    pub fn revenue_for(&self, class_id: &str, ym: &str) -> Option<i64> {
        self.store
            .read(|doc| doc.class_by_id(class_id).map(|cls| revenue_for(doc, cls, ym)))
    }

    /// Authoritative monthly revenue for a class, per enrollment discount
    /// and attendance. `None` when the class does not exist.
    pub fn revenue_for_detailed(&self, class_id: &str, ym: &str) -> Option<i64> {
        self.store.read(|doc| {
            doc.class_by_id(class_id)
                .map(|cls| revenue_for_detailed(doc, cls, ym))
        })
    }

    /// Teacher cost of a class for the month. `None` when the class does not
    /// exist.
    pub fn cost_for(&self, class_id: &str, ym: &str) -> Option<i64> {
        self.store
            .read(|doc| doc.class_by_id(class_id).map(|cls| cost_for(doc, cls, ym)))
    }

    /// Detailed revenue minus teacher cost.
    pub fn net_for(&self, class_id: &str, ym: &str) -> Option<i64> {
        self.store.read(|doc| {
            doc.class_by_id(class_id)
                .map(|cls| revenue_for_detailed(doc, cls, ym) - cost_for(doc, cls, ym))
        })
    }

    /// A student's tuition invoice for the month, one item per enrolled
    /// class. Always produced, even for an unknown student (empty invoice).
    pub fn invoice_for_student(&self, student_id: &str, ym: &str) -> Invoice {
        self.store.read(|doc| invoice_for_student(doc, student_id, ym))
    }

    /// A teacher's monthly payroll statement. `None` when the teacher does
    /// not exist.
    pub fn payroll_for_teacher(&self, teacher_id: &str, ym: &str) -> Option<PayrollStatement> {
        self.store.read(|doc| payroll_for_teacher(doc, teacher_id, ym))
    }

    /// Payroll statements for every teacher, in document order.
    pub fn payroll_for_month(&self, ym: &str) -> Vec<PayrollStatement> {
        self.store.read(|doc| {
            doc.teachers
                .iter()
                .filter_map(|t| payroll_for_teacher(doc, &t.id, ym))
                .collect()
        })
    }

    /// The month's finance dashboard: per-class revenue/cost/net plus extra
    /// expenses from document metadata.
    pub fn finance_summary(&self, ym: &str) -> FinanceSummary {
        self.store.read(|doc| finance_summary(doc, ym))
    }
}

/// Sessions of a class in a month: a 7-character "YYYY-MM" prefix match on
/// the session date.
pub fn sessions_for<'a>(doc: &'a Document, class_id: &str, ym: &str) -> Vec<&'a Session> {
    doc.sessions
        .iter()
        .filter(|s| s.class_id == class_id && s.date.get(..7) == Some(ym))
        .collect()
}

fn held_sessions<'a>(doc: &'a Document, class_id: &str, ym: &str) -> Vec<&'a Session> {
    sessions_for(doc, class_id, ym)
        .into_iter()
        .filter(|s| s.status == SessionStatus::Held)
        .collect()
}

/// A student is billed for a session unless explicitly excused.
fn billable(session: &Session, student_id: &str) -> bool {
    session.attendance.get(student_id) != Some(&AttendanceStatus::Excused)
}

/// Coarse estimate: `price × held sessions × roster size`.
pub fn revenue_for(doc: &Document, class: &ClassRecord, ym: &str) -> i64 {
    let held = held_sessions(doc, &class.id, ym).len() as i64;
    let roster = doc
        .enrollments
        .iter()
        .filter(|e| e.class_id == class.id)
        .count() as i64;
    class.price_vnd * held * roster
}

/// Authoritative monthly class revenue: for every held session and every
/// enrollment, bill `price × (1 − discount/100)` unless the student is
/// excused for that session. Enrollment dates are not prorated: a student
/// enrolled mid-month is billed for every held session in the month.
pub fn revenue_for_detailed(doc: &Document, class: &ClassRecord, ym: &str) -> i64 {
    let enrollments: Vec<_> = doc
        .enrollments
        .iter()
        .filter(|e| e.class_id == class.id)
        .collect();
    let price = class.price_vnd as f64;
    let mut total = 0.0;
    for session in held_sessions(doc, &class.id, ym) {
        for enrollment in &enrollments {
            if billable(session, &enrollment.student_id) {
                total += price * (1.0 - enrollment.discount_pct / 100.0);
            }
        }
    }
    total.round() as i64
}

/// Build a student's invoice for a month. Only the first enrollment row per
/// class counts, guarding against duplicate rows the reconciler should never
/// produce.
pub fn invoice_for_student(doc: &Document, student_id: &str, ym: &str) -> Invoice {
    let mut seen = BTreeSet::new();
    let mut items = Vec::new();
    let mut total = 0i64;

    for enrollment in doc.enrollments.iter().filter(|e| e.student_id == student_id) {
        if !seen.insert(enrollment.class_id.clone()) {
            continue;
        }
        let class = doc.class_by_id(&enrollment.class_id);
        let price = class.map(|c| c.price_vnd).unwrap_or(0) as f64;
        let mut subtotal = 0.0;
        for session in held_sessions(doc, &enrollment.class_id, ym) {
            if billable(session, student_id) {
                subtotal += price * (1.0 - enrollment.discount_pct / 100.0);
            }
        }
        let amount = subtotal.round() as i64;
        total += amount;
        items.push(InvoiceItem {
            class_id: enrollment.class_id.clone(),
            class_name: class
                .map(|c| c.name.clone())
                .unwrap_or_else(|| enrollment.class_id.clone()),
            amount,
        });
    }

    let student_name = doc
        .student_by_id(student_id)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| student_id.to_string());
    Invoice {
        student_id: student_id.to_string(),
        student_name,
        month: ym.to_string(),
        total,
        items,
    }
}

/// Teacher cost of a class for the month, over its held sessions.
///
/// The hourly rate is resolved in order: the session's frozen snapshot, then
/// the assigned teacher's live rate, then the class's copied default rate.
/// Hours are the session's own duration floored at the class default, so a
/// short session is still paid as a full one.
pub fn cost_for(doc: &Document, class: &ClassRecord, ym: &str) -> i64 {
    let base_rate = class.teacher_rate_per_hour;
    let base_hrs = class.default_duration_hrs;
    let mut sum = 0.0;
    for session in held_sessions(doc, &class.id, ym) {
        let rate = session.teacher_rate_per_hour_snap.unwrap_or_else(|| {
            match session.teacher_id.as_deref() {
                Some(tid) => {
                    let live = doc.teacher_by_id(tid).map(|t| t.rate_per_hour).unwrap_or(0.0);
                    if live != 0.0 {
                        live
                    } else {
                        base_rate
                    }
                }
                None => base_rate,
            }
        });
        let hrs = session.duration_hrs.max(base_hrs);
        sum += rate * hrs;
    }
    sum.round() as i64
}

/// A teacher's pay for the month: one line per held session assigned to
/// them, with the same snapshot-first rate resolution and the same
/// floor-at-class-default hours as `cost_for`.
pub fn payroll_for_teacher(doc: &Document, teacher_id: &str, ym: &str) -> Option<PayrollStatement> {
    let teacher = doc.teacher_by_id(teacher_id)?;

    let mut lines: Vec<PayrollLine> = doc
        .sessions
        .iter()
        .filter(|s| {
            s.status == SessionStatus::Held
                && s.date.get(..7) == Some(ym)
                && s.teacher_id.as_deref() == Some(teacher_id)
        })
        .map(|session| {
            let class = doc.class_by_id(&session.class_id);
            let rate = session.teacher_rate_per_hour_snap.unwrap_or_else(|| {
                if teacher.rate_per_hour != 0.0 {
                    teacher.rate_per_hour
                } else {
                    class.map(|c| c.teacher_rate_per_hour).unwrap_or(0.0)
                }
            });
            let base_hrs = class.map(|c| c.default_duration_hrs).unwrap_or(1.0);
            let hours = session.duration_hrs.max(base_hrs);
            PayrollLine {
                date: session.date.clone(),
                class_id: session.class_id.clone(),
                class_name: class
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| session.class_id.clone()),
                hours,
                rate_per_hour: rate,
                pay: (rate * hours).round() as i64,
            }
        })
        .collect();
    lines.sort_by(|a, b| a.date.cmp(&b.date));

    let total_hours = lines.iter().map(|l| l.hours).sum();
    let total_pay = lines.iter().map(|l| l.pay).sum();
    Some(PayrollStatement {
        teacher_id: teacher.id.clone(),
        teacher_name: teacher.name.clone(),
        month: ym.to_string(),
        lines,
        total_hours,
        total_pay,
    })
}

/// The month's finance dashboard across all classes, minus the ad hoc extra
/// expenses recorded in document metadata.
pub fn finance_summary(doc: &Document, ym: &str) -> FinanceSummary {
    let rows: Vec<ClassFinanceRow> = doc
        .classes
        .iter()
        .map(|class| {
            let revenue = revenue_for_detailed(doc, class, ym);
            let cost = cost_for(doc, class, ym);
            ClassFinanceRow {
                class_id: class.id.clone(),
                class_name: class.name.clone(),
                revenue,
                cost,
                net: revenue - cost,
            }
        })
        .collect();

    let total_revenue = rows.iter().map(|r| r.revenue).sum::<i64>();
    let total_cost = rows.iter().map(|r| r.cost).sum::<i64>();
    let extra_expenses = doc
        .meta
        .extra_expenses
        .get(ym)
        .map(|items| items.iter().map(|e| e.amount).sum())
        .unwrap_or(0);

    FinanceSummary {
        month: ym.to_string(),
        rows,
        total_revenue,
        total_cost,
        extra_expenses,
        net_profit: total_revenue - total_cost - extra_expenses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{DocumentMeta, Enrollment, ExtraExpense, Student, Teacher};
    use std::collections::BTreeMap;

    fn class(id: &str, price: i64, default_hrs: f64) -> ClassRecord {
        ClassRecord {
            id: id.to_string(),
            name: format!("Class {id}"),
            price_vnd: price,
            default_duration_hrs: default_hrs,
            ..Default::default()
        }
    }

    fn enrollment(student_id: &str, class_id: &str, discount: f64) -> Enrollment {
        Enrollment {
            id: format!("ENR-{student_id}-{class_id}"),
            student_id: student_id.to_string(),
            class_id: class_id.to_string(),
            discount_pct: discount,
            ..Default::default()
        }
    }

    fn held(id: &str, class_id: &str, date: &str) -> Session {
        Session {
            id: id.to_string(),
            class_id: class_id.to_string(),
            date: date.to_string(),
            status: SessionStatus::Held,
            duration_hrs: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_detailed_revenue_applies_discounts_per_enrollment() {
        // The worked example: 500,000/session, one held session, two
        // students at 0% and 10% discount.
        let doc = Document {
            classes: vec![class("CLS-000001", 500_000, 1.0)],
            enrollments: vec![
                enrollment("STU-000001", "CLS-000001", 0.0),
                enrollment("STU-000002", "CLS-000001", 10.0),
            ],
            sessions: vec![held("SES-000001", "CLS-000001", "2024-05-07")],
            ..Default::default()
        };
        let cls = doc.class_by_id("CLS-000001").unwrap();
        assert_eq!(revenue_for_detailed(&doc, cls, "2024-05"), 950_000);
        // Nothing held in another month
        assert_eq!(revenue_for_detailed(&doc, cls, "2024-06"), 0);
    }

    #[test]
    fn test_detailed_revenue_skips_cancelled_and_unknown_sessions() {
        let mut cancelled = held("SES-000002", "CLS-000001", "2024-05-09");
        cancelled.status = SessionStatus::Cancelled;
        let mut unknown = held("SES-000003", "CLS-000001", "2024-05-10");
        unknown.status = SessionStatus::Unknown;
        let doc = Document {
            classes: vec![class("CLS-000001", 500_000, 1.0)],
            enrollments: vec![enrollment("STU-000001", "CLS-000001", 0.0)],
            sessions: vec![
                held("SES-000001", "CLS-000001", "2024-05-07"),
                cancelled,
                unknown,
            ],
            ..Default::default()
        };
        let cls = doc.class_by_id("CLS-000001").unwrap();
        assert_eq!(revenue_for_detailed(&doc, cls, "2024-05"), 500_000);
    }

    #[test]
    fn test_attendance_resolution() {
        let mut session = held("SES-000001", "CLS-000001", "2024-05-07");
        session.attendance = BTreeMap::from([
            ("STU-000002".to_string(), AttendanceStatus::Excused),
            ("STU-000003".to_string(), AttendanceStatus::Absent),
        ]);
        let doc = Document {
            classes: vec![class("CLS-000001", 100_000, 1.0)],
            enrollments: vec![
                enrollment("STU-000001", "CLS-000001", 0.0), // no mark: billed
                enrollment("STU-000002", "CLS-000001", 0.0), // excused: free
                enrollment("STU-000003", "CLS-000001", 0.0), // absent: billed
            ],
            sessions: vec![session],
            ..Default::default()
        };
        let cls = doc.class_by_id("CLS-000001").unwrap();
        assert_eq!(revenue_for_detailed(&doc, cls, "2024-05"), 200_000);
    }

    #[test]
    fn test_empty_attendance_bills_whole_roster() {
        let doc = Document {
            classes: vec![class("CLS-000001", 100_000, 1.0)],
            enrollments: vec![
                enrollment("STU-000001", "CLS-000001", 0.0),
                enrollment("STU-000002", "CLS-000001", 0.0),
            ],
            sessions: vec![held("SES-000001", "CLS-000001", "2024-05-07")],
            ..Default::default()
        };
        let cls = doc.class_by_id("CLS-000001").unwrap();
        assert_eq!(revenue_for_detailed(&doc, cls, "2024-05"), 200_000);
    }

    #[test]
    fn test_coarse_revenue_ignores_discounts_and_attendance() {
        let mut session = held("SES-000001", "CLS-000001", "2024-05-07");
        session.attendance =
            BTreeMap::from([("STU-000001".to_string(), AttendanceStatus::Excused)]);
        let doc = Document {
            classes: vec![class("CLS-000001", 500_000, 1.0)],
            enrollments: vec![
                enrollment("STU-000001", "CLS-000001", 50.0),
                enrollment("STU-000002", "CLS-000001", 10.0),
            ],
            sessions: vec![session],
            ..Default::default()
        };
        let cls = doc.class_by_id("CLS-000001").unwrap();
        // 500,000 × 1 held × 2 roster; the detailed variant would disagree
        assert_eq!(revenue_for(&doc, cls, "2024-05"), 1_000_000);
        assert_eq!(revenue_for_detailed(&doc, cls, "2024-05"), 450_000);
    }

    #[test]
    fn test_revenue_non_negative_for_non_negative_price() {
        let doc = Document {
            classes: vec![class("CLS-000001", 0, 1.0)],
            enrollments: vec![enrollment("STU-000001", "CLS-000001", 100.0)],
            sessions: vec![held("SES-000001", "CLS-000001", "2024-05-07")],
            ..Default::default()
        };
        let cls = doc.class_by_id("CLS-000001").unwrap();
        assert!(revenue_for_detailed(&doc, cls, "2024-05") >= 0);
    }

    #[test]
    fn test_invoice_groups_by_class_and_tolerates_duplicate_rows() {
        let doc = Document {
            students: vec![Student {
                id: "STU-000001".to_string(),
                name: "Linh".to_string(),
                ..Default::default()
            }],
            classes: vec![
                class("CLS-000001", 500_000, 1.0),
                class("CLS-000002", 300_000, 1.0),
            ],
            enrollments: vec![
                enrollment("STU-000001", "CLS-000001", 10.0),
                // Duplicate row for the same pair: only the first counts
                enrollment("STU-000001", "CLS-000001", 50.0),
                enrollment("STU-000001", "CLS-000002", 0.0),
            ],
            sessions: vec![
                held("SES-000001", "CLS-000001", "2024-05-07"),
                held("SES-000002", "CLS-000002", "2024-05-08"),
            ],
            ..Default::default()
        };
        let invoice = invoice_for_student(&doc, "STU-000001", "2024-05");
        assert_eq!(invoice.student_name, "Linh");
        assert_eq!(invoice.items.len(), 2);
        let math = invoice
            .items
            .iter()
            .find(|i| i.class_id == "CLS-000001")
            .unwrap();
        assert_eq!(math.amount, 450_000);
        assert_eq!(invoice.total, 750_000);
    }

    #[test]
    fn test_invoice_excludes_excused_sessions_only() {
        let mut excused = held("SES-000002", "CLS-000001", "2024-05-09");
        excused.attendance =
            BTreeMap::from([("STU-000001".to_string(), AttendanceStatus::Excused)]);
        let doc = Document {
            classes: vec![class("CLS-000001", 500_000, 1.0)],
            enrollments: vec![enrollment("STU-000001", "CLS-000001", 0.0)],
            sessions: vec![held("SES-000001", "CLS-000001", "2024-05-07"), excused],
            ..Default::default()
        };
        let invoice = invoice_for_student(&doc, "STU-000001", "2024-05");
        assert_eq!(invoice.total, 500_000);
    }

    #[test]
    fn test_cost_floors_hours_at_class_default() {
        // The worked example: 200,000/hr teacher, 1.5h class default, a held
        // session recorded at 1h with no snapshot.
        let mut cls = class("CLS-000001", 0, 1.5);
        cls.teacher_rate_per_hour = 200_000.0;
        let mut session = held("SES-000001", "CLS-000001", "2024-05-07");
        session.duration_hrs = 1.0;
        let doc = Document {
            classes: vec![cls],
            sessions: vec![session],
            ..Default::default()
        };
        let cls = doc.class_by_id("CLS-000001").unwrap();
        assert_eq!(cost_for(&doc, cls, "2024-05"), 300_000);
    }

    #[test]
    fn test_cost_pays_longer_sessions_in_full() {
        let mut cls = class("CLS-000001", 0, 1.0);
        cls.teacher_rate_per_hour = 100_000.0;
        let mut session = held("SES-000001", "CLS-000001", "2024-05-07");
        session.duration_hrs = 2.0;
        let doc = Document {
            classes: vec![cls],
            sessions: vec![session],
            ..Default::default()
        };
        let cls = doc.class_by_id("CLS-000001").unwrap();
        assert_eq!(cost_for(&doc, cls, "2024-05"), 200_000);
    }

    #[test]
    fn test_cost_rate_resolution_order() {
        let teacher = Teacher {
            id: "TEA-000001".to_string(),
            name: "Mr. Nam".to_string(),
            rate_per_hour: 150_000.0,
            ..Default::default()
        };
        let mut cls = class("CLS-000001", 0, 1.0);
        cls.teacher_rate_per_hour = 120_000.0;

        // Snapshot wins over live rate
        let mut snapped = held("SES-000001", "CLS-000001", "2024-05-07");
        snapped.teacher_id = Some("TEA-000001".to_string());
        snapped.teacher_rate_per_hour_snap = Some(180_000.0);
        // No snapshot: live teacher rate
        let mut live = held("SES-000002", "CLS-000001", "2024-05-08");
        live.teacher_id = Some("TEA-000001".to_string());
        // Unknown teacher: class default rate
        let mut orphan = held("SES-000003", "CLS-000001", "2024-05-09");
        orphan.teacher_id = Some("TEA-999999".to_string());
        // No teacher at all: class default rate
        let bare = held("SES-000004", "CLS-000001", "2024-05-10");

        let doc = Document {
            classes: vec![cls],
            teachers: vec![teacher],
            sessions: vec![snapped, live, orphan, bare],
            ..Default::default()
        };
        let cls = doc.class_by_id("CLS-000001").unwrap();
        assert_eq!(
            cost_for(&doc, cls, "2024-05"),
            180_000 + 150_000 + 120_000 + 120_000
        );
    }

    #[test]
    fn test_net_is_detailed_revenue_minus_cost() {
        let mut cls = class("CLS-000001", 500_000, 1.0);
        cls.teacher_rate_per_hour = 200_000.0;
        let doc = Document {
            classes: vec![cls],
            enrollments: vec![enrollment("STU-000001", "CLS-000001", 0.0)],
            sessions: vec![held("SES-000001", "CLS-000001", "2024-05-07")],
            ..Default::default()
        };
        let summary = finance_summary(&doc, "2024-05");
        assert_eq!(summary.rows[0].net, 300_000);
    }

    #[test]
    fn test_payroll_statement() {
        let teacher = Teacher {
            id: "TEA-000001".to_string(),
            name: "Mr. Nam".to_string(),
            rate_per_hour: 200_000.0,
            ..Default::default()
        };
        let cls = class("CLS-000001", 0, 1.5);
        let mut short = held("SES-000001", "CLS-000001", "2024-05-07");
        short.teacher_id = Some("TEA-000001".to_string());
        short.duration_hrs = 1.0; // floored to 1.5
        let mut long = held("SES-000002", "CLS-000001", "2024-05-14");
        long.teacher_id = Some("TEA-000001".to_string());
        long.duration_hrs = 2.0;
        // Another teacher's session is not on this statement
        let mut other = held("SES-000003", "CLS-000001", "2024-05-15");
        other.teacher_id = Some("TEA-000002".to_string());

        let doc = Document {
            classes: vec![cls],
            teachers: vec![teacher],
            sessions: vec![long, short, other],
            ..Default::default()
        };
        let statement = payroll_for_teacher(&doc, "TEA-000001", "2024-05").unwrap();
        assert_eq!(statement.lines.len(), 2);
        // Sorted by date
        assert_eq!(statement.lines[0].date, "2024-05-07");
        assert_eq!(statement.lines[0].hours, 1.5);
        assert_eq!(statement.lines[0].pay, 300_000);
        assert_eq!(statement.lines[1].pay, 400_000);
        assert_eq!(statement.total_hours, 3.5);
        assert_eq!(statement.total_pay, 700_000);

        assert!(payroll_for_teacher(&doc, "TEA-999999", "2024-05").is_none());
    }

    #[test]
    fn test_finance_summary_subtracts_extra_expenses() {
        let mut cls = class("CLS-000001", 500_000, 1.0);
        cls.teacher_rate_per_hour = 200_000.0;
        let doc = Document {
            classes: vec![cls],
            enrollments: vec![enrollment("STU-000001", "CLS-000001", 0.0)],
            sessions: vec![held("SES-000001", "CLS-000001", "2024-05-07")],
            meta: DocumentMeta {
                extra_expenses: BTreeMap::from([(
                    "2024-05".to_string(),
                    vec![
                        ExtraExpense {
                            name: "rent".to_string(),
                            amount: 100_000,
                        },
                        ExtraExpense {
                            name: "supplies".to_string(),
                            amount: 50_000,
                        },
                    ],
                )]),
                ..Default::default()
            },
            ..Default::default()
        };
        let summary = finance_summary(&doc, "2024-05");
        assert_eq!(summary.total_revenue, 500_000);
        assert_eq!(summary.total_cost, 200_000);
        assert_eq!(summary.extra_expenses, 150_000);
        assert_eq!(summary.net_profit, 150_000);
    }
}
