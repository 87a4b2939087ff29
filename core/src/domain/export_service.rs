use anyhow::{Context, Result};
use log::info;

use shared::{Invoice, PayrollStatement};

/// Renders billing results into shareable artifacts: CSV for spreadsheets
/// and plain text for pasting into a chat message.
#[derive(Clone, Default)]
pub struct ExportService;

impl ExportService {
    pub fn new() -> Self {
        Self
    }

    /// A student invoice as CSV, one row per class plus a Total row.
    pub fn invoice_csv(&self, invoice: &Invoice) -> Result<String> {
        info!(
            "Exporting invoice CSV for {} ({})",
            invoice.student_id, invoice.month
        );
        let mut writer = csv::Writer::from_writer(vec![]);
        writer.write_record(["Class", "Amount (VND)"])?;
        for item in &invoice.items {
            writer.write_record([item.class_name.as_str(), &item.amount.to_string()])?;
        }
        writer.write_record(["Total", &invoice.total.to_string()])?;
        let bytes = writer.into_inner().context("Failed to finish CSV writer")?;
        String::from_utf8(bytes).context("CSV output was not valid UTF-8")
    }

    /// A student invoice as plain text, suitable for a message to a parent.
    pub fn invoice_text(&self, invoice: &Invoice) -> String {
        let mut out = format!(
            "Tuition invoice for {} ({})\n",
            invoice.student_name, invoice.month
        );
        for item in &invoice.items {
            out.push_str(&format!("  {}: {} VND\n", item.class_name, item.amount));
        }
        out.push_str(&format!("Total: {} VND\n", invoice.total));
        out
    }

    /// Payroll statements as one CSV, a Total row after each teacher.
    pub fn payroll_csv(&self, statements: &[PayrollStatement]) -> Result<String> {
        let mut writer = csv::Writer::from_writer(vec![]);
        writer.write_record([
            "Teacher",
            "Date",
            "Class",
            "Hours",
            "Rate (VND/hr)",
            "Pay (VND)",
        ])?;
        for statement in statements {
            for line in &statement.lines {
                writer.write_record([
                    statement.teacher_name.as_str(),
                    line.date.as_str(),
                    line.class_name.as_str(),
                    &format!("{:.2}", line.hours),
                    &format!("{}", line.rate_per_hour as i64),
                    &line.pay.to_string(),
                ])?;
            }
            writer.write_record([
                statement.teacher_name.as_str(),
                "",
                "Total",
                &format!("{:.2}", statement.total_hours),
                "",
                &statement.total_pay.to_string(),
            ])?;
        }
        let bytes = writer.into_inner().context("Failed to finish CSV writer")?;
        String::from_utf8(bytes).context("CSV output was not valid UTF-8")
    }

    pub fn invoice_filename(&self, student_id: &str, ym: &str) -> String {
        format!("invoice_{student_id}_{ym}.csv")
    }

    pub fn payroll_filename(&self, ym: &str) -> String {
        format!("payroll_{ym}.csv")
    }

    /// Name used when exporting the whole document as JSON.
    pub fn backup_filename(&self) -> String {
        "tuition_data.json".to_string()
    }
}
