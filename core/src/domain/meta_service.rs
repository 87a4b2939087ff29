use log::info;
use std::sync::Arc;

use crate::storage::{ChangeSource, DocumentStore};
use shared::ExtraExpense;

/// Service for document-level metadata: the free-form admin notepad and the
/// per-month extra expenses that feed the finance summary.
#[derive(Clone)]
pub struct MetaService {
    store: Arc<DocumentStore>,
}

impl MetaService {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    pub fn admin_notes(&self) -> String {
        self.store.read(|doc| doc.meta.admin_notes.clone())
    }

    pub fn set_admin_notes(&self, notes: &str) {
        self.store.mutate(ChangeSource::Meta, |doc| {
            doc.meta.admin_notes = notes.to_string();
        });
    }

    /// Record an ad hoc expense against a month ("YYYY-MM"). Amounts are
    /// whole VND; names are free text and may repeat.
    pub fn add_extra_expense(&self, ym: &str, name: &str, amount: i64) -> ExtraExpense {
        info!("Recording extra expense for {}: {} ({amount} VND)", ym, name);
        self.store.mutate(ChangeSource::Meta, |doc| {
            let expense = ExtraExpense {
                name: name.to_string(),
                amount,
            };
            doc.meta
                .extra_expenses
                .entry(ym.to_string())
                .or_default()
                .push(expense.clone());
            expense
        })
    }

    /// Remove the expense at `index` for a month. Returns whether anything
    /// was removed; an emptied month disappears from the map.
    pub fn remove_extra_expense(&self, ym: &str, index: usize) -> bool {
        self.store
            .try_mutate(ChangeSource::Meta, |doc| {
                let items = doc.meta.extra_expenses.get_mut(ym)?;
                if index >= items.len() {
                    return None;
                }
                items.remove(index);
                if items.is_empty() {
                    doc.meta.extra_expenses.remove(ym);
                }
                Some(())
            })
            .is_some()
    }

    pub fn extra_expenses(&self, ym: &str) -> Vec<ExtraExpense> {
        self.store
            .read(|doc| doc.meta.extra_expenses.get(ym).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test() -> (Arc<DocumentStore>, MetaService) {
        let store = Arc::new(DocumentStore::in_memory());
        let service = MetaService::new(store.clone());
        (store, service)
    }

    #[test]
    fn test_admin_notes_round_trip() {
        let (_store, service) = setup_test();
        assert_eq!(service.admin_notes(), "");
        service.set_admin_notes("call Linh's parents");
        assert_eq!(service.admin_notes(), "call Linh's parents");
    }

    #[test]
    fn test_extra_expenses_per_month() {
        let (_store, service) = setup_test();
        service.add_extra_expense("2024-05", "rent", 100_000);
        service.add_extra_expense("2024-05", "supplies", 50_000);
        service.add_extra_expense("2024-06", "rent", 100_000);

        let may = service.extra_expenses("2024-05");
        assert_eq!(may.len(), 2);
        assert_eq!(may[0].name, "rent");
        assert_eq!(service.extra_expenses("2024-06").len(), 1);
        assert!(service.extra_expenses("2024-07").is_empty());
    }

    #[test]
    fn test_remove_extra_expense() {
        let (store, service) = setup_test();
        service.add_extra_expense("2024-05", "rent", 100_000);
        service.add_extra_expense("2024-05", "supplies", 50_000);

        assert!(service.remove_extra_expense("2024-05", 0));
        let left = service.extra_expenses("2024-05");
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].name, "supplies");

        // Out of range and unknown month are rejected
        assert!(!service.remove_extra_expense("2024-05", 5));
        assert!(!service.remove_extra_expense("2024-07", 0));

        // Emptying a month removes its key entirely
        assert!(service.remove_extra_expense("2024-05", 0));
        store.read(|doc| assert!(!doc.meta.extra_expenses.contains_key("2024-05")));
    }
}
