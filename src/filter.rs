use crate::columns::{CONSIGNEE, SHIPPER, STATUS};
use crate::status::{StatusCode, detect_status_code};
use crate::table::{RowRef, Table};
use std::collections::BTreeSet;

/// Client and status selection. An empty set selects everything; the two
/// predicates are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFilter {
    pub clients: BTreeSet<String>,
    pub statuses: BTreeSet<StatusCode>,
}

impl TableFilter {
    pub fn new<I, S>(clients: I, statuses: impl IntoIterator<Item = StatusCode>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            clients: clients.into_iter().map(Into::into).collect(),
            statuses: statuses.into_iter().collect(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.clients.is_empty() && self.statuses.is_empty()
    }

    fn keeps_client(&self, row: &RowRef<'_>) -> bool {
        if self.clients.is_empty() {
            return true;
        }
        [SHIPPER, CONSIGNEE]
            .iter()
            .filter_map(|column| row.get(column))
            .any(|value| self.clients.contains(value))
    }

    fn keeps_status(&self, row: &RowRef<'_>) -> bool {
        if self.statuses.is_empty() {
            return true;
        }
        row.get(STATUS)
            .and_then(detect_status_code)
            .is_some_and(|code| self.statuses.contains(&code))
    }

    pub fn matches(&self, row: &RowRef<'_>) -> bool {
        self.keeps_client(row) && self.keeps_status(row)
    }

    pub fn apply(&self, table: &Table) -> Table {
        let mut out = table.clone();
        if !self.is_identity() {
            out.retain_rows(|row| self.matches(&row));
        }
        log::debug!("filter kept {} of {} rows", out.len(), table.len());
        out
    }
}

/// Sorted, de-duplicated non-blank SHIPPER and CONSIGNEE values.
pub fn client_options(table: &Table) -> Vec<String> {
    let mut clients = BTreeSet::new();
    for column in [SHIPPER, CONSIGNEE] {
        if let Some(values) = table.column_values(column) {
            clients.extend(
                values
                    .filter(|v| !v.trim().is_empty())
                    .map(str::to_string),
            );
        }
    }
    clients.into_iter().collect()
}
