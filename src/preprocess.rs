use crate::columns::{BILL, BOOKING, COLUMN_RENAMES, UNIT, VOL};
use crate::table::Table;
use std::fmt;
use std::str::FromStr;

/// Shipment flow category. Decides where the BILL column comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hub {
    Import,
    /// "EXPO 1": house bill plus booking.
    ExportPrimary,
    /// "EXPO 2": combined master/house bill plus booking.
    ExportSecondary,
}

impl Hub {
    pub const ALL: [Hub; 3] = [Hub::ExportPrimary, Hub::ExportSecondary, Hub::Import];

    /// Lenient label parsing: `impo*` is import, `expo 1*` the primary
    /// export hub, anything else the secondary one.
    pub fn from_label(label: &str) -> Hub {
        let lower = label.trim().to_lowercase();
        if lower.starts_with("impo") {
            Hub::Import
        } else if lower.starts_with("expo 1") {
            Hub::ExportPrimary
        } else {
            Hub::ExportSecondary
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Hub::Import => "IMPO",
            Hub::ExportPrimary => "EXPO 1",
            Hub::ExportSecondary => "EXPO 2",
        }
    }

    /// Key of the hub's data source: the label lower-cased without spaces.
    pub fn source_key(self) -> &'static str {
        match self {
            Hub::Import => "impo",
            Hub::ExportPrimary => "expo1",
            Hub::ExportSecondary => "expo2",
        }
    }

    /// Source columns joined (trimmed, with `"/ "`) into BILL.
    pub fn bill_sources(self) -> &'static [&'static str] {
        match self {
            Hub::Import => &["HBL/HAWB"],
            Hub::ExportPrimary => &["BL_HBL", BOOKING],
            Hub::ExportSecondary => &["MBL_MAWB HBL_HAWB", BOOKING],
        }
    }

    /// BILL values for every row, or `None` when a source column is missing.
    pub fn derive_bill(self, table: &Table) -> Option<Vec<String>> {
        let indices = self
            .bill_sources()
            .iter()
            .map(|name| table.column_index(name))
            .collect::<Option<Vec<usize>>>()?;
        Some(
            table
                .raw_rows()
                .iter()
                .map(|row| {
                    indices
                        .iter()
                        .map(|idx| row[*idx].trim())
                        .collect::<Vec<_>>()
                        .join("/ ")
                })
                .collect(),
        )
    }
}

impl fmt::Display for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Hub {
    type Err = String;

    /// Command-line parsing: a label or source key first, then the sheet's
    /// own prefix rule for anything starting with `impo` or `expo`
    /// (`Importaciones`, `EXPO 2 Sur`). Other text is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s.split_whitespace().collect::<String>().to_lowercase();
        if let Some(hub) = Hub::ALL.into_iter().find(|hub| hub.source_key() == key) {
            return Ok(hub);
        }
        if key.starts_with("impo") || key.starts_with("expo") {
            return Ok(Hub::from_label(s));
        }
        Err(format!("unknown hub '{s}' (expected IMPO, EXPO 1 or EXPO 2)"))
    }
}

/// Canonicalizes a raw sheet table for `hub`: alias renames, the VOL x UNIT
/// merge and BILL derivation. A table without rows comes back empty.
/// Running it again on its own output changes nothing.
pub fn preprocess(table: &Table, hub: Hub) -> Table {
    if table.is_empty() {
        return Table::default();
    }
    let mut table = table.clone();

    for (from, to) in COLUMN_RENAMES {
        if table.has_column(from) && !table.rename_column(from, to) {
            log::debug!("rename {from} -> {to} skipped: {to} already present");
        }
    }

    if let (Some(vol), Some(unit)) = (table.column_index(VOL), table.column_index(UNIT)) {
        let merged: Vec<String> = table
            .raw_rows()
            .iter()
            .map(|row| format!("{}x{}", row[vol].trim(), row[unit].trim()))
            .collect();
        table.set_column(VOL, merged);
    }

    match hub.derive_bill(&table) {
        Some(bill) => {
            log::debug!("BILL derived for {hub} from {:?}", hub.bill_sources());
            table.set_column(BILL, bill);
        }
        None => log::debug!("BILL not derived for {hub}: source columns missing"),
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        Table::from_rows(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn hub_labels_parse_by_prefix() {
        assert_eq!(Hub::from_label("IMPO"), Hub::Import);
        assert_eq!(Hub::from_label("importaciones"), Hub::Import);
        assert_eq!(Hub::from_label("Expo 1"), Hub::ExportPrimary);
        assert_eq!(Hub::from_label("EXPO 2"), Hub::ExportSecondary);
        assert_eq!(Hub::from_label("anything"), Hub::ExportSecondary);
        assert_eq!("expo 1".parse::<Hub>(), Ok(Hub::ExportPrimary));
        assert_eq!("EXPO2".parse::<Hub>(), Ok(Hub::ExportSecondary));
        assert!("mars".parse::<Hub>().is_err());
        let keys: Vec<&str> = Hub::ALL.iter().map(|h| h.source_key()).collect();
        assert_eq!(keys, vec!["expo1", "expo2", "impo"]);
    }

    #[test]
    fn command_line_hubs_accept_sheet_labels() {
        assert_eq!("Importaciones".parse::<Hub>(), Ok(Hub::Import));
        assert_eq!("  impo  ".parse::<Hub>(), Ok(Hub::Import));
        assert_eq!("Expo 1 Norte".parse::<Hub>(), Ok(Hub::ExportPrimary));
        assert_eq!("EXPO 2 Sur".parse::<Hub>(), Ok(Hub::ExportSecondary));
        assert!("north".parse::<Hub>().is_err());
        assert!("".parse::<Hub>().is_err());
    }

    #[test]
    fn import_bill_comes_from_house_bill() {
        let raw = table(&["HBL/HAWB", "STATUS", "SHIPPER"], &[&[" ABC123 ", "T", "Acme"]]);
        let out = preprocess(&raw, Hub::Import);
        assert_eq!(out.rows().next().and_then(|r| r.get(BILL)), Some("ABC123"));
    }

    #[test]
    fn export_bills_join_bill_and_booking() {
        let raw = table(&["BL_HBL", "BOOKING"], &[&["HB1 ", " BK9"]]);
        let out = preprocess(&raw, Hub::ExportPrimary);
        assert_eq!(out.rows().next().and_then(|r| r.get(BILL)), Some("HB1/ BK9"));

        let raw = table(&["MBL_MAWB HBL_HAWB", "BOOKING"], &[&["M1 H1", "BK2"]]);
        let out = preprocess(&raw, Hub::ExportSecondary);
        assert_eq!(out.rows().next().and_then(|r| r.get(BILL)), Some("M1 H1/ BK2"));
    }

    #[test]
    fn missing_sources_leave_bill_unset() {
        let raw = table(&["MBL_MAWB HBL_HAWB"], &[&["M1"]]);
        let out = preprocess(&raw, Hub::ExportSecondary);
        assert!(!out.has_column(BILL));
        let out = preprocess(&raw, Hub::Import);
        assert!(!out.has_column(BILL));
    }

    #[test]
    fn vol_merges_with_unit() {
        let raw = table(&["VOL", "UNIT"], &[&[" 20 ", "ft"]]);
        let out = preprocess(&raw, Hub::Import);
        assert_eq!(out.rows().next().and_then(|r| r.get(VOL)), Some("20xft"));
    }

    #[test]
    fn aliases_are_renamed_without_duplicates() {
        let raw = table(&["CASE", "REF. CLIENTE", "CONTAINER NUM", "CONTAINERS #"], &[&["1", "r", "a", "b"]]);
        let out = preprocess(&raw, Hub::Import);
        assert_eq!(
            out.columns(),
            ["CASE ID", "CLIENT REF", "CONTAINER NUM", "CONTAINERS #"]
        );
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let raw = table(&["HBL/HAWB"], &[]);
        assert_eq!(preprocess(&raw, Hub::Import), Table::default());
        assert_eq!(preprocess(&Table::default(), Hub::ExportPrimary), Table::default());
    }

    #[test]
    fn canonical_tables_are_left_unchanged() {
        let raw = table(
            &["CASE", "HBL/HAWB", "VOL", "UNIT", "STATUS"],
            &[&["7", "ABC123", "20", "ft", "T"], &["8", "XYZ", "1", "m3", "D"]],
        );
        let mut canonical = preprocess(&raw, Hub::Import);
        canonical.remove_column("HBL/HAWB");
        canonical.remove_column(UNIT);
        assert_eq!(preprocess(&canonical, Hub::Import), canonical);
    }
}
