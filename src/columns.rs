use crate::table::Table;

pub const BILL: &str = "BILL";
pub const VOL: &str = "VOL";
pub const UNIT: &str = "UNIT";
pub const STATUS: &str = "STATUS";
pub const SHIPPER: &str = "SHIPPER";
pub const CONSIGNEE: &str = "CONSIGNEE";
pub const BOOKING: &str = "BOOKING";
/// Free-text column the operator fills in before rendering.
pub const COMMENTS: &str = "COMENTARIOS";

/// Shown unless the operator picks otherwise.
pub const DEFAULT_COLUMNS: [&str; 11] = [
    "CASE ID",
    "CLIENT REF",
    BILL,
    VOL,
    SHIPPER,
    CONSIGNEE,
    "ORIGIN",
    "DESTINATION",
    "ETD",
    "ETA",
    STATUS,
];

pub const OPTIONAL_COLUMNS: [&str; 4] = [
    "EMPTY PICK UP",
    "FINAL DESTINATION",
    "SHIPPING LINE",
    "CONTAINERS #",
];

/// Sheet header spellings mapped to their display names.
pub const COLUMN_RENAMES: [(&str, &str); 4] = [
    ("CASE", "CASE ID"),
    ("REF. CLIENTE", "CLIENT REF"),
    ("SHIPPING_LINE", "SHIPPING LINE"),
    ("CONTAINER NUM", "CONTAINERS #"),
];

/// Catalog columns present in `table`, defaults first.
pub fn available_columns(table: &Table) -> Vec<String> {
    DEFAULT_COLUMNS
        .iter()
        .chain(OPTIONAL_COLUMNS.iter())
        .filter(|name| table.has_column(name))
        .map(|name| name.to_string())
        .collect()
}

pub fn default_selection(table: &Table) -> Vec<String> {
    DEFAULT_COLUMNS
        .iter()
        .filter(|name| table.has_column(name))
        .map(|name| name.to_string())
        .collect()
}
