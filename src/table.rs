/// Column-ordered string table. Every row holds exactly one value per
/// column, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Borrowed view of one row, addressable by column name.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    columns: &'a [String],
    values: &'a [String],
}

impl<'a> RowRef<'a> {
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx).map(String::as_str)
    }

    pub fn values(&self) -> &'a [String] {
        self.values
    }
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a table, padding short rows with empty strings and
    /// truncating long ones to the column count.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn push_row(&mut self, mut values: Vec<String>) {
        values.resize(self.columns.len(), String::new());
        self.rows.push(values);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn rows(&self) -> impl Iterator<Item = RowRef<'_>> + '_ {
        self.rows.iter().map(|values| RowRef {
            columns: &self.columns,
            values,
        })
    }

    pub fn raw_rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_values(&self, column: &str) -> Option<impl Iterator<Item = &str> + '_> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(move |row| row[idx].as_str()))
    }

    /// Renames `from` to `to`. Returns false, leaving the table untouched,
    /// when `from` is absent or `to` already exists.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        if self.has_column(to) {
            return false;
        }
        match self.column_index(from) {
            Some(idx) => {
                self.columns[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Replaces the values of `column`, appending it when absent. `values`
    /// must hold one entry per row; missing entries become empty strings.
    pub fn set_column(&mut self, column: &str, values: Vec<String>) {
        let idx = match self.column_index(column) {
            Some(idx) => idx,
            None => {
                self.columns.push(column.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
                self.columns.len() - 1
            }
        };
        let mut values = values.into_iter();
        for row in &mut self.rows {
            row[idx] = values.next().unwrap_or_default();
        }
    }

    /// Rewrites every value of `column` in place. No-op when absent.
    pub fn map_column<F>(&mut self, column: &str, mut f: F)
    where
        F: FnMut(&str) -> String,
    {
        let Some(idx) = self.column_index(column) else {
            return;
        };
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
    }

    pub fn remove_column(&mut self, column: &str) -> bool {
        let Some(idx) = self.column_index(column) else {
            return false;
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        true
    }

    pub fn move_column_to_end(&mut self, column: &str) {
        let Some(idx) = self.column_index(column) else {
            return;
        };
        let name = self.columns.remove(idx);
        self.columns.push(name);
        for row in &mut self.rows {
            let value = row.remove(idx);
            row.push(value);
        }
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(RowRef<'_>) -> bool,
    {
        let columns = &self.columns;
        self.rows.retain(|values| keep(RowRef { columns, values }));
    }

    /// Projection onto `columns`, in the given order. Names that are not
    /// in the table, and repeats, are skipped.
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> Table {
        let mut picked: Vec<usize> = Vec::new();
        for name in columns {
            if let Some(idx) = self.column_index(name.as_ref()) {
                if !picked.contains(&idx) {
                    picked.push(idx);
                }
            }
        }
        Table {
            columns: picked.iter().map(|idx| self.columns[*idx].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| picked.iter().map(|idx| row[*idx].clone()).collect())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            vec!["A".into(), "B".into(), "C".into()],
            vec![
                vec!["1".into(), "2".into(), "3".into()],
                vec!["4".into()],
                vec!["7".into(), "8".into(), "9".into(), "extra".into()],
            ],
        )
    }

    #[test]
    fn rows_are_normalized_to_column_count() {
        let table = sample();
        assert_eq!(table.raw_rows()[1], vec!["4", "", ""]);
        assert_eq!(table.raw_rows()[2], vec!["7", "8", "9"]);
        let second = table.rows().nth(1).expect("row");
        assert_eq!(second.get("A"), Some("4"));
        assert_eq!(second.get("Z"), None);
    }

    #[test]
    fn rename_refuses_to_duplicate_columns() {
        let mut table = sample();
        assert!(!table.rename_column("A", "B"));
        assert!(!table.rename_column("Q", "R"));
        assert!(table.rename_column("A", "ID"));
        assert_eq!(table.columns(), ["ID", "B", "C"]);
    }

    #[test]
    fn set_column_appends_or_overwrites() {
        let mut table = sample();
        table.set_column("D", vec!["x".into(), "y".into()]);
        assert_eq!(table.columns().len(), 4);
        assert_eq!(
            table.column_values("D").expect("D").collect::<Vec<_>>(),
            vec!["x", "y", ""]
        );
        table.set_column("A", vec!["a".into(); 3]);
        assert_eq!(table.raw_rows()[0][0], "a");
    }

    #[test]
    fn select_projects_in_requested_order() {
        let table = sample().select(&["C", "missing", "A", "C"]);
        assert_eq!(table.columns(), ["C", "A"]);
        assert_eq!(table.raw_rows()[0], vec!["3", "1"]);
    }

    #[test]
    fn move_remove_and_retain() {
        let mut table = sample();
        table.move_column_to_end("A");
        assert_eq!(table.columns(), ["B", "C", "A"]);
        assert_eq!(table.raw_rows()[0], vec!["2", "3", "1"]);
        assert!(table.remove_column("C"));
        assert!(!table.remove_column("C"));
        table.retain_rows(|row| row.get("A") != Some("4"));
        assert_eq!(table.len(), 2);
    }
}
