use crate::error::{ReportError, Result};
use crate::preprocess::Hub;
use crate::table::Table;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Anything that can produce the raw sheet table of a hub.
pub trait TableSource {
    fn load(&self, hub: Hub) -> Result<Table>;
}

/// Reads per-hub CSV exports of the shipment sheet.
#[derive(Debug, Clone)]
pub struct CsvSheetSource {
    paths: BTreeMap<String, PathBuf>,
    delimiter: u8,
}

impl CsvSheetSource {
    /// `paths` is keyed by [`Hub::source_key`].
    pub fn new(paths: BTreeMap<String, PathBuf>, delimiter: u8) -> Self {
        Self { paths, delimiter }
    }

    fn path_for(&self, hub: Hub) -> Result<&PathBuf> {
        self.paths.get(hub.source_key()).ok_or_else(|| {
            ReportError::Source(format!("no data source configured for hub {hub}"))
        })
    }
}

impl TableSource for CsvSheetSource {
    fn load(&self, hub: Hub) -> Result<Table> {
        let path = self.path_for(hub)?;
        let table = read_records(path, self.delimiter, |header| header.trim().to_uppercase())?;
        info!("loaded {} rows for hub {hub} from {}", table.len(), path.display());
        Ok(table)
    }
}

/// Reads a CSV file written by [`write_table_csv`] (or edited by hand after
/// that). Header names are only trimmed.
pub fn read_table_csv(path: &Path, delimiter: u8) -> Result<Table> {
    read_records(path, delimiter, |header| header.trim().to_string())
}

pub fn write_table_csv(table: &Table, path: &Path, delimiter: u8) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)?;
    writer.write_record(table.columns())?;
    for row in table.raw_rows() {
        writer.write_record(row)?;
    }
    writer.flush()?;
    debug!("wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

fn read_records<F>(path: &Path, delimiter: u8, header_name: F) -> Result<Table>
where
    F: Fn(&str) -> String,
{
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|err| ReportError::Source(format!("{}: {err}", path.display())))?;

    let mut records: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        records.push(record.iter().map(str::to_string).collect());
    }

    let mut records = records.into_iter();
    let Some(header) = records.next() else {
        debug!("{} has no rows", path.display());
        return Ok(Table::default());
    };
    let columns: Vec<String> = header.iter().map(|h| header_name(h)).collect();
    let width = columns.len();
    let mut ragged = 0usize;
    let rows: Vec<Vec<String>> = records
        .inspect(|row| {
            if row.len() != width {
                ragged += 1;
            }
        })
        .collect();
    if ragged > 0 {
        warn!(
            "{}: {ragged} row(s) do not match the {width} header columns and were padded or truncated",
            path.display()
        );
    }
    Ok(Table::from_rows(columns, rows))
}

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Read-through cache over another source. A hub's table is reused until
/// it is older than the TTL or explicitly invalidated.
pub struct CachedSource<S, C = SystemClock> {
    inner: S,
    clock: C,
    ttl: Duration,
    entries: Mutex<HashMap<Hub, (Instant, Table)>>,
}

impl<S: TableSource> CachedSource<S, SystemClock> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self::with_clock(inner, ttl, SystemClock)
    }
}

impl<S: TableSource, C: Clock> CachedSource<S, C> {
    pub fn with_clock(inner: S, ttl: Duration, clock: C) -> Self {
        Self {
            inner,
            clock,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<Hub, (Instant, Table)>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn invalidate(&self, hub: Hub) {
        self.entries().remove(&hub);
    }

    pub fn invalidate_all(&self) {
        self.entries().clear();
    }
}

impl<S: TableSource, C: Clock> TableSource for CachedSource<S, C> {
    fn load(&self, hub: Hub) -> Result<Table> {
        let now = self.clock.now();
        if let Some((loaded_at, table)) = self.entries().get(&hub) {
            if now.saturating_duration_since(*loaded_at) < self.ttl {
                debug!("cache hit for hub {hub}");
                return Ok(table.clone());
            }
        }
        debug!("cache miss for hub {hub}");
        let table = self.inner.load(hub)?;
        self.entries().insert(hub, (now, table.clone()));
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Write;

    struct ManualClock {
        start: Instant,
        offset: Cell<Duration>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                start: Instant::now(),
                offset: Cell::new(Duration::ZERO),
            }
        }

        fn advance(&self, by: Duration) {
            self.offset.set(self.offset.get() + by);
        }
    }

    impl Clock for &ManualClock {
        fn now(&self) -> Instant {
            self.start + self.offset.get()
        }
    }

    #[derive(Default)]
    struct CountingSource {
        loads: Cell<usize>,
    }

    impl TableSource for &CountingSource {
        fn load(&self, _hub: Hub) -> Result<Table> {
            self.loads.set(self.loads.get() + 1);
            Ok(Table::from_rows(
                vec!["N".into()],
                vec![vec![self.loads.get().to_string()]],
            ))
        }
    }

    fn csv_source(contents: &str) -> (tempfile::TempDir, CsvSheetSource) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("impo.csv");
        let mut file = std::fs::File::create(&path).expect("create");
        file.write_all(contents.as_bytes()).expect("write");
        let mut paths = BTreeMap::new();
        paths.insert("impo".to_string(), path);
        (dir, CsvSheetSource::new(paths, b','))
    }

    #[test]
    fn first_non_blank_row_is_the_upper_cased_header() {
        let (_dir, source) = csv_source(",,\n case , hbl/hawb ,status\n1,ABC123,T\n,,\n2,XYZ\n");
        let table = source.load(Hub::Import).expect("load");
        assert_eq!(table.columns(), ["CASE", "HBL/HAWB", "STATUS"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.raw_rows()[1], vec!["2", "XYZ", ""]);
    }

    #[test]
    fn empty_export_gives_empty_table() {
        let (_dir, source) = csv_source("\n,,\n");
        assert_eq!(source.load(Hub::Import).expect("load"), Table::default());
    }

    #[test]
    fn unconfigured_hub_is_a_source_error() {
        let (_dir, source) = csv_source("A\n1\n");
        assert!(matches!(source.load(Hub::ExportPrimary), Err(ReportError::Source(_))));
    }

    #[test]
    fn cache_reuses_tables_until_ttl_expires() {
        let clock = ManualClock::new();
        let inner = CountingSource::default();
        let cache = CachedSource::with_clock(&inner, Duration::from_secs(300), &clock);

        cache.load(Hub::Import).expect("load");
        clock.advance(Duration::from_secs(299));
        let table = cache.load(Hub::Import).expect("load");
        assert_eq!(inner.loads.get(), 1);
        assert_eq!(table.raw_rows()[0], vec!["1"]);

        clock.advance(Duration::from_secs(1));
        cache.load(Hub::Import).expect("load");
        assert_eq!(inner.loads.get(), 2);

        cache.load(Hub::ExportPrimary).expect("load");
        assert_eq!(inner.loads.get(), 3);
    }

    #[test]
    fn invalidation_forces_reload() {
        let clock = ManualClock::new();
        let inner = CountingSource::default();
        let cache = CachedSource::with_clock(&inner, Duration::from_secs(300), &clock);
        cache.load(Hub::Import).expect("load");
        cache.invalidate(Hub::Import);
        cache.load(Hub::Import).expect("load");
        assert_eq!(inner.loads.get(), 2);
        cache.invalidate_all();
        cache.load(Hub::Import).expect("load");
        assert_eq!(inner.loads.get(), 3);
    }

    #[test]
    fn operator_tables_survive_a_csv_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("view.csv");
        let table = Table::from_rows(
            vec!["CASE ID".into(), "COMENTARIOS".into()],
            vec![
                vec!["C1".into(), "call; then email".into()],
                vec!["C2".into(), "".into()],
            ],
        );
        write_table_csv(&table, &path, b';').expect("write");
        assert_eq!(read_table_csv(&path, b';').expect("read"), table);
    }

    #[test]
    fn operator_headers_keep_their_case() {
        let (dir, _) = csv_source("");
        let path = dir.path().join("edited.csv");
        std::fs::write(&path, " Case Id ,STATUS\nC1,T\n").expect("write");
        let table = read_table_csv(&path, b',').expect("read");
        assert_eq!(table.columns(), ["Case Id", "STATUS"]);
    }

    #[test]
    fn missing_operator_file_is_a_source_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_table_csv(&dir.path().join("absent.csv"), b',').err();
        assert!(matches!(err, Some(ReportError::Source(_))));
    }
}
