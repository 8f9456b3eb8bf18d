// sbdl-core/src/infrastructure/adapters/duckdb_source.rs
//
// Lit les trois tables d'une partition `load_date=YYYY-MM-DD` déposées en CSV
// par l'extraction amont. DuckDB fait le parsing, on ne garde que du texte.

use async_trait::async_trait;
use chrono::NaiveDate;
use duckdb::{Config, Connection};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::domain::model::{
    AccountRecord, AddressRecord, PartitionInput, PartyRecord, TaxIdentifier, TitleLine,
};
use crate::error::SbdlError;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::source::SourceReader;

const ACCOUNTS: &str = "accounts";
const PARTIES: &str = "parties";
const ADDRESSES: &str = "addresses";

fn re_title_column() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^legal_title_(\d+)$").unwrap_or_else(|_| {
            // Hardcoded pattern, cannot fail.
            Regex::new("$^").unwrap_or_else(|_| unreachable!())
        })
    })
}

pub struct DuckDbSourceReader {
    conn: Arc<Mutex<Connection>>,
    data_dir: PathBuf,
}

impl DuckDbSourceReader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, InfrastructureError> {
        let conn = Connection::open_in_memory_with_flags(Config::default())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            data_dir: data_dir.into(),
        })
    }

    fn partition_files(
        &self,
        table: &str,
        load_date: NaiveDate,
    ) -> Result<Vec<PathBuf>, InfrastructureError> {
        let dir = self
            .data_dir
            .join(table)
            .join(format!("load_date={}", load_date.format("%Y-%m-%d")));

        if !dir.is_dir() {
            return Err(InfrastructureError::PartitionMissing {
                table: table.to_string(),
                load_date: load_date.to_string(),
                path: dir.display().to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| InfrastructureError::Io(e.into()))?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
                files.push(path.to_path_buf());
            }
        }
        debug!(table, files = files.len(), "Partition files discovered");
        Ok(files)
    }

    fn read_table(&self, table: &str, files: &[PathBuf]) -> Result<RawTable, InfrastructureError> {
        if files.is_empty() {
            return Ok(RawTable::empty(table));
        }

        let source = csv_source(files);
        let conn = self.conn.lock().map_err(|_| {
            InfrastructureError::Io(std::io::Error::other("DuckDB Mutex Poisoned"))
        })?;

        // 1. Schéma (DESCRIBE évite de dépendre d'un statement déjà exécuté)
        let mut describe = conn.prepare(&format!("DESCRIBE SELECT * FROM {}", source))?;
        let columns = describe
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        // 2. Lignes, toutes en VARCHAR
        let width = columns.len();
        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", source))?;
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, Option<String>>(i))
                    .collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RawTable {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_lowercase()).collect(),
            rows,
        })
    }
}

fn csv_source(files: &[PathBuf]) -> String {
    let list = files
        .iter()
        .map(|p| format!("'{}'", p.display().to_string().replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "read_csv_auto([{}], header = true, all_varchar = true, union_by_name = true)",
        list
    )
}

/// A CSV table as DuckDB returned it: lower-cased column names, nullable text cells.
struct RawTable {
    table: String,
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    fn empty(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    fn required(&self, column: &str) -> Result<Column, InfrastructureError> {
        if self.rows.is_empty() && self.columns.is_empty() {
            return Ok(Column(None));
        }
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| Column(Some(i)))
            .ok_or_else(|| InfrastructureError::MissingColumn {
                table: self.table.clone(),
                column: column.to_string(),
            })
    }

    fn optional(&self, column: &str) -> Column {
        Column(self.columns.iter().position(|c| c == column))
    }

    /// `(line_type, column index)` for every `legal_title_N` column, N ascending.
    fn title_columns(&self) -> Vec<(String, usize)> {
        let mut titles: Vec<(u32, usize)> = self
            .columns
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                re_title_column()
                    .captures(name)
                    .and_then(|caps| caps.get(1))
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .map(|n| (n, i))
            })
            .collect();
        titles.sort();
        titles
            .into_iter()
            .map(|(n, i)| (format!("lgl_ttl_ln_{}", n), i))
            .collect()
    }
}

#[derive(Clone, Copy)]
struct Column(Option<usize>);

impl Column {
    /// Trimmed cell, `None` when the column is absent, null or blank.
    fn get(self, row: &[Option<String>]) -> Option<String> {
        self.0
            .and_then(|i| row.get(i))
            .and_then(|cell| cell.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn text(self, row: &[Option<String>]) -> String {
        self.get(row).unwrap_or_default()
    }
}

fn parse_active(value: Option<String>) -> bool {
    match value {
        None => true,
        Some(v) => matches!(
            v.to_ascii_lowercase().as_str(),
            "1" | "y" | "yes" | "true" | "t"
        ),
    }
}

fn to_accounts(table: &RawTable) -> Result<Vec<AccountRecord>, InfrastructureError> {
    let id = table.required("account_id")?;
    let source_sys = table.required("source_sys")?;
    let start = table.required("account_start_date")?;
    let active = table.optional("active_ind");
    let tax_type = table.optional("tax_id_type");
    let tax_id = table.optional("tax_id");
    let branch = table.optional("branch_code");
    let country = table.optional("country");
    let titles = table.title_columns();

    Ok(table
        .rows
        .iter()
        .map(|row| AccountRecord {
            account_id: id.text(row),
            source_system_id: source_sys.text(row),
            start_date_time: start.text(row),
            title_lines: titles
                .iter()
                .filter_map(|(line_type, i)| {
                    Column(Some(*i))
                        .get(row)
                        .map(|line| TitleLine::new(line_type.clone(), line))
                })
                .collect(),
            active_indicator: parse_active(active.get(row)),
            tax_identifier: tax_id.get(row).map(|tax_id| TaxIdentifier {
                tax_id_type: tax_type.text(row),
                tax_id,
            }),
            branch_code: branch.get(row),
            country: country.get(row),
        })
        .collect())
}

fn to_parties(table: &RawTable) -> Result<Vec<PartyRecord>, InfrastructureError> {
    let account_id = table.required("account_id")?;
    let party_id = table.required("party_id")?;
    let relation = table.required("relation_type")?;
    let start = table.optional("relation_start_date");

    Ok(table
        .rows
        .iter()
        .map(|row| PartyRecord {
            party_id: party_id.text(row),
            account_id: account_id.text(row),
            relationship_type: relation.text(row),
            relation_start_date_time: start.get(row),
        })
        .collect())
}

fn to_addresses(table: &RawTable) -> Result<Vec<AddressRecord>, InfrastructureError> {
    let party_id = table.required("party_id")?;
    let line1 = table.required("address_line_1")?;
    let city = table.required("city")?;
    let country = table.required("country_of_address")?;
    let line2 = table.optional("address_line_2");
    let postal = table.optional("postal_code");
    let start = table.optional("address_start_date");

    Ok(table
        .rows
        .iter()
        .map(|row| AddressRecord {
            party_id: party_id.text(row),
            address_line1: line1.text(row),
            address_city: city.text(row),
            address_country: country.text(row),
            address_line2: line2.get(row),
            postal_code: postal.get(row),
            address_start_date: start.get(row),
        })
        .collect())
}

#[async_trait]
impl SourceReader for DuckDbSourceReader {
    #[instrument(skip(self), fields(data_dir = %self.data_dir.display()))]
    async fn read_partition(&self, load_date: NaiveDate) -> Result<PartitionInput, SbdlError> {
        // Les trois répertoires doivent exister avant de lire quoi que ce soit
        let account_files = self.partition_files(ACCOUNTS, load_date)?;
        let party_files = self.partition_files(PARTIES, load_date)?;
        let address_files = self.partition_files(ADDRESSES, load_date)?;

        let mut input = PartitionInput::new(load_date);
        input.accounts = to_accounts(&self.read_table(ACCOUNTS, &account_files)?)?;
        input.parties = to_parties(&self.read_table(PARTIES, &party_files)?)?;
        input.addresses = to_addresses(&self.read_table(ADDRESSES, &address_files)?)?;

        info!(
            accounts = input.accounts.len(),
            parties = input.parties.len(),
            addresses = input.addresses.len(),
            "Partition loaded"
        );
        Ok(input)
    }

    fn source_name(&self) -> &str {
        "duckdb-csv"
    }
}

/// Root of the partitioned landing area, relative paths resolved against `project_dir`.
pub fn resolve_data_dir(project_dir: &Path, data_dir: &str) -> PathBuf {
    let path = Path::new(data_dir);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_dir.join(path)
    }
}
