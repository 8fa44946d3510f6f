//! `;`-delimited CSV schedule.
//!
//! Columns are located by header name, so their order is free and unknown
//! columns are carried through rewrites untouched. Required columns are
//! `board`, `image_path`, `link`, `title`, `description` and `created`. An
//! optional `index` column supplies stable indices; without it the 0-based row
//! position is used.

use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{PersistenceError, ScheduleEntry, ScheduleError, ScheduleStore};

const DELIMITER: u8 = b';';

#[derive(Debug, Clone, Copy)]
struct Layout {
    index: Option<usize>,
    board: usize,
    image_path: usize,
    link: usize,
    title: usize,
    description: usize,
    created: usize,
}

impl Layout {
    fn from_headers(headers: &StringRecord) -> Result<Self, ScheduleError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name)
                .ok_or_else(|| ScheduleError::validation(1, format!("missing column `{name}`")))
        };

        Ok(Self {
            index: find("index"),
            board: require("board")?,
            image_path: require("image_path")?,
            link: require("link")?,
            title: require("title")?,
            description: require("description")?,
            created: require("created")?,
        })
    }
}

/// A fully validated schedule together with the raw rows it came from.
#[derive(Debug, Clone)]
pub struct ParsedSchedule {
    headers: StringRecord,
    layout: Option<Layout>,
    rows: Vec<StringRecord>,
    entries: Vec<ScheduleEntry>,
    terminator: Terminator,
}

impl ParsedSchedule {
    /// Entries in storage order.
    #[must_use]
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// The pending entry with the smallest index.
    #[must_use]
    pub fn next_pending(&self) -> Option<&ScheduleEntry> {
        self.entries.iter().find(|entry| !entry.created)
    }

    fn position_of(&self, index: u64) -> Option<usize> {
        self.entries.iter().position(|entry| entry.index == index)
    }
}

/// Parses and validates schedule CSV bytes.
pub fn parse_schedule(data: &[u8]) -> Result<ParsedSchedule, ScheduleError> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(ParsedSchedule {
            headers: StringRecord::new(),
            layout: None,
            rows: Vec::new(),
            entries: Vec::new(),
            terminator: Terminator::Any(b'\n'),
        });
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| csv_validation(&e, 1))?
        .clone();
    let layout = Layout::from_headers(&headers)?;

    let mut rows = Vec::new();
    let mut entries = Vec::new();
    let mut previous: Option<u64> = None;

    for (position, record) in reader.records().enumerate() {
        let fallback_line = position as u64 + 2;
        let record = record.map_err(|e| csv_validation(&e, fallback_line))?;
        let line = record.position().map_or(fallback_line, csv::Position::line);

        if record.len() != headers.len() {
            return Err(ScheduleError::validation(
                line,
                format!("expected {} fields, found {}", headers.len(), record.len()),
            ));
        }

        let entry = parse_entry(&record, layout, position as u64, line)?;
        if let Some(prev) = previous {
            if entry.index <= prev {
                return Err(ScheduleError::validation(
                    line,
                    format!("index {} does not increase after {prev}", entry.index),
                ));
            }
        }
        previous = Some(entry.index);

        entries.push(entry);
        rows.push(record);
    }

    Ok(ParsedSchedule {
        headers,
        layout: Some(layout),
        rows,
        entries,
        terminator: line_terminator(data),
    })
}

/// Rewrites keep the line endings of the file they replace.
fn line_terminator(data: &[u8]) -> Terminator {
    if data.windows(2).any(|pair| pair == b"\r\n") {
        Terminator::CRLF
    } else {
        Terminator::Any(b'\n')
    }
}

fn csv_validation(err: &csv::Error, fallback_line: u64) -> ScheduleError {
    let line = err.position().map_or(fallback_line, csv::Position::line);
    ScheduleError::validation(line, err.to_string())
}

fn parse_entry(
    record: &StringRecord,
    layout: Layout,
    position: u64,
    line: u64,
) -> Result<ScheduleEntry, ScheduleError> {
    let field = |column: usize| record.get(column).unwrap_or_default().trim();

    let index = match layout.index {
        Some(column) => field(column).parse::<u64>().map_err(|_| {
            ScheduleError::validation(line, format!("invalid index `{}`", field(column)))
        })?,
        None => position,
    };

    let created = parse_flag(field(layout.created)).ok_or_else(|| {
        ScheduleError::validation(
            line,
            format!("invalid created flag `{}`", field(layout.created)),
        )
    })?;

    let board_name = field(layout.board);
    if board_name.is_empty() {
        return Err(ScheduleError::validation(line, "board is empty"));
    }
    let image_path = field(layout.image_path);
    if image_path.is_empty() {
        return Err(ScheduleError::validation(line, "image_path is empty"));
    }

    Ok(ScheduleEntry {
        index,
        board_name: board_name.to_string(),
        image_path: image_path.to_string(),
        link: field(layout.link).to_string(),
        title: field(layout.title).to_string(),
        description: field(layout.description).to_string(),
        created,
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else {
        None
    }
}

/// Schedule stored as a CSV file.
#[derive(Debug, Clone)]
pub struct CsvScheduleStore {
    path: PathBuf,
}

impl CsvScheduleStore {
    /// Creates a store over `path`. The file is read on every call.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and validates the whole file.
    pub fn load(&self) -> Result<ParsedSchedule, ScheduleError> {
        let data = std::fs::read(&self.path).map_err(|source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_schedule(&data)
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Writes the schedule's rows to a sibling temp file carrying the original
    /// permissions and renames it over the schedule.
    fn rewrite(&self, schedule: &ParsedSchedule) -> Result<(), PersistenceError> {
        let dir = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;

        {
            let mut writer = WriterBuilder::new()
                .delimiter(DELIMITER)
                .terminator(schedule.terminator)
                .from_writer(temp.as_file_mut());
            writer
                .write_record(&schedule.headers)
                .map_err(|e| PersistenceError::Encode(e.to_string()))?;
            for row in &schedule.rows {
                writer
                    .write_record(row)
                    .map_err(|e| PersistenceError::Encode(e.to_string()))?;
            }
            writer.flush().map_err(|e| self.io_error(e))?;
        }

        temp.as_file_mut().flush().map_err(|e| self.io_error(e))?;
        let permissions = std::fs::metadata(&self.path)
            .map_err(|e| self.io_error(e))?
            .permissions();
        temp.as_file()
            .set_permissions(permissions)
            .map_err(|e| self.io_error(e))?;
        temp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        temp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }
}

impl ScheduleStore for CsvScheduleStore {
    fn next(&self) -> Result<Option<ScheduleEntry>, ScheduleError> {
        let schedule = self.load()?;
        let next = schedule.next_pending().cloned();
        debug!(
            path = %self.path.display(),
            entries = schedule.entries.len(),
            next_index = next.as_ref().map(|entry| entry.index),
            "Scanned schedule"
        );
        Ok(next)
    }

    fn mark_created(&self, index: u64) -> Result<(), PersistenceError> {
        let mut schedule = self.load().map_err(|err| match err {
            ScheduleError::Read(e) => e,
            invalid @ ScheduleError::Validation { .. } => {
                PersistenceError::Invalid(invalid.to_string())
            }
        })?;

        let position = schedule
            .position_of(index)
            .ok_or(PersistenceError::UnknownIndex(index))?;
        if schedule.entries[position].created {
            debug!(index, "Entry already marked created");
            return Ok(());
        }

        let layout = schedule
            .layout
            .ok_or(PersistenceError::UnknownIndex(index))?;
        let updated: StringRecord = schedule.rows[position]
            .iter()
            .enumerate()
            .map(|(column, value)| if column == layout.created { "true" } else { value })
            .collect();
        schedule.rows[position] = updated;

        self.rewrite(&schedule)?;
        info!(index, path = %self.path.display(), "Marked entry as created");
        Ok(())
    }
}
