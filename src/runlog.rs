use crate::error::{LogError, ResumeError};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Append-only, row-oriented log sink in ARFF shape: a header section with one
/// `@ATTRIBUTE` declaration per column, then `@DATA` and one comma-joined row
/// per logged generation.
///
/// In delayed mode rows are buffered and flushed as one write once the
/// configured delay has elapsed; [`RunLog::finalize`] always drains the
/// buffer.
pub struct RunLog {
    path: PathBuf,
    writer: BufWriter<File>,
    delay: Option<Duration>,
    pending: Vec<String>,
    last_flush: Instant,
}

impl RunLog {
    /// Opens the log sink at `path` in append mode, creating the file if
    /// needed.
    pub fn open(path: &Path, delay: Option<Duration>) -> Result<Self, LogError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| LogError {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            delay,
            pending: Vec::new(),
            last_flush: Instant::now(),
        })
    }

    /// Creates a new numbered log file `optimization_<n>.arff` inside the
    /// results folder, where `n` is the number of existing entries.
    pub fn create_numbered(folder: &Path, delay: Option<Duration>) -> Result<Self, LogError> {
        let io = |source| LogError {
            path: folder.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(folder).map_err(io)?;
        let count = std::fs::read_dir(folder).map_err(io)?.count();
        let path = folder.join(format!("optimization_{}.arff", count));
        Self::open(&path, delay)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn log_err(&self, source: std::io::Error) -> LogError {
        LogError {
            path: self.path.clone(),
            source,
        }
    }

    /// Writes one line, or buffers it in delayed mode.
    pub fn write_line(&mut self, line: &str) -> Result<(), LogError> {
        match self.delay {
            Some(delay) => {
                self.pending.push(line.to_string());
                if self.last_flush.elapsed() >= delay {
                    self.flush_pending()?;
                }
                Ok(())
            }
            None => {
                writeln!(self.writer, "{}", line).map_err(|e| self.log_err(e))?;
                self.writer.flush().map_err(|e| self.log_err(e))
            }
        }
    }

    fn flush_pending(&mut self) -> Result<(), LogError> {
        if !self.pending.is_empty() {
            let batch = self.pending.join("\n");
            writeln!(self.writer, "{}", batch).map_err(|e| self.log_err(e))?;
            self.pending.clear();
        }
        self.writer.flush().map_err(|e| self.log_err(e))?;
        self.last_flush = Instant::now();
        Ok(())
    }

    /// Drains any buffered rows and closes the sink.
    pub fn finalize(mut self) -> Result<(), LogError> {
        self.flush_pending()
    }
}

/// The named column values of the last data row of a run log, used to resume
/// an interrupted experiment.
pub struct LastRow {
    path: PathBuf,
    columns: Vec<String>,
    values: Vec<String>,
}

impl LastRow {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
            .map(|s| s.as_str())
    }

    pub fn get_i64(&self, column: &str) -> Result<i64, ResumeError> {
        let raw = self.get(column).ok_or_else(|| ResumeError::AttributeMissing {
            attribute: column.to_string(),
            path: self.path.clone(),
        })?;
        // Numeric columns may have been written in float form.
        raw.parse::<f64>()
            .map(|v| v as i64)
            .map_err(|_| ResumeError::MalformedLog {
                path: self.path.clone(),
                reason: format!("column '{}' holds non-numeric value '{}'", column, raw),
            })
    }
}

/// Parses the header attribute names and the last data row of an existing
/// run log.
pub fn read_last_row(path: &Path) -> Result<LastRow, ResumeError> {
    let file = File::open(path).map_err(|source| ResumeError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut columns = Vec::new();
    let mut last_data_line: Option<String> = None;
    let mut in_data = false;

    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| ResumeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if in_data {
            last_data_line = Some(trimmed.to_string());
        } else if trimmed.eq_ignore_ascii_case("@DATA") {
            in_data = true;
        } else if let Some(rest) = trimmed.strip_prefix("@ATTRIBUTE") {
            columns.push(parse_attribute_name(rest, path)?);
        }
    }

    let row = last_data_line.ok_or_else(|| ResumeError::MalformedLog {
        path: path.to_path_buf(),
        reason: "no data rows".to_string(),
    })?;
    let values: Vec<String> = row.split(',').map(|v| v.trim().to_string()).collect();
    if values.len() != columns.len() {
        return Err(ResumeError::MalformedLog {
            path: path.to_path_buf(),
            reason: format!(
                "last row has {} values for {} declared attributes",
                values.len(),
                columns.len()
            ),
        });
    }

    Ok(LastRow {
        path: path.to_path_buf(),
        columns,
        values,
    })
}

/// Attribute names are quoted: `@ATTRIBUTE 'Generation number' NUMERIC`.
fn parse_attribute_name(rest: &str, path: &Path) -> Result<String, ResumeError> {
    let start = rest.find('\'');
    let end = rest.rfind('\'');
    match (start, end) {
        (Some(s), Some(e)) if e > s => Ok(rest[s + 1..e].to_string()),
        _ => Err(ResumeError::MalformedLog {
            path: path.to_path_buf(),
            reason: format!("unquoted attribute declaration '{}'", rest.trim()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_rows_can_be_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("optimization_0.arff");

        let mut log = RunLog::open(&path, None).unwrap();
        log.write_line("@RELATION 'Optimization results'").unwrap();
        log.write_line("").unwrap();
        log.write_line("@ATTRIBUTE 'Generation number' NUMERIC").unwrap();
        log.write_line("@ATTRIBUTE 'Representation BinaryVector of individual 0' STRING")
            .unwrap();
        log.write_line("@ATTRIBUTE 'Evaluation number' NUMERIC").unwrap();
        log.write_line("").unwrap();
        log.write_line("@DATA").unwrap();
        log.write_line("0,0101,2").unwrap();
        log.write_line("1,1101,4").unwrap();
        log.finalize().unwrap();

        let row = read_last_row(&path).unwrap();
        assert_eq!(row.get_i64("Generation number").unwrap(), 1);
        assert_eq!(row.get_i64("Evaluation number").unwrap(), 4);
        assert_eq!(
            row.get("Representation BinaryVector of individual 0"),
            Some("1101")
        );
    }

    #[test]
    fn delayed_rows_are_flushed_on_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("optimization_0.arff");

        let mut log = RunLog::open(&path, Some(Duration::from_secs(3600))).unwrap();
        log.write_line("@ATTRIBUTE 'Generation number' NUMERIC").unwrap();
        log.write_line("@DATA").unwrap();
        log.write_line("0").unwrap();
        // Nothing has reached the file yet.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        log.finalize().unwrap();

        let row = read_last_row(&path).unwrap();
        assert_eq!(row.get_i64("Generation number").unwrap(), 0);
    }

    #[test]
    fn missing_data_section_is_a_resume_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("optimization_0.arff");
        std::fs::write(&path, "@ATTRIBUTE 'Generation number' NUMERIC\n").unwrap();
        assert!(matches!(
            read_last_row(&path),
            Err(ResumeError::MalformedLog { .. })
        ));
    }

    #[test]
    fn numbered_logs_count_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = RunLog::create_numbered(dir.path(), None).unwrap();
        assert!(first.path().ends_with("optimization_0.arff"));
        first.finalize().unwrap();
        let second = RunLog::create_numbered(dir.path(), None).unwrap();
        assert!(second.path().ends_with("optimization_1.arff"));
    }
}
