//! JSON-lines record output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use stundenplan_crawler::RecordSink;
use stundenplan_shared::{Record, Result, StundenplanError};

/// Writes one JSON object per record and line.
///
/// File output goes to a hidden `.<name>.tmp` sibling and only replaces the
/// target in [`finish`](Self::finish), so an aborted run leaves the previous
/// file untouched.
pub struct JsonLinesSink {
    writer: Box<dyn Write + Send>,
    target: String,
    /// `(temp, final)` paths for file output.
    files: Option<(PathBuf, PathBuf)>,
}

impl JsonLinesSink {
    /// Start writing records destined for `path`, creating parent
    /// directories as needed.
    pub fn create(path: &Path) -> Result<Self> {
        let file_name = path.file_name().ok_or_else(|| {
            StundenplanError::validation(format!("{} is not a file path", path.display()))
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StundenplanError::io(parent, e))?;
        }

        let temp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));
        let file = File::create(&temp).map_err(|e| StundenplanError::io(&temp, e))?;
        Ok(Self {
            writer: Box::new(BufWriter::new(file)),
            target: path.display().to_string(),
            files: Some((temp, path.to_path_buf())),
        })
    }

    pub fn stdout() -> Self {
        Self {
            writer: Box::new(BufWriter::new(std::io::stdout())),
            target: "<stdout>".into(),
            files: None,
        }
    }

    /// `path`, or stdout when `None` or `-`.
    pub fn open(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) if p.as_os_str() != "-" => Self::create(p),
            _ => Ok(Self::stdout()),
        }
    }

    /// Flush buffered lines and move file output into place.
    pub fn finish(self) -> Result<()> {
        let Self {
            mut writer,
            target,
            files,
        } = self;
        writer
            .flush()
            .map_err(|e| StundenplanError::Output(format!("{target}: {e}")))?;
        drop(writer);

        if let Some((temp, path)) = files {
            std::fs::rename(&temp, &path).map_err(|e| StundenplanError::io(&path, e))?;
        }
        Ok(())
    }

    /// Drop everything written so far. An existing target file is kept.
    pub fn discard(self) {
        let Self { writer, files, .. } = self;
        drop(writer);
        if let Some((temp, _)) = files {
            let _ = std::fs::remove_file(&temp);
        }
    }
}

impl RecordSink for JsonLinesSink {
    fn emit(&mut self, record: Record) -> Result<()> {
        let line = serde_json::to_string(&record)
            .map_err(|e| StundenplanError::Output(format!("{}: {e}", record.id)))?;
        writeln!(self.writer, "{line}")
            .map_err(|e| StundenplanError::Output(format!("{}: {e}", self.target)))
    }
}
