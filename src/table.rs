use crate::error::Result;
use crate::model::AggregatedRow;
use csv::WriterBuilder;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const HEADER: [&str; 7] = [
    "project",
    "developer",
    "branch",
    "additions",
    "deletions",
    "total_lines",
    "commits",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Append-only CSV table. The header is written once, when the file is created.
pub struct TableWriter {
    path: PathBuf,
}

impl TableWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, rows: &[AggregatedRow]) -> Result<usize> {
        let (mut file, created) = self.open()?;
        if created {
            file.write_all(UTF8_BOM)?;
        }

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if created {
            writer.write_record(HEADER)?;
        }
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        Ok(rows.len())
    }

    fn open(&self) -> Result<(File, bool)> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(file) => Ok((file, true)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let file = OpenOptions::new().append(true).open(&self.path)?;
                Ok((file, false))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn row(project: &str, author: &str, count: u32) -> AggregatedRow {
        AggregatedRow {
            project: project.to_string(),
            author_name: author.to_string(),
            branch: "master".to_string(),
            additions: 5,
            deletions: 1,
            total: 6,
            commit_count: count,
        }
    }

    fn read(path: &Path) -> String {
        String::from_utf8(fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn empty_batch_on_new_file_writes_header_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let written = TableWriter::new(&path).write(&[]).unwrap();

        assert_eq!(written, 0);
        assert_eq!(
            read(&path),
            "\u{feff}project,developer,branch,additions,deletions,total_lines,commits\n"
        );
    }

    #[test]
    fn header_is_written_once_across_batches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = TableWriter::new(&path);

        table.write(&[row("g/a", "Ann", 2)]).unwrap();
        table.write(&[row("g/b", "Bob", 1), row("g/b", "Cy", 3)]).unwrap();

        assert_eq!(
            read(&path),
            "\u{feff}project,developer,branch,additions,deletions,total_lines,commits\n\
             g/a,Ann,master,5,1,6,2\n\
             g/b,Bob,master,5,1,6,1\n\
             g/b,Cy,master,5,1,6,3\n"
        );
    }

    #[test]
    fn existing_file_is_appended_without_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "previous\n").unwrap();

        TableWriter::new(&path).write(&[row("g/a", "Ann", 1)]).unwrap();

        assert_eq!(read(&path), "previous\ng/a,Ann,master,5,1,6,1\n");
    }

    #[test]
    fn empty_batch_on_existing_file_changes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = TableWriter::new(&path);
        table.write(&[row("g/a", "Ann", 1)]).unwrap();
        let before = fs::read(&path).unwrap();

        table.write(&[]).unwrap();

        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn non_ascii_and_delimiters_survive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        TableWriter::new(&path)
            .write(&[row("组/项目", "张三, Jr.", 1)])
            .unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(&bytes[UTF8_BOM.len()..]);
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[0], "组/项目");
        assert_eq!(&record[1], "张三, Jr.");
    }
}
