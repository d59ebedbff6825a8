//! File stage: a reader-or-writer stage backed by a plain on-disk file.
//!
//! Grounded on `src/filereaderwriter.cpp` / `include/filereaderwriter.h`:
//! mode (reader vs. writer) is fixed at construction and never mixed,
//! `get`/`put` loop until the requested byte count is reached or EOF, and
//! `offset()` reports the cumulative byte count since `open`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{StageError, StageResult};
use crate::stage::Stage;

/// A file stage opened for reading.
pub struct FileReader {
    path: String,
    file: Option<File>,
    offset: u64,
    no_atime: bool,
}

impl FileReader {
    pub fn new(path: impl Into<String>) -> Self {
        FileReader {
            path: path.into(),
            file: None,
            offset: 0,
            no_atime: true,
        }
    }
}

impl Stage for FileReader {
    fn open(&mut self) -> StageResult<()> {
        let mut opts = OpenOptions::new();
        opts.read(true);
        #[cfg(target_os = "linux")]
        if self.no_atime {
            use std::os::unix::fs::OpenOptionsExt;
            opts.custom_flags(libc_noatime());
        }
        let file = opts
            .open(&self.path)
            .map_err(|e| StageError::Resource(format!("{}: {e}", self.path)))?;
        self.file = Some(file);
        self.offset = 0;
        Ok(())
    }

    fn close(&mut self) -> StageResult<()> {
        self.file = None;
        Ok(())
    }

    fn get(&mut self, buf: &mut [u8]) -> StageResult<usize> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StageError::Protocol("file not open".into()))?;
        let mut total = 0;
        while total < buf.len() {
            let n = file.read(&mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        self.offset += total as u64;
        Ok(total)
    }

    fn path(&self) -> Option<&str> {
        Some(&self.path)
    }

    fn offset(&self) -> u64 {
        self.offset
    }
}

/// A file stage opened for writing; truncates and creates, mirroring
/// `O_CREAT|O_TRUNC` in the original.
pub struct FileWriter {
    path: String,
    file: Option<File>,
    offset: u64,
}

impl FileWriter {
    pub fn new(path: impl Into<String>) -> Self {
        FileWriter {
            path: path.into(),
            file: None,
            offset: 0,
        }
    }
}

impl Stage for FileWriter {
    fn open(&mut self) -> StageResult<()> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| StageError::Resource(format!("{}: {e}", self.path)))?;
        self.file = Some(file);
        self.offset = 0;
        Ok(())
    }

    fn close(&mut self) -> StageResult<()> {
        if let Some(mut f) = self.file.take() {
            f.flush()?;
        }
        Ok(())
    }

    fn put(&mut self, buf: &[u8]) -> StageResult<usize> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StageError::Protocol("file not open".into()))?;
        file.write_all(buf)?;
        self.offset += buf.len() as u64;
        Ok(buf.len())
    }

    fn path(&self) -> Option<&str> {
        Some(&self.path)
    }

    fn offset(&self) -> u64 {
        self.offset
    }
}

/// Seek to an absolute position; used by stages that need to reopen or
/// resume a partially-written file. Not part of the `Stage` trait since
/// most stages (compressors, hashers, sockets) cannot support it.
impl FileWriter {
    pub fn seek(&mut self, pos: u64) -> StageResult<u64> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StageError::Protocol("file not open".into()))?;
        Ok(file.seek(SeekFrom::Start(pos))?)
    }
}

#[cfg(target_os = "linux")]
fn libc_noatime() -> i32 {
    nix::fcntl::OFlag::O_NOATIME.bits()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.bin");
        let path_str = path.to_str().unwrap().to_string();

        let mut w = FileWriter::new(path_str.clone());
        w.open().unwrap();
        w.put(b"hello world").unwrap();
        w.close().unwrap();
        assert_eq!(w.offset(), 11);

        let mut r = FileReader::new(path_str);
        r.open().unwrap();
        let mut buf = [0u8; 32];
        let n = r.get(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello world");
        assert_eq!(r.offset(), 11);
    }

    #[test]
    fn open_missing_file_is_resource_error() {
        let mut r = FileReader::new("/nonexistent/path/that/does/not/exist".to_string());
        match r.open() {
            Err(StageError::Resource(_)) => {}
            other => panic!("expected Resource error, got {other:?}"),
        }
    }

    #[test]
    fn get_loops_until_eof_across_short_reads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let path_str = path.to_str().unwrap().to_string();
        let data = vec![7u8; 5000];

        let mut w = FileWriter::new(path_str.clone());
        w.open().unwrap();
        w.put(&data).unwrap();
        w.close().unwrap();

        let mut r = FileReader::new(path_str);
        r.open().unwrap();
        let mut buf = vec![0u8; 5000];
        let n = r.get(&mut buf).unwrap();
        assert_eq!(n, 5000);
        assert!(buf.iter().all(|&b| b == 7));
    }
}
