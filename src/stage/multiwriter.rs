//! Fan-out writer: a single `put` is delivered to an ordered list of child
//! writers.
//!
//! Grounded on `src/multiwriter.cpp` / `include/multiwriter.h`: `open`
//! opens children in order and rolls back (closes in reverse) on the first
//! failure; `put` drives every child with the same buffer and aborts at the
//! first short write or error without touching the remaining children for
//! that call; `path`/`offset` report the first child's value.

use crate::error::{StageError, StageResult};
use crate::stage::Stage;

pub struct MultiWriter {
    children: Vec<Box<dyn Stage>>,
    opened: usize,
}

impl MultiWriter {
    pub fn new() -> Self {
        MultiWriter {
            children: Vec::new(),
            opened: 0,
        }
    }

    /// Append a child. Must be called before `open`.
    pub fn add(&mut self, child: Box<dyn Stage>) {
        self.children.push(child);
    }
}

impl Default for MultiWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for MultiWriter {
    fn open(&mut self) -> StageResult<()> {
        for (i, child) in self.children.iter_mut().enumerate() {
            if let Err(e) = child.open() {
                // Roll back: close every child opened so far, in reverse.
                for already in self.children[..i].iter_mut().rev() {
                    let _ = already.close();
                }
                self.opened = 0;
                return Err(e);
            }
            self.opened = i + 1;
        }
        Ok(())
    }

    fn close(&mut self) -> StageResult<()> {
        let mut first_err = None;
        for child in self.children.iter_mut().take(self.opened) {
            if let Err(e) = child.close() {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        self.opened = 0;
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn put(&mut self, buf: &[u8]) -> StageResult<usize> {
        for child in self.children.iter_mut() {
            let n = child.put(buf)?;
            if n != buf.len() {
                return Err(StageError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "short write to a multi-writer child",
                )));
            }
        }
        Ok(buf.len())
    }

    fn path(&self) -> Option<&str> {
        self.children.first().and_then(|c| c.path())
    }

    fn offset(&self) -> u64 {
        self.children.first().map(|c| c.offset()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::file::FileWriter;
    use tempfile::tempdir;

    #[test]
    fn put_fans_out_to_every_child() {
        let dir = tempdir().unwrap();
        let p1 = dir.path().join("a.bin");
        let p2 = dir.path().join("b.bin");

        let mut mw = MultiWriter::new();
        mw.add(Box::new(FileWriter::new(p1.to_str().unwrap())));
        mw.add(Box::new(FileWriter::new(p2.to_str().unwrap())));
        mw.open().unwrap();
        mw.put(b"hello").unwrap();
        mw.close().unwrap();

        assert_eq!(std::fs::read(&p1).unwrap(), b"hello");
        assert_eq!(std::fs::read(&p2).unwrap(), b"hello");
    }

    #[test]
    fn open_rolls_back_on_failure() {
        let dir = tempdir().unwrap();
        let p1 = dir.path().join("good.bin");

        let mut mw = MultiWriter::new();
        mw.add(Box::new(FileWriter::new(p1.to_str().unwrap())));
        mw.add(Box::new(FileWriter::new(
            "/nonexistent/dir/that/does/not/exist/bad.bin",
        )));
        assert!(mw.open().is_err());
    }

    #[test]
    fn path_and_offset_report_first_child() {
        let dir = tempdir().unwrap();
        let p1 = dir.path().join("first.bin");
        let p2 = dir.path().join("second.bin");

        let mut mw = MultiWriter::new();
        mw.add(Box::new(FileWriter::new(p1.to_str().unwrap())));
        mw.add(Box::new(FileWriter::new(p2.to_str().unwrap())));
        mw.open().unwrap();
        mw.put(b"xyz").unwrap();

        assert_eq!(mw.path(), Some(p1.to_str().unwrap()));
        assert_eq!(mw.offset(), 3);
        mw.close().unwrap();
    }
}
