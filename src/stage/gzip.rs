//! Gzip compression stages: a compress-writer and a decompress-reader.
//!
//! Grounded on `src/zipwriter.cpp` / `include/zipwriter.h` (buffer sizing,
//! the NO_FLUSH/FINISH driving loop, the `finished` flag) and
//! `src/unzipreader.cpp` / `include/unzipreader.h` (refill-from-child +
//! inflate, `Z_STREAM_END` handling). Both wrap a child [`Stage`]; unlike
//! the C++ originals this crate drives `flate2`'s `Compress`/`Decompress`
//! state machines directly instead of hand-rolling deflate calls, since
//! `flate2` already exposes the same `NO_FLUSH`/`FINISH` vocabulary.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::error::{StageError, StageResult};
use crate::stage::Stage;

/// Bytes staged per drive of the deflate/inflate loop, matching the
/// original's 100 KiB buffer.
const STAGING_BUFFER: usize = 100 * 1024;

/// Gzip-compresses everything written to it and forwards the compressed
/// bytes to `child`.
pub struct GzipWriter {
    child: Box<dyn Stage>,
    compress: Compress,
    out_buf: Vec<u8>,
    finished: bool,
}

impl GzipWriter {
    /// `level` must be in `1..=9`, matching the original's accepted range.
    pub fn new(child: Box<dyn Stage>, level: u32) -> Self {
        let level = level.clamp(1, 9);
        GzipWriter {
            child,
            compress: Compress::new_gzip(Compression::new(level), 15),
            out_buf: vec![0u8; STAGING_BUFFER],
            finished: false,
        }
    }

    fn drain(&mut self, input: &[u8], flush: FlushCompress) -> StageResult<()> {
        let mut input_offset = 0;
        loop {
            let before_out = self.compress.total_out();
            let before_in = self.compress.total_in();
            let status = self
                .compress
                .compress(&input[input_offset..], &mut self.out_buf, flush)
                .map_err(|e| StageError::Codec(e.to_string()))?;
            let produced = (self.compress.total_out() - before_out) as usize;
            let consumed = (self.compress.total_in() - before_in) as usize;
            if produced > 0 {
                self.child.put(&self.out_buf[..produced])?;
            }
            input_offset += consumed;

            match status {
                Status::Ok | Status::BufError if input_offset < input.len() => continue,
                Status::StreamEnd => {
                    self.finished = true;
                    return Ok(());
                }
                _ => {
                    if input_offset >= input.len() && produced < self.out_buf.len() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

impl Stage for GzipWriter {
    fn open(&mut self) -> StageResult<()> {
        self.child.open()
    }

    fn close(&mut self) -> StageResult<()> {
        let finish_result = if !self.finished {
            self.drain(&[], FlushCompress::Finish)
        } else {
            Ok(())
        };
        let child_result = self.child.close();
        finish_result?;
        child_result
    }

    fn put(&mut self, buf: &[u8]) -> StageResult<usize> {
        if self.finished {
            return Err(StageError::Protocol("gzip writer already finished".into()));
        }
        self.drain(buf, FlushCompress::None)?;
        Ok(buf.len())
    }

    fn path(&self) -> Option<&str> {
        self.child.path()
    }

    fn offset(&self) -> u64 {
        self.child.offset()
    }
}

/// Gzip-decompresses bytes read from `child`.
pub struct GzipReader {
    child: Box<dyn Stage>,
    decompress: Decompress,
    in_buf: Vec<u8>,
    in_len: usize,
    in_pos: usize,
    stream_ended: bool,
}

impl GzipReader {
    pub fn new(child: Box<dyn Stage>) -> Self {
        GzipReader {
            child,
            decompress: Decompress::new_gzip(true),
            in_buf: vec![0u8; STAGING_BUFFER],
            in_len: 0,
            in_pos: 0,
            stream_ended: false,
        }
    }
}

impl Stage for GzipReader {
    fn open(&mut self) -> StageResult<()> {
        self.child.open()
    }

    fn close(&mut self) -> StageResult<()> {
        self.child.close()
    }

    fn get(&mut self, buf: &mut [u8]) -> StageResult<usize> {
        if self.stream_ended {
            return Ok(0);
        }
        let mut total_out = 0;
        while total_out < buf.len() {
            if self.in_pos == self.in_len {
                self.in_len = self.child.get(&mut self.in_buf)?;
                self.in_pos = 0;
                if self.in_len == 0 {
                    // Child EOF before the gzip stream finished is the
                    // caller's problem to detect via `close`; return what
                    // we have so far.
                    break;
                }
            }

            let before_out = self.decompress.total_out();
            let before_in = self.decompress.total_in();
            let status = self
                .decompress
                .decompress(
                    &self.in_buf[self.in_pos..self.in_len],
                    &mut buf[total_out..],
                    FlushDecompress::None,
                )
                .map_err(|e| StageError::Codec(e.to_string()))?;
            let produced = (self.decompress.total_out() - before_out) as usize;
            let consumed = (self.decompress.total_in() - before_in) as usize;
            self.in_pos += consumed;
            total_out += produced;

            if status == Status::StreamEnd {
                self.stream_ended = true;
                break;
            }
            if consumed == 0 && produced == 0 {
                // Nothing could be made of the current input slice; force a
                // refill on the next iteration.
                self.in_pos = self.in_len;
            }
        }
        Ok(total_out)
    }

    fn path(&self) -> Option<&str> {
        self.child.path()
    }

    fn offset(&self) -> u64 {
        self.child.offset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::file::{FileReader, FileWriter};
    use tempfile::tempdir;

    #[test]
    fn compress_then_decompress_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.gz");
        let path_str = path.to_str().unwrap().to_string();

        let original: Vec<u8> = (0u8..=255).cycle().take(50_000).collect();

        let file_writer = Box::new(FileWriter::new(path_str.clone()));
        let mut writer = GzipWriter::new(file_writer, 6);
        writer.open().unwrap();
        for chunk in original.chunks(4096) {
            writer.put(chunk).unwrap();
        }
        writer.close().unwrap();

        let file_reader = Box::new(FileReader::new(path_str));
        let mut reader = GzipReader::new(file_reader);
        reader.open().unwrap();
        let mut recovered = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = reader.get(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            recovered.extend_from_slice(&buf[..n]);
        }
        reader.close().unwrap();

        assert_eq!(recovered, original);
    }

    #[test]
    fn get_on_writer_is_protocol_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.gz");
        let file_writer = Box::new(FileWriter::new(path.to_str().unwrap().to_string()));
        let mut writer = GzipWriter::new(file_writer, 3);
        let mut buf = [0u8; 16];
        assert!(writer.get(&mut buf).is_err());
    }
}
