//! Pass-through digesting stage.
//!
//! Grounded on `base/hasher.cpp` / `base/hasher.h`: bytes flowing through
//! `get`/`put` are fed into a digest context in chunks no larger than
//! [`MAX_UPDATE_CHUNK`] (409 600 in the original, kept here), and the
//! lowercase hex digest is written out only on a successful `close`.

use digest::DynDigest;
use md4::Md4;
use md5::Md5;
use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::error::{StageError, StageResult};
use crate::stage::Stage;

const MAX_UPDATE_CHUNK: usize = 409_600;

/// Supported digest algorithms, matching the original's `Digest` enum
/// (legacy entries the original carries for compatibility, like `md_null`
/// and DSA's `dss`/`dss1`, are omitted — nothing in this crate's scope
/// produces them).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Md4,
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Ripemd160,
}

fn new_digest(algo: Algorithm) -> Box<dyn DynDigest> {
    match algo {
        Algorithm::Md4 => Box::new(Md4::default()),
        Algorithm::Md5 => Box::new(Md5::default()),
        Algorithm::Sha1 => Box::new(Sha1::default()),
        Algorithm::Sha224 => Box::new(Sha224::default()),
        Algorithm::Sha256 => Box::new(Sha256::default()),
        Algorithm::Sha384 => Box::new(Sha384::default()),
        Algorithm::Sha512 => Box::new(Sha512::default()),
        Algorithm::Ripemd160 => Box::new(Ripemd160::default()),
    }
}

enum Direction {
    Reading,
    Writing,
}

/// Wraps a child stage, digesting every byte that passes through `get` or
/// `put` without altering it. Constructed in one direction (reading or
/// writing) like the file stage, since a single instance only ever drives
/// its child one way.
pub struct HasherStage {
    child: Box<dyn Stage>,
    digest: Box<dyn DynDigest>,
    direction: Direction,
    hex: Option<String>,
}

impl HasherStage {
    pub fn reader(child: Box<dyn Stage>, algo: Algorithm) -> Self {
        HasherStage {
            child,
            digest: new_digest(algo),
            direction: Direction::Reading,
            hex: None,
        }
    }

    pub fn writer(child: Box<dyn Stage>, algo: Algorithm) -> Self {
        HasherStage {
            child,
            digest: new_digest(algo),
            direction: Direction::Writing,
            hex: None,
        }
    }

    fn feed(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let take = bytes.len().min(MAX_UPDATE_CHUNK);
            self.digest.update(&bytes[..take]);
            bytes = &bytes[take..];
        }
    }

    /// Lowercase hex digest. Only populated after a successful `close`.
    pub fn hex_digest(&self) -> Option<&str> {
        self.hex.as_deref()
    }
}

impl Stage for HasherStage {
    fn open(&mut self) -> StageResult<()> {
        self.child.open()
    }

    fn close(&mut self) -> StageResult<()> {
        let child_result = self.child.close();
        if child_result.is_ok() {
            let digest_bytes = self.digest.finalize_reset();
            let mut hex = String::with_capacity(digest_bytes.len() * 2);
            for byte in digest_bytes.iter() {
                hex.push_str(&format!("{byte:02x}"));
            }
            self.hex = Some(hex);
        }
        child_result
    }

    fn get(&mut self, buf: &mut [u8]) -> StageResult<usize> {
        match self.direction {
            Direction::Reading => {
                let n = self.child.get(buf)?;
                self.feed(&buf[..n]);
                Ok(n)
            }
            Direction::Writing => Err(StageError::Protocol(
                "hasher configured as writer cannot get()".into(),
            )),
        }
    }

    fn put(&mut self, buf: &[u8]) -> StageResult<usize> {
        match self.direction {
            Direction::Writing => {
                let n = self.child.put(buf)?;
                self.feed(&buf[..n]);
                Ok(n)
            }
            Direction::Reading => Err(StageError::Protocol(
                "hasher configured as reader cannot put()".into(),
            )),
        }
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
    fn md5_digest_of_known_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hashed.bin");
        let path_str = path.to_str().unwrap().to_string();

        let file_writer = Box::new(FileWriter::new(path_str.clone()));
        let mut writer = HasherStage::writer(file_writer, Algorithm::Md5);
        writer.open().unwrap();
        writer.put(b"abc").unwrap();
        writer.close().unwrap();

        // MD5("abc") per RFC 1321 test vectors.
        assert_eq!(
            writer.hex_digest(),
            Some("900150983cd24fb0d6963f7d28e17f72")
        );
    }

    #[test]
    fn digest_unavailable_before_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hashed2.bin");
        let file_writer = Box::new(FileWriter::new(path.to_str().unwrap().to_string()));
        let mut writer = HasherStage::writer(file_writer, Algorithm::Sha256);
        writer.open().unwrap();
        writer.put(b"data").unwrap();
        assert!(writer.hex_digest().is_none());
    }

    #[test]
    fn reader_direction_digests_read_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("read_me.bin");
        let path_str = path.to_str().unwrap().to_string();

        let mut raw = FileWriter::new(path_str.clone());
        raw.open().unwrap();
        raw.put(b"abc").unwrap();
        raw.close().unwrap();

        let file_reader = Box::new(FileReader::new(path_str));
        let mut reader = HasherStage::reader(file_reader, Algorithm::Md5);
        reader.open().unwrap();
        let mut buf = [0u8; 16];
        reader.get(&mut buf).unwrap();
        reader.close().unwrap();

        assert_eq!(
            reader.hex_digest(),
            Some("900150983cd24fb0d6963f7d28e17f72")
        );
    }
}
