//! Tag-length-value framing over any [`crate::stage::Stage`].
//!
//! Grounded on `src/tlv.cpp` / `include/tlv.h` — specifically the newer
//! u16-tag copy of that header with `start`/`check`/`end`/`error` framing
//! (as opposed to the older `base/include/tlv.h`, which has no u16 tags and
//! no `check` frame). The reserved tag values below match that newer
//! header exactly, and match the governing specification's reserved range.
//! `Sender`/`Receiver` drive a stage through its `put`/`get` methods rather
//! than `std::io::{Read, Write}`, so framing works over any stage in this
//! crate — a file, a socket, or a chain ending in either.

use crate::error::{StageError, StageResult};
use crate::stage::Stage;

pub const START_TAG: u16 = 65530;
pub const CHECK_TAG: u16 = 65531;
pub const END_TAG: u16 = 65532;
pub const ERROR_TAG: u16 = 65533;

/// Tags from here up are reserved for framed log-line carriage; user tags
/// must be strictly below this.
pub const LOG_RANGE_START: u16 = 65520;
pub const LOG_RANGE_END: u16 = 65529;

pub const MAX_VALUE_LEN: usize = 0xffff;

/// `Sender`'s lifecycle. A message is `Idle` until `start()`, `Open` while
/// data/check frames may be written, and `Ended` once `end()`/`error()` has
/// closed it; `Failed` is sticky and terminal like the original's `_status`
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SenderState {
    Idle,
    Open,
    Ended,
    Failed,
}

/// Writes TLV frames onto a child stage, enforcing `start` → (`write`|
/// `check`)* → (`end`|`error`) ordering. Once a send fails or the message
/// ends, every subsequent call is rejected with a protocol error.
pub struct Sender<'a> {
    stage: &'a mut dyn Stage,
    state: SenderState,
}

impl<'a> Sender<'a> {
    pub fn new(stage: &'a mut dyn Stage) -> Self {
        Sender {
            stage,
            state: SenderState::Idle,
        }
    }

    pub fn failed(&self) -> bool {
        self.state == SenderState::Failed
    }

    fn emit(&mut self, tag: u16, value: &[u8]) -> StageResult<()> {
        if self.state == SenderState::Failed {
            return Err(StageError::Protocol("sender already failed".into()));
        }
        if value.len() > MAX_VALUE_LEN {
            self.state = SenderState::Failed;
            return Err(StageError::Protocol("tlv value too long".into()));
        }
        let result = (|| -> StageResult<()> {
            self.stage.put(&tag.to_be_bytes())?;
            self.stage.put(&(value.len() as u16).to_be_bytes())?;
            if !value.is_empty() {
                self.stage.put(value)?;
            }
            Ok(())
        })();
        if result.is_err() {
            self.state = SenderState::Failed;
        }
        result
    }

    /// Begin a message. Only valid from `Idle`.
    pub fn start(&mut self) -> StageResult<()> {
        if self.state != SenderState::Idle {
            self.state = SenderState::Failed;
            return Err(StageError::Protocol(
                "start() called out of order".into(),
            ));
        }
        self.emit(START_TAG, &[])?;
        self.state = SenderState::Open;
        Ok(())
    }

    /// Write a user data frame. `tag` must be strictly below
    /// [`LOG_RANGE_START`], and the message must currently be open.
    pub fn write(&mut self, tag: u16, value: &[u8]) -> StageResult<()> {
        if self.state != SenderState::Open {
            self.state = SenderState::Failed;
            return Err(StageError::Protocol(
                "write() called before start() or after end()".into(),
            ));
        }
        if tag >= LOG_RANGE_START {
            self.state = SenderState::Failed;
            return Err(StageError::Protocol(
                "user tags must be below the reserved range".into(),
            ));
        }
        self.emit(tag, value)
    }

    /// Convenience: format `n` as ASCII decimal and write it as `tag`'s
    /// value, mirroring the original's numeric `write()` overload (used to
    /// carry an errno-style payload in an `error` frame).
    pub fn write_i32(&mut self, tag: u16, n: i32) -> StageResult<()> {
        self.write(tag, n.to_string().as_bytes())
    }

    /// A liveness/resync frame, distinct from `start`/`end`/`error`. Only
    /// valid while the message is open.
    pub fn check(&mut self) -> StageResult<()> {
        if self.state != SenderState::Open {
            self.state = SenderState::Failed;
            return Err(StageError::Protocol(
                "check() called before start() or after end()".into(),
            ));
        }
        self.emit(CHECK_TAG, &[])
    }

    /// End the message. Only valid while open; returns an error if the
    /// sender had already latched a failure or already ended.
    pub fn end(&mut self) -> StageResult<()> {
        if self.state != SenderState::Open {
            let was_failed = self.state == SenderState::Failed;
            self.state = SenderState::Failed;
            return Err(StageError::Protocol(if was_failed {
                "sender already failed".into()
            } else {
                "end() called before start() or after end()".into()
            }));
        }
        self.emit(END_TAG, &[])?;
        self.state = SenderState::Ended;
        Ok(())
    }

    /// Abort the message with an application-supplied error code. Only
    /// valid while open.
    pub fn error(&mut self, code: i32) -> StageResult<()> {
        if self.state != SenderState::Open {
            self.state = SenderState::Failed;
            return Err(StageError::Protocol(
                "error() called before start() or after end()".into(),
            ));
        }
        self.emit(ERROR_TAG, code.to_string().as_bytes())?;
        self.state = SenderState::Ended;
        Ok(())
    }
}

/// Classification of a received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Start,
    Check,
    Data { tag: u16, value: Vec<u8> },
    End,
    Error { value: Vec<u8> },
}

/// Reads TLV frames from a child stage.
pub struct Receiver<'a> {
    stage: &'a mut dyn Stage,
}

impl<'a> Receiver<'a> {
    pub fn new(stage: &'a mut dyn Stage) -> Self {
        Receiver { stage }
    }

    /// Read exactly one frame. A short header or value read is reported as
    /// `Frame::Error` with a descriptive payload, matching the original's
    /// behavior of synthesizing an error string on truncated input rather
    /// than returning a raw I/O failure.
    pub fn receive(&mut self) -> StageResult<Frame> {
        let mut header = [0u8; 4];
        match self.stage.get(&mut header) {
            Ok(4) => {}
            Ok(n) => {
                return Ok(Frame::Error {
                    value: format!("short header read: got {n} of 4 bytes").into_bytes(),
                })
            }
            Err(e) => {
                return Ok(Frame::Error {
                    value: format!("short header read: {e}").into_bytes(),
                })
            }
        }
        let tag = u16::from_be_bytes([header[0], header[1]]);
        let len = u16::from_be_bytes([header[2], header[3]]) as usize;

        let mut value = vec![0u8; len];
        if len > 0 {
            match self.stage.get(&mut value) {
                Ok(n) if n == len => {}
                Ok(n) => {
                    return Ok(Frame::Error {
                        value: format!("short value read: got {n} of {len} bytes").into_bytes(),
                    })
                }
                Err(e) => {
                    return Ok(Frame::Error {
                        value: format!("short value read: {e}").into_bytes(),
                    })
                }
            }
        }

        Ok(match tag {
            START_TAG => Frame::Start,
            CHECK_TAG => Frame::Check,
            END_TAG => Frame::End,
            ERROR_TAG => Frame::Error { value },
            _ => Frame::Data { tag, value },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::file::{FileReader, FileWriter};
    use tempfile::tempdir;

    #[test]
    fn start_data_check_end_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frames.bin").to_str().unwrap().to_string();

        let mut writer = FileWriter::new(path.clone());
        writer.open().unwrap();
        {
            let mut sender = Sender::new(&mut writer);
            sender.start().unwrap();
            sender.write(1, b"").unwrap();
            sender.check().unwrap();
            sender
                .write(0x12, b"I am not a stupid protocol!")
                .unwrap();
            sender.end().unwrap();
        }
        writer.close().unwrap();

        let mut reader = FileReader::new(path);
        reader.open().unwrap();
        let mut receiver = Receiver::new(&mut reader);
        assert_eq!(receiver.receive().unwrap(), Frame::Start);
        assert_eq!(
            receiver.receive().unwrap(),
            Frame::Data {
                tag: 1,
                value: vec![]
            }
        );
        assert_eq!(receiver.receive().unwrap(), Frame::Check);
        assert_eq!(
            receiver.receive().unwrap(),
            Frame::Data {
                tag: 0x12,
                value: b"I am not a stupid protocol!".to_vec()
            }
        );
        assert_eq!(receiver.receive().unwrap(), Frame::End);
    }

    #[test]
    fn write_rejects_reserved_tag_range() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.bin").to_str().unwrap().to_string();
        let mut writer = FileWriter::new(path);
        writer.open().unwrap();
        let mut sender = Sender::new(&mut writer);
        sender.start().unwrap();
        assert!(sender.write(LOG_RANGE_START, b"x").is_err());
        assert!(sender.failed());
    }

    #[test]
    fn oversized_value_latches_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("y.bin").to_str().unwrap().to_string();
        let mut writer = FileWriter::new(path);
        writer.open().unwrap();
        let mut sender = Sender::new(&mut writer);
        sender.start().unwrap();
        let too_big = vec![0u8; MAX_VALUE_LEN + 1];
        assert!(sender.write(5, &too_big).is_err());
        assert!(sender.failed());
        assert!(sender.end().is_err());
    }

    #[test]
    fn write_before_start_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("w.bin").to_str().unwrap().to_string();
        let mut writer = FileWriter::new(path);
        writer.open().unwrap();
        let mut sender = Sender::new(&mut writer);
        assert!(sender.write(1, b"x").is_err());
        assert!(sender.failed());
    }

    #[test]
    fn write_after_end_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("w2.bin").to_str().unwrap().to_string();
        let mut writer = FileWriter::new(path);
        writer.open().unwrap();
        let mut sender = Sender::new(&mut writer);
        sender.start().unwrap();
        sender.end().unwrap();
        assert!(sender.write(1, b"x").is_err());
        assert!(sender.failed());
    }

    #[test]
    fn error_frame_carries_numeric_payload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("z.bin").to_str().unwrap().to_string();
        let mut writer = FileWriter::new(path.clone());
        writer.open().unwrap();
        {
            let mut sender = Sender::new(&mut writer);
            sender.start().unwrap();
            sender.error(-5).unwrap();
        }
        writer.close().unwrap();

        let mut reader = FileReader::new(path);
        reader.open().unwrap();
        let mut receiver = Receiver::new(&mut reader);
        assert_eq!(receiver.receive().unwrap(), Frame::Start);
        assert_eq!(
            receiver.receive().unwrap(),
            Frame::Error {
                value: b"-5".to_vec()
            }
        );
    }
}
