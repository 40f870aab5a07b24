use super::name::{parse_labels, push_label, MAX_NAME_LEN};
use super::{DecodeError, EncodeError};
use rustc_hash::FxHashMap;

/// Upper bound on compression pointers followed while reading one name.
pub const MAX_POINTER_HOPS: usize = 128;

const POINTER_MASK: u8 = 0xC0;
const MAX_POINTER_OFFSET: usize = 0x3FFF;

/// Bounds-checked cursor over a received message.
pub struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn seek(&mut self, pos: usize) -> Result<(), DecodeError> {
        if pos > self.buf.len() {
            return Err(DecodeError::Truncated);
        }
        self.pos = pos;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let b = *self.buf.get(self.pos).ok_or(DecodeError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError::Truncated)?;
        let slice = self.buf.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    /// Reads a possibly compressed name.
    ///
    /// Pointers must refer to an earlier offset than the pointer itself and at most
    /// [`MAX_POINTER_HOPS`] of them are followed, so crafted loops end in
    /// `BadPointer` instead of spinning.
    pub fn read_name(&mut self) -> Result<String, DecodeError> {
        let mut pos = self.pos;
        let mut jumped = false;
        let mut hops = 0;
        let mut wire_len = 1;
        let mut name = String::new();

        loop {
            let len = *self.buf.get(pos).ok_or(DecodeError::Truncated)?;

            match len & POINTER_MASK {
                POINTER_MASK => {
                    let low = *self.buf.get(pos + 1).ok_or(DecodeError::Truncated)?;
                    let offset = (((len & !POINTER_MASK) as usize) << 8) | low as usize;

                    if !jumped {
                        self.pos = pos + 2;
                    }
                    hops += 1;
                    if hops > MAX_POINTER_HOPS || offset >= pos {
                        return Err(DecodeError::BadPointer);
                    }

                    pos = offset;
                    jumped = true;
                }
                0x00 => {
                    pos += 1;
                    if len == 0 {
                        break;
                    }

                    let len = len as usize;
                    wire_len += len + 1;
                    if wire_len > MAX_NAME_LEN {
                        return Err(DecodeError::NameTooLong);
                    }

                    let label = self.buf.get(pos..pos + len).ok_or(DecodeError::Truncated)?;
                    if !name.is_empty() {
                        name.push('.');
                    }
                    push_label(&mut name, label);
                    pos += len;
                }
                _ => return Err(DecodeError::LabelTooLong),
            }
        }

        if !jumped {
            self.pos = pos;
        }

        Ok(name)
    }
}

/// Growable output buffer with name compression.
#[derive(Default)]
pub struct PacketWriter {
    buf: Vec<u8>,
    names: FxHashMap<Vec<u8>, u16>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::with_capacity(512)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            names: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Overwrites two bytes written earlier, used for RDLENGTH back-patching.
    pub fn set_u16(&mut self, pos: usize, value: u16) {
        if let Some(slot) = self.buf.get_mut(pos..pos + 2) {
            slot.copy_from_slice(&value.to_be_bytes());
        }
    }

    /// Writes `name`, reusing a previously written suffix when `compress` is set.
    pub fn write_name(&mut self, name: &str, compress: bool) -> Result<(), EncodeError> {
        let labels = parse_labels(name)?;

        for i in 0..labels.len() {
            let key = suffix_key(&labels[i..]);

            if compress {
                if let Some(&offset) = self.names.get(&key) {
                    self.write_u16(0xC000 | offset);
                    return Ok(());
                }
            }

            let here = self.buf.len();
            if here <= MAX_POINTER_OFFSET {
                self.names.entry(key).or_insert(here as u16);
            }

            self.write_u8(labels[i].len() as u8);
            self.write_bytes(&labels[i]);
        }

        self.write_u8(0);
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

fn suffix_key(labels: &[Vec<u8>]) -> Vec<u8> {
    let mut key = Vec::new();
    for label in labels {
        key.push(label.len() as u8);
        key.extend(label.iter().map(|b| b.to_ascii_lowercase()));
    }
    key
}
