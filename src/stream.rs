use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};

use crate::Error;

macro_rules! generate_read_method {
    ($typ:ty, $size:expr) => {
        paste::item! {
            #[doc = "Reads a little-endian [`" $typ "`] and advances the cursor."]
            pub fn [< read_ $typ >](&mut self) -> Result<$typ, Error> {
                let bytes = self.take($size)?;
                Ok(LittleEndian::[< read_ $typ >](bytes))
            }
        }
    };
}

/// Cursor-based reader over an in-memory buffer.
///
/// Every read is bounds-checked; a read that would pass the end of the
/// buffer fails with [`Error::Format`] and leaves the cursor where it was.
pub struct ByteStream {
    data: Vec<u8>,
    offset: usize,
}

impl ByteStream {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Capacity hint for `count` elements of at least `min_size` bytes
    /// each, clamped by the bytes left in the buffer. A corrupted count
    /// then fails on its first bounds-checked read instead of reserving
    /// the full claimed amount up front.
    pub fn capacity_hint(&self, count: usize, min_size: usize) -> usize {
        count.min(self.remaining() / min_size.max(1))
    }

    pub fn set_offset(&mut self, offset: usize) -> Result<(), Error> {
        if offset > self.data.len() {
            return Err(Error::Format(format!(
                "seek to {offset} exceeds buffer of {} bytes",
                self.data.len()
            )));
        }
        self.offset = offset;
        Ok(())
    }

    /// Advances the cursor over `len` uninterpreted bytes
    /// (transform matrices, padding).
    pub fn skip(&mut self, len: usize) -> Result<(), Error> {
        self.take(len)?;
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&[u8], Error> {
        if len > self.remaining() {
            return Err(Error::Format(format!(
                "read of {len} bytes at offset {} exceeds buffer of {} bytes",
                self.offset,
                self.data.len()
            )));
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, Error> {
        Ok(self.take(1)?[0] as i8)
    }

    generate_read_method!(u16, 2);
    generate_read_method!(u32, 4);
    generate_read_method!(u64, 8);
    generate_read_method!(i16, 2);
    generate_read_method!(i32, 4);
    generate_read_method!(i64, 8);
    generate_read_method!(f32, 4);

    pub fn read_bool8(&mut self) -> Result<bool, Error> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_bool32(&mut self) -> Result<bool, Error> {
        Ok(self.read_u32()? != 0)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, Error> {
        Ok(self.take(len)?.to_vec())
    }

    /// Reads a u32 length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, Error> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Format(format!("invalid UTF-8 string: {e}")))
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct GlobalStripFlags: u8 {
        const EDITOR = 1 << 0;
        const SERVER = 1 << 1;
    }
}

/// Per-section flags marking which optional subsections a binary variant
/// omitted (server/editor/platform builds). Two flag bytes per occurrence:
/// global strips, then class-specific strips.
///
/// Decoders must consult these in the exact order the encoder used; a wrong
/// branch permanently desynchronizes the remainder of the buffer.
#[derive(Debug, Clone, Copy)]
pub struct StripDataFlags {
    global: GlobalStripFlags,
    class_flags: u8,
}

impl StripDataFlags {
    pub fn read(stream: &mut ByteStream) -> Result<Self, Error> {
        let global = GlobalStripFlags::from_bits_retain(stream.read_u8()?);
        let class_flags = stream.read_u8()?;
        Ok(Self {
            global,
            class_flags,
        })
    }

    pub fn is_stripped_for_editor(&self) -> bool {
        self.global.contains(GlobalStripFlags::EDITOR)
    }

    pub fn is_stripped_for_server(&self) -> bool {
        self.global.contains(GlobalStripFlags::SERVER)
    }

    pub fn is_class_data_stripped(&self, bit: u8) -> bool {
        self.class_flags & (1 << bit) != 0
    }
}
