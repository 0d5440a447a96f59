use std::io::{self, Cursor};

use byteorder::{LittleEndian, ReadBytesExt};

/// Size of the logger context stored at the start of the header record.
pub const HEADER_LEN: usize = 20;

/// Logger context the firmware keeps in the first record of the log region.
///
/// All fields are little-endian words as written by the target. Addresses are
/// absolute; `mem_base` is the address of the header record itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogHeader {
    pub mem_base: u32,
    pub mem_start: u32,
    pub mem_end: u32,
    pub curr_offset: u32,
    pub count: u32,
}

impl LogHeader {
    pub fn decode(data: &[u8]) -> io::Result<LogHeader> {
        if data.len() < HEADER_LEN {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("Header too short: {} of {} bytes", data.len(), HEADER_LEN),
            ));
        }

        let mut cursor = Cursor::new(data);
        Ok(LogHeader {
            mem_base: cursor.read_u32::<LittleEndian>()?,
            mem_start: cursor.read_u32::<LittleEndian>()?,
            mem_end: cursor.read_u32::<LittleEndian>()?,
            curr_offset: cursor.read_u32::<LittleEndian>()?,
            count: cursor.read_u32::<LittleEndian>()?,
        })
    }

    /// True for a wiped (0xFF) or never written (0x00) context.
    pub fn is_uninitialised(&self) -> bool {
        let words = [
            self.mem_base,
            self.mem_start,
            self.mem_end,
            self.curr_offset,
            self.count,
        ];
        words.iter().all(|&w| w == u32::MAX) || words.iter().all(|&w| w == 0)
    }

    /// Record index of `addr` within the dump, if it points at a record boundary.
    pub fn slot_of(&self, addr: u32, record_len: usize) -> Option<u64> {
        let rel = u64::from(addr.checked_sub(self.mem_base)?);
        let record_len = record_len as u64;

        if record_len == 0 || rel % record_len != 0 {
            return None;
        }
        Some(rel / record_len)
    }

    /// Slot the firmware writes its next message to.
    pub fn next_slot(&self, record_len: usize) -> Option<u64> {
        self.slot_of(self.curr_offset, record_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_bytes(words: [u32; 5]) -> Vec<u8> {
        let mut data: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        data.resize(128, 0xFF);
        data
    }

    #[test]
    fn decodes_little_endian_context() {
        let data = context_bytes([0x2000_0000, 0x2000_0080, 0x2000_4000, 0x2000_0180, 3]);
        let header = LogHeader::decode(&data).unwrap();

        assert_eq!(header.mem_base, 0x2000_0000);
        assert_eq!(header.mem_start, 0x2000_0080);
        assert_eq!(header.mem_end, 0x2000_4000);
        assert_eq!(header.curr_offset, 0x2000_0180);
        assert_eq!(header.count, 3);
        assert!(!header.is_uninitialised());
        assert_eq!(header.next_slot(128), Some(3));
    }

    #[test]
    fn wiped_context_is_uninitialised() {
        let header = LogHeader::decode(&[0xFF; 128]).unwrap();
        assert!(header.is_uninitialised());

        let header = LogHeader::decode(&[0x00; 20]).unwrap();
        assert!(header.is_uninitialised());
    }

    #[test]
    fn short_header_is_rejected() {
        let err = LogHeader::decode(&[0u8; 19]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn misaligned_or_foreign_address_has_no_slot() {
        let header = LogHeader::decode(&context_bytes([0x1000, 0x1080, 0x2000, 0x1100, 0])).unwrap();

        assert_eq!(header.slot_of(0x1100, 128), Some(2));
        assert_eq!(header.slot_of(0x1101, 128), None);
        assert_eq!(header.slot_of(0x0F00, 128), None);
    }
}
