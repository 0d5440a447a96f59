use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use log::{debug, warn};

use crate::header::{HEADER_LEN, LogHeader};
use crate::utils;

pub const DEFAULT_LOG_PATH: &str = "out.bin";
pub const RECORD_LEN: usize = 128;
pub const ID_LEN: usize = 4;
pub const HEADER_RECORDS: usize = 1;
pub const EMPTY_SENTINEL: u8 = 0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RecordOrder {
    /// Ascending file offset.
    #[default]
    File,
    /// Ascending sequence number, undoes a ring buffer wrap.
    Sequence,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanConfig {
    pub record_len: usize,
    /// Fail on a trailing partial record instead of ignoring it.
    pub strict: bool,
    pub order: RecordOrder,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            record_len: RECORD_LEN,
            strict: false,
            order: RecordOrder::File,
        }
    }
}

pub struct Record {
    pub offset: usize,
    pub id: u32,
    /// Whole text field, padding included.
    pub text: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrailingBytes {
    pub offset: usize,
    pub len: usize,
}

pub struct MemLogFile {
    pub header: Option<LogHeader>,
    pub records: Vec<Record>,
    pub record_len: usize,
    /// Full record slots after the header, empty ones included.
    pub slots: usize,
    pub empty_slots: usize,
    pub trailing: Option<TrailingBytes>,
}

pub fn parse_file(file_path: impl AsRef<Path>, config: &ScanConfig) -> io::Result<MemLogFile> {
    check_config(config)?;

    let file = File::open(file_path)?;
    let mut reader = BufReader::new(file);
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;

    parse_bytes(&data, config)
}

pub fn parse_bytes(data: &[u8], config: &ScanConfig) -> io::Result<MemLogFile> {
    check_config(config)?;
    let record_len = config.record_len;

    let header = if record_len >= HEADER_LEN && data.len() >= HEADER_LEN {
        Some(LogHeader::decode(&data[..HEADER_LEN])?)
    } else {
        None
    };

    let mut records = Vec::new();
    let mut slots = 0;
    let mut empty_slots = 0;
    let mut trailing = None;

    let mut offset = record_len * HEADER_RECORDS;
    while offset < data.len() {
        let Some(window) = data.get(offset..offset + record_len) else {
            let len = data.len() - offset;
            if config.strict {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "Truncated record at offset {}: {} of {} bytes",
                        offset, len, record_len
                    ),
                ));
            }
            warn!(
                "ignoring {} trailing bytes at offset {} (record length {})",
                len, offset, record_len
            );
            trailing = Some(TrailingBytes { offset, len });
            break;
        };

        slots += 1;
        match read_record(window, offset)? {
            Some(record) => records.push(record),
            None => {
                debug!("slot at offset {} is empty", offset);
                empty_slots += 1;
            }
        }

        offset += record_len;
    }

    if config.order == RecordOrder::Sequence {
        records.sort_by_key(|record| record.id);
    }

    debug!(
        "scanned {} slots: {} populated, {} empty",
        slots,
        records.len(),
        empty_slots
    );

    Ok(MemLogFile {
        header,
        records,
        record_len,
        slots,
        empty_slots,
        trailing,
    })
}

fn check_config(config: &ScanConfig) -> io::Result<()> {
    if config.record_len <= ID_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Record length {} leaves no room for text after the {}-byte id",
                config.record_len, ID_LEN
            ),
        ));
    }
    Ok(())
}

/// Decode one record window; `None` for an empty slot.
pub fn read_record(window: &[u8], offset: usize) -> io::Result<Option<Record>> {
    if window.len() <= ID_LEN {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("Record at offset {} too short: {} bytes", offset, window.len()),
        ));
    }

    let text = &window[ID_LEN..];
    if text[0] == EMPTY_SENTINEL {
        return Ok(None);
    }

    let mut cursor = Cursor::new(window);
    let id = cursor.read_u32::<BigEndian>()?;

    Ok(Some(Record {
        offset,
        id,
        text: text.to_vec(),
    }))
}

pub mod display {
    use super::*;
    use std::io::Write;

    /// `<id> : <text>` per record, text bytes written verbatim.
    pub fn write_raw(out: &mut impl Write, log: &MemLogFile) -> io::Result<()> {
        for record in &log.records {
            write!(out, "{} : ", record.id)?;
            out.write_all(&record.text)?;
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn print_raw(log: &MemLogFile) -> io::Result<()> {
        let mut out = io::stdout().lock();
        write_raw(&mut out, log)?;
        out.flush()
    }

    pub fn write_details(out: &mut impl Write, log: &MemLogFile) -> io::Result<()> {
        writeln!(out, "------------------- Header -------------------")?;
        match &log.header {
            Some(header) => write_header(out, header, log.record_len)?,
            None => writeln!(out, "(missing)")?,
        }

        writeln!(out, "------------------- Summary ------------------")?;
        writeln!(out, "Record-Length: {} Bytes", log.record_len)?;
        writeln!(
            out,
            "Slots: {} (populated: {}, empty: {})",
            log.slots,
            log.records.len(),
            log.empty_slots
        )?;
        if let Some(trailing) = &log.trailing {
            writeln!(
                out,
                "Trailing: {} Bytes at offset {} (ignored)",
                trailing.len, trailing.offset
            )?;
        }

        writeln!(out, "------------------- Records ------------------")?;
        for record in &log.records {
            writeln!(
                out,
                "[{:>8}] #{}: {}",
                record.offset,
                record.id,
                utils::bytes_to_ascii(utils::until_nul(&record.text))
            )?;
        }

        Ok(())
    }

    fn write_header(out: &mut impl Write, header: &LogHeader, record_len: usize) -> io::Result<()> {
        if header.is_uninitialised() {
            writeln!(out, "(uninitialised)")?;
            return Ok(());
        }

        writeln!(out, "Base: {:#010X}", header.mem_base)?;
        writeln!(out, "Start: {:#010X}", header.mem_start)?;
        writeln!(out, "End: {:#010X}", header.mem_end)?;
        match header.next_slot(record_len) {
            Some(slot) => writeln!(out, "Current: {:#010X} (slot {})", header.curr_offset, slot)?,
            None => writeln!(out, "Current: {:#010X} (not a slot)", header.curr_offset)?,
        }
        writeln!(out, "Count: {}", header.count)
    }

    pub fn print_all(log: &MemLogFile) -> io::Result<()> {
        let mut out = io::stdout().lock();
        write_details(&mut out, log)?;
        out.flush()
    }

    pub fn print_csv(log: &MemLogFile, filename: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(export::csv_string(log, filename).as_bytes())?;
        out.flush()
    }
}

pub mod export {
    use super::*;

    pub fn csv_string(log: &MemLogFile, filename: &str) -> String {
        let mut csv = String::from("\"Id\",\"Offset\",\"Msg\",\"File\"\n");

        for record in &log.records {
            let message = utils::bytes_to_utf8_lossy(utils::until_nul(&record.text))
                .replace('"', "\"\""); // escape quotes for CSV
            csv.push_str(&format!(
                "\"{}\",\"{}\",\"{}\",\"{}\"\n",
                record.id, record.offset, message, filename
            ));
        }

        csv
    }
}
