//! `.sigmf` archives: a POSIX ustar file holding `{dir}/{name}.sigmf-meta` and
//! `{dir}/{name}.sigmf-data` pairs.
//!
//! Only the subset of TAR needed for this is handled. Regular files are read, directories and
//! other entry types are skipped, and long paths may come from the ustar `prefix` field, a GNU
//! `L` entry or a PAX `path` record.
//!
//! [`stream_archive`] has the shape of a lazy reader, but reads the whole archive on the first
//! pull. Entries can only be paired once both halves are seen and TAR has no index, so memory
//! use is bounded by the archive size.

use crate::metadata::{MetadataError, Recording};
use log::{debug, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::io::{self, ErrorKind, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const BLOCK_SIZE: usize = 512;
pub const META_EXT: &str = ".sigmf-meta";
pub const DATA_EXT: &str = ".sigmf-data";
pub const ARCHIVE_EXT: &str = ".sigmf";
pub const MIME_TYPE: &str = "application/x-tar";

const NAME_LEN: usize = 100;
const PREFIX_LEN: usize = 155;
const REGULAR: u8 = b'0';
const GNU_LONG_NAME: u8 = b'L';
const PAX_HEADER: u8 = b'x';

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Unexpected EOF while reading archive")]
    UnexpectedEof,
    #[error("Header checksum mismatch for {path:?}")]
    BadChecksum { path: String },
    #[error("Malformed {0} in archive header")]
    Malformed(&'static str),
    #[error("Path {0:?} does not fit in a ustar header")]
    PathTooLong(String),
    #[error("File {0:?} is too large for a ustar header")]
    FileTooLarge(String),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("Reader I/O error while handling archive")]
    Io(#[source] io::Error),
}

impl From<io::Error> for ArchiveError {
    fn from(e: io::Error) -> Self {
        if e.kind() == ErrorKind::UnexpectedEof {
            ArchiveError::UnexpectedEof
        } else {
            ArchiveError::Io(e)
        }
    }
}

/// One recording of an archive.
#[derive(Clone, Debug, PartialEq)]
pub struct ArchiveEntry {
    /// Base name, without directory or extension.
    pub name: String,
    pub metadata: Recording,
    /// Empty for metadata-only recordings.
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, metadata: Recording, data: Vec<u8>) -> Self {
        ArchiveEntry {
            name: name.into(),
            metadata,
            data,
        }
    }
}

struct Header {
    path: String,
    size: u64,
    kind: u8,
}

fn c_string(field: &[u8]) -> String {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Octal ASCII padded with NULs or spaces, or GNU base-256 when the high bit is set.
fn parse_number(field: &[u8], what: &'static str) -> Result<u64, ArchiveError> {
    if field.first().is_some_and(|b| b & 0x80 != 0) {
        let mut value: u64 = (field[0] & 0x7f) as u64;
        for b in &field[1..] {
            value = value
                .checked_mul(256)
                .and_then(|v| v.checked_add(*b as u64))
                .ok_or(ArchiveError::Malformed(what))?;
        }
        return Ok(value);
    }

    let text = std::str::from_utf8(field).map_err(|_| ArchiveError::Malformed(what))?;
    let text = text.trim_matches(|c| c == '\0' || c == ' ');
    if text.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(text, 8).map_err(|_| ArchiveError::Malformed(what))
}

fn checksum(block: &[u8; BLOCK_SIZE]) -> u64 {
    block
        .iter()
        .enumerate()
        .map(|(i, b)| if (148..156).contains(&i) { b' ' as u64 } else { *b as u64 })
        .sum()
}

/// Old writers summed signed bytes, both sums are accepted.
fn signed_checksum(block: &[u8; BLOCK_SIZE]) -> i64 {
    block
        .iter()
        .enumerate()
        .map(|(i, b)| if (148..156).contains(&i) { b' ' as i64 } else { *b as i8 as i64 })
        .sum()
}

fn parse_header(block: &[u8; BLOCK_SIZE]) -> Result<Header, ArchiveError> {
    let name = c_string(&block[0..NAME_LEN]);
    let prefix = c_string(&block[345..345 + PREFIX_LEN]);
    let path = if prefix.is_empty() {
        name
    } else {
        format!("{prefix}/{name}")
    };

    let stored = parse_number(&block[148..156], "checksum")?;
    if stored != checksum(block) && stored as i64 != signed_checksum(block) {
        return Err(ArchiveError::BadChecksum { path });
    }

    Ok(Header {
        size: parse_number(&block[124..136], "size")?,
        kind: block[156],
        path,
    })
}

/// Fills `block`, returning false on a clean end of input before its first byte.
fn read_block<R: Read>(reader: &mut R, block: &mut [u8; BLOCK_SIZE]) -> Result<bool, ArchiveError> {
    let mut filled = 0;
    while filled < BLOCK_SIZE {
        match reader.read(&mut block[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(ArchiveError::UnexpectedEof),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

fn padding(size: u64) -> u64 {
    (BLOCK_SIZE as u64 - size % BLOCK_SIZE as u64) % BLOCK_SIZE as u64
}

/// Reads `size` content bytes and the padding after them.
fn read_content<R: Read>(reader: &mut R, size: u64) -> Result<Vec<u8>, ArchiveError> {
    let mut content = Vec::new();
    let n = reader.by_ref().take(size).read_to_end(&mut content)?;
    if (n as u64) < size {
        return Err(ArchiveError::UnexpectedEof);
    }
    skip(reader, padding(size))?;
    Ok(content)
}

fn skip<R: Read>(reader: &mut R, len: u64) -> Result<(), ArchiveError> {
    let skipped = io::copy(&mut reader.by_ref().take(len), &mut io::sink())?;
    if skipped < len {
        return Err(ArchiveError::UnexpectedEof);
    }
    Ok(())
}

/// `path` value of PAX extended header records (`"<len> <key>=<value>\n"`).
fn pax_path(records: &[u8]) -> Result<Option<String>, ArchiveError> {
    let mut rest = records;
    let mut path = None;
    while !rest.is_empty() {
        let space = rest
            .iter()
            .position(|b| *b == b' ')
            .ok_or(ArchiveError::Malformed("PAX record"))?;
        let len: usize = std::str::from_utf8(&rest[..space])
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|len| *len > space && *len <= rest.len())
            .ok_or(ArchiveError::Malformed("PAX record"))?;

        let record = &rest[space + 1..len];
        let record = record.strip_suffix(b"\n").unwrap_or(record);
        if let Some(value) = record.strip_prefix(b"path=") {
            path = Some(String::from_utf8_lossy(value).into_owned());
        }
        rest = &rest[len..];
    }
    Ok(path)
}

/// Drops the archive's top-level directory: `dir/name.sigmf-meta` becomes `name.sigmf-meta`.
fn strip_dir(path: &str) -> &str {
    path.split_once('/').map_or(path, |(_, rest)| rest)
}

/// Reads every recording of a `.sigmf` archive, in the order their metadata files appear.
///
/// Data files are matched to metadata files by base name. A metadata file without data gives
/// an entry with empty data; a data file without metadata is dropped.
pub fn read_archive<R: Read>(mut source: R) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    let mut metas: Vec<(String, Recording)> = Vec::new();
    let mut datas: HashMap<String, Vec<u8>> = HashMap::new();
    let mut long_path: Option<String> = None;
    let mut block = [0u8; BLOCK_SIZE];

    while read_block(&mut source, &mut block)? {
        if block.iter().all(|b| *b == 0) {
            break;
        }

        let header = parse_header(&block)?;
        match header.kind {
            GNU_LONG_NAME => {
                let content = read_content(&mut source, header.size)?;
                long_path = Some(c_string(&content));
                continue;
            }
            PAX_HEADER => {
                let content = read_content(&mut source, header.size)?;
                if let Some(path) = pax_path(&content)? {
                    long_path = Some(path);
                }
                continue;
            }
            REGULAR | 0 => {}
            other => {
                debug!("Skipping archive entry {:?} of type {:?}", header.path, other as char);
                let len = header
                    .size
                    .checked_add(padding(header.size))
                    .ok_or(ArchiveError::Malformed("size"))?;
                skip(&mut source, len)?;
                long_path = None;
                continue;
            }
        }

        let path = long_path.take().unwrap_or(header.path);
        let content = read_content(&mut source, header.size)?;
        let name = strip_dir(&path);
        debug!("Read {} ({} bytes) from archive", path, content.len());

        if let Some(base) = name.strip_suffix(META_EXT) {
            let document: Value = serde_json::from_slice(&content).map_err(MetadataError::from)?;
            metas.push((base.to_string(), Recording::from_value(document)?));
        } else if let Some(base) = name.strip_suffix(DATA_EXT) {
            datas.insert(base.to_string(), content);
        } else {
            debug!("Ignoring {path}, not part of a recording");
        }
    }

    let entries: Vec<ArchiveEntry> = metas
        .into_iter()
        .map(|(name, metadata)| {
            let data = datas.remove(&name).unwrap_or_default();
            ArchiveEntry {
                name,
                metadata,
                data,
            }
        })
        .collect();

    for name in datas.keys() {
        warn!("Dropping {name}{DATA_EXT}, the archive has no metadata for it");
    }
    Ok(entries)
}

pub fn read_archive_bytes(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    read_archive(bytes)
}

/// Lazily started iteration over the recordings of an archive. See the module docs for why
/// the whole archive is parsed on the first call to `next`.
pub struct ArchiveStream<R: Read> {
    source: Option<R>,
    entries: std::vec::IntoIter<ArchiveEntry>,
}

impl<R: Read> Iterator for ArchiveStream<R> {
    type Item = Result<ArchiveEntry, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(source) = self.source.take() {
            match read_archive(source) {
                Ok(entries) => self.entries = entries.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
        self.entries.next().map(Ok)
    }
}

pub fn stream_archive<R: Read>(source: R) -> ArchiveStream<R> {
    ArchiveStream {
        source: Some(source),
        entries: Vec::new().into_iter(),
    }
}

/// Writes `value` as zero padded octal followed by a NUL. False if it does not fit.
fn write_octal(field: &mut [u8], value: u64) -> bool {
    let digits = field.len() - 1;
    let text = format!("{value:0digits$o}");
    if text.len() > digits {
        return false;
    }
    field[..digits].copy_from_slice(text.as_bytes());
    field[digits] = 0;
    true
}

/// Splits `path` into ustar `(prefix, name)`, preferring the plain name field.
fn split_path(path: &str) -> Result<(&str, &str), ArchiveError> {
    if path.len() <= NAME_LEN {
        return Ok(("", path));
    }
    path.match_indices('/')
        .map(|(i, _)| (&path[..i], &path[i + 1..]))
        .filter(|(prefix, name)| {
            prefix.len() <= PREFIX_LEN && !name.is_empty() && name.len() <= NAME_LEN
        })
        .next_back()
        .ok_or_else(|| ArchiveError::PathTooLong(path.to_string()))
}

fn build_header(
    path: &str,
    size: u64,
    mtime: u64,
    kind: u8,
) -> Result<[u8; BLOCK_SIZE], ArchiveError> {
    let (prefix, name) = split_path(path)?;
    let mut block = [0u8; BLOCK_SIZE];

    block[..name.len()].copy_from_slice(name.as_bytes());
    write_octal(&mut block[100..108], 0o644);
    write_octal(&mut block[108..116], 0);
    write_octal(&mut block[116..124], 0);
    if !write_octal(&mut block[124..136], size) {
        return Err(ArchiveError::FileTooLarge(path.to_string()));
    }
    if !write_octal(&mut block[136..148], mtime) {
        return Err(ArchiveError::Malformed("modification time"));
    }
    block[156] = kind;
    block[257..263].copy_from_slice(b"ustar\0");
    block[263..265].copy_from_slice(b"00");
    block[345..345 + prefix.len()].copy_from_slice(prefix.as_bytes());

    let sum = format!("{:06o}\0 ", checksum(&block));
    block[148..156].copy_from_slice(sum.as_bytes());
    Ok(block)
}

/// Incremental `.sigmf` archive writer over any `Write`.
pub struct ArchiveWriter<W: Write> {
    writer: W,
    dir: String,
    mtime: u64,
}

impl<W: Write> ArchiveWriter<W> {
    /// Files are placed under `dir/`.
    pub fn new(writer: W, dir: impl Into<String>) -> Self {
        let mtime = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        ArchiveWriter {
            writer,
            dir: dir.into(),
            mtime,
        }
    }

    pub fn with_mtime(mut self, mtime: u64) -> Self {
        self.mtime = mtime;
        self
    }

    fn append_raw(
        &mut self,
        file_name: &str,
        kind: u8,
        content: &[u8],
    ) -> Result<(), ArchiveError> {
        let path = if self.dir.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.dir, file_name)
        };
        let header = build_header(&path, content.len() as u64, self.mtime, kind)?;
        self.writer.write_all(&header)?;
        self.writer.write_all(content)?;
        let pad = padding(content.len() as u64) as usize;
        self.writer.write_all(&[0u8; BLOCK_SIZE][..pad])?;
        debug!("Wrote {} ({} bytes) to archive", path, content.len());
        Ok(())
    }

    /// Adds a regular file named `file_name` inside the archive directory.
    pub fn append_file(&mut self, file_name: &str, content: &[u8]) -> Result<(), ArchiveError> {
        self.append_raw(file_name, REGULAR, content)
    }

    /// Adds the metadata file, pretty printed, followed by the data file, even if empty.
    pub fn append_entry(&mut self, entry: &ArchiveEntry) -> Result<(), ArchiveError> {
        let meta = entry.metadata.to_json(true)?;
        self.append_file(&format!("{}{META_EXT}", entry.name), meta.as_bytes())?;
        self.append_file(&format!("{}{DATA_EXT}", entry.name), &entry.data)
    }

    /// Writes the two terminating zero blocks and hands back the writer.
    pub fn finish(mut self) -> Result<W, ArchiveError> {
        self.writer.write_all(&[0u8; 2 * BLOCK_SIZE])?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Packs `entries` into an in-memory archive. Files go under `archive_name`, or the first
/// entry's name when none is given.
pub fn create_archive(
    entries: &[ArchiveEntry],
    archive_name: Option<&str>,
) -> Result<Vec<u8>, ArchiveError> {
    let dir = archive_name
        .or_else(|| entries.first().map(|e| e.name.as_str()))
        .unwrap_or_default();
    let mut writer = ArchiveWriter::new(Vec::new(), dir);
    for entry in entries {
        writer.append_entry(entry)?;
    }
    writer.finish()
}

#[cfg(test)]
mod archive_tests {
    use super::*;
    use crate::datatype::DatatypeError;
    use crate::metadata::{Annotation, Capture, RecordingOptions};
    use serde_json::json;

    fn recording() -> Recording {
        let mut rec = Recording::with_options(RecordingOptions {
            datatype: Some("cf32_le".into()),
            sample_rate: Some(2.4e6),
            description: Some("test capture".into()),
            ..Default::default()
        })
        .unwrap();
        rec.add_capture(
            Capture::new(0)
                .with_frequency(915e6)
                .with_datetime("2024-01-01T00:00:00Z"),
        );
        rec.add_annotation(
            Annotation::new(16)
                .with_sample_count(32)
                .with_freq_edges(914e6, 916e6)
                .with_field("test:snr", 12.5),
        );
        rec
    }

    fn entry(name: &str, data: Vec<u8>) -> ArchiveEntry {
        ArchiveEntry::new(name, recording(), data)
    }

    fn meta_only_archive(dir: &str, name: &str) -> Vec<u8> {
        let mut writer = ArchiveWriter::new(Vec::new(), dir).with_mtime(0);
        let meta = recording().to_json(true).unwrap();
        writer
            .append_file(&format!("{name}{META_EXT}"), meta.as_bytes())
            .unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn output_is_block_aligned() {
        for size in [0usize, 1, 511, 512, 513, 5000] {
            let bytes = create_archive(&[entry("rec", vec![7; size])], None).unwrap();
            assert_eq!(bytes.len() % BLOCK_SIZE, 0, "size {size}");
            assert!(bytes.ends_with(&[0u8; 2 * BLOCK_SIZE]));
        }
        assert_eq!(create_archive(&[], None).unwrap().len(), 2 * BLOCK_SIZE);
    }

    #[test]
    fn header_layout() {
        let bytes = create_archive(&[entry("rec", vec![1, 2, 3])], Some("bundle")).unwrap();
        assert_eq!(c_string(&bytes[0..100]), "bundle/rec.sigmf-meta");
        assert_eq!(&bytes[257..263], b"ustar\0");
        assert_eq!(bytes[156], b'0');

        let header = parse_header(bytes[..BLOCK_SIZE].try_into().unwrap()).unwrap();
        let meta_blocks = header.size.div_ceil(BLOCK_SIZE as u64) as usize;
        let data_header = &bytes[(1 + meta_blocks) * BLOCK_SIZE..(2 + meta_blocks) * BLOCK_SIZE];
        assert_eq!(c_string(&data_header[0..100]), "bundle/rec.sigmf-data");
        assert_eq!(&data_header[124..136], b"00000000003\0");
    }

    #[test]
    fn round_trip() {
        let input = vec![
            entry("first", (0..=255).collect()),
            entry("second", Vec::new()),
        ];
        let bytes = create_archive(&input, Some("set")).unwrap();
        let output = read_archive_bytes(&bytes).unwrap();
        assert_eq!(output, input);
        assert_eq!(output[1].data.len(), 0);
        assert_eq!(output[0].metadata.annotations[0].field("test:snr"), Some(&json!(12.5)));
    }

    #[test]
    fn empty_inputs_are_not_errors() {
        assert!(read_archive_bytes(&[]).unwrap().is_empty());
        let bytes = create_archive(&[], Some("nothing")).unwrap();
        assert!(read_archive_bytes(&bytes).unwrap().is_empty());
    }

    #[test]
    fn metadata_only_recording() {
        let entries = read_archive_bytes(&meta_only_archive("d", "lonely")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "lonely");
        assert!(entries[0].data.is_empty());
    }

    #[test]
    fn orphan_data_is_dropped() {
        let mut writer = ArchiveWriter::new(Vec::new(), "d");
        writer.append_file("ghost.sigmf-data", &[1, 2, 3]).unwrap();
        writer.append_file("notes.txt", b"hello").unwrap();
        writer.append_entry(&entry("real", vec![9; 8])).unwrap();
        let entries = read_archive_bytes(&writer.finish().unwrap()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "real");
        assert_eq!(entries[0].data, vec![9; 8]);
    }

    #[test]
    fn data_before_metadata_still_pairs() {
        let mut writer = ArchiveWriter::new(Vec::new(), "d");
        writer.append_file("rec.sigmf-data", &[4, 5]).unwrap();
        let meta = recording().to_json(false).unwrap();
        writer.append_file("rec.sigmf-meta", meta.as_bytes()).unwrap();
        let entries = read_archive_bytes(&writer.finish().unwrap()).unwrap();
        assert_eq!(entries[0].data, vec![4, 5]);
    }

    #[test]
    fn long_paths_use_prefix_field() {
        let long_dir = "d".repeat(120);
        let data = vec![3u8; 40];
        let bytes = create_archive(&[entry("rec", data.clone())], Some(&long_dir)).unwrap();
        assert_eq!(c_string(&bytes[0..100]), "rec.sigmf-meta");
        assert_eq!(c_string(&bytes[345..500]), long_dir);

        let short = create_archive(&[entry("rec", data)], Some("d")).unwrap();
        assert_eq!(read_archive_bytes(&bytes).unwrap(), read_archive_bytes(&short).unwrap());
    }

    #[test]
    fn unsplittable_path_is_rejected() {
        let name = "n".repeat(150);
        let err = create_archive(&[entry(&name, Vec::new())], Some("d")).unwrap_err();
        assert!(matches!(err, ArchiveError::PathTooLong(_)));
    }

    #[test]
    fn gnu_and_pax_long_names() {
        let meta = recording().to_json(true).unwrap();
        let long = format!("dir/{}.sigmf-meta", "x".repeat(140));

        let mut gnu = ArchiveWriter::new(Vec::new(), "");
        gnu.append_raw("././@LongLink", GNU_LONG_NAME, format!("{long}\0").as_bytes())
            .unwrap();
        gnu.append_file("truncated", meta.as_bytes()).unwrap();
        let entries = read_archive_bytes(&gnu.finish().unwrap()).unwrap();
        assert_eq!(entries[0].name, "x".repeat(140));

        let record = format!("path={long}\n");
        let len = record.len() + 4;
        let pax_body = format!("{len} {record}");
        assert_eq!(pax_body.len(), len);
        let mut pax = ArchiveWriter::new(Vec::new(), "");
        pax.append_raw("PaxHeaders/x", PAX_HEADER, pax_body.as_bytes()).unwrap();
        pax.append_file("truncated", meta.as_bytes()).unwrap();
        let entries = read_archive_bytes(&pax.finish().unwrap()).unwrap();
        assert_eq!(entries[0].name, "x".repeat(140));
    }

    #[test]
    fn directories_are_skipped() {
        let mut writer = ArchiveWriter::new(Vec::new(), "");
        writer.append_raw("d/", b'5', &[]).unwrap();
        writer.append_entry(&entry("rec", vec![1])).unwrap();
        let entries = read_archive_bytes(&writer.finish().unwrap()).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn truncated_archive_fails() {
        let bytes = create_archive(&[entry("rec", vec![5; 2000])], None).unwrap();
        for cut in [100, BLOCK_SIZE + 10, bytes.len() - 3 * BLOCK_SIZE] {
            let err = read_archive_bytes(&bytes[..cut]).unwrap_err();
            assert!(matches!(err, ArchiveError::UnexpectedEof), "cut at {cut}: {err:?}");
        }
    }

    #[test]
    fn corrupt_header_fails_checksum() {
        let mut bytes = create_archive(&[entry("rec", vec![1])], None).unwrap();
        bytes[10] ^= 0x20;
        assert!(matches!(
            read_archive_bytes(&bytes).unwrap_err(),
            ArchiveError::BadChecksum { .. }
        ));
    }

    #[test]
    fn bad_metadata_fails_whole_read() {
        let mut writer = ArchiveWriter::new(Vec::new(), "d");
        writer.append_file("bad.sigmf-meta", b"{ not json").unwrap();
        let err = read_archive_bytes(&writer.finish().unwrap()).unwrap_err();
        assert!(matches!(err, ArchiveError::Metadata(MetadataError::Json(_))));

        let mut writer = ArchiveWriter::new(Vec::new(), "d");
        let doc = r#"{"global": {"core:datatype": "cq16_le", "core:version": "1.2.0"}}"#;
        writer.append_file("bad.sigmf-meta", doc.as_bytes()).unwrap();
        let err = read_archive_bytes(&writer.finish().unwrap()).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::Metadata(MetadataError::Datatype(DatatypeError::InvalidDatatype(_)))
        ));
    }

    #[test]
    fn stream_matches_eager_read() {
        let input = vec![entry("a", vec![1; 10]), entry("b", vec![2; 600])];
        let bytes = create_archive(&input, None).unwrap();
        let streamed: Vec<_> = stream_archive(bytes.as_slice())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(streamed, input);

        let mut first_only = stream_archive(bytes.as_slice());
        assert_eq!(first_only.next().unwrap().unwrap().name, "a");

        let mut broken = stream_archive(&bytes[..700]);
        assert!(matches!(broken.next(), Some(Err(ArchiveError::UnexpectedEof))));
        assert!(broken.next().is_none());
    }

    #[test]
    fn oversized_skipped_entry_is_malformed() {
        let mut block = build_header("d/", 0, 0, b'5').unwrap();
        block[124..136].copy_from_slice(&[
            0x80, 0, 0, 0, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        ]);
        let sum = format!("{:06o}\0 ", checksum(&block));
        block[148..156].copy_from_slice(sum.as_bytes());
        assert_eq!(parse_header(&block).unwrap().size, u64::MAX);

        let mut bytes = block.to_vec();
        bytes.extend([0u8; 2 * BLOCK_SIZE]);
        assert!(matches!(
            read_archive_bytes(&bytes).unwrap_err(),
            ArchiveError::Malformed("size")
        ));
    }

    #[test]
    fn numeric_fields() {
        assert_eq!(parse_number(b"00000000017\0", "size").unwrap(), 15);
        assert_eq!(parse_number(b"     17 \0\0\0\0", "size").unwrap(), 15);
        assert_eq!(parse_number(&[0; 12], "size").unwrap(), 0);
        let mut base256 = [0u8; 12];
        base256[0] = 0x80;
        base256[10] = 0x01;
        base256[11] = 0x02;
        assert_eq!(parse_number(&base256, "size").unwrap(), 258);
        assert!(parse_number(b"0000000009x\0", "size").is_err());
    }
}
