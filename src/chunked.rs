//! Bounded-memory decoding of sample sources larger than memory.

use crate::datatype::Datatype;
use crate::samples::{ReadOptions, SampleBuffer, SampleError, decode};
use log::{debug, trace, warn};
use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

/// Sources smaller than this are decoded in one go by [`read_source`].
pub const DEFAULT_IN_MEMORY_THRESHOLD: u64 = 64 * 1024 * 1024;
pub const DEFAULT_CHUNK_SAMPLES: usize = 64 * 1024;

/// Upper bound on a single read from the underlying reader.
const READ_BUF_BYTES: usize = 64 * 1024;

/// Anything with a known size that can hand out a fresh sequential reader.
pub trait ByteSource {
    fn size(&self) -> io::Result<u64>;
    fn open(&self) -> io::Result<Box<dyn Read + '_>>;
}

impl ByteSource for [u8] {
    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(self))
    }
}

impl ByteSource for Vec<u8> {
    fn size(&self) -> io::Result<u64> {
        self.as_slice().size()
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        self.as_slice().open()
    }
}

/// A `.sigmf-data` (or any other) file on disk.
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileSource {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn size(&self) -> io::Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(BufReader::new(File::open(&self.path)?)))
    }
}

/// Forward-only iterator of whole-sample chunks decoded from a reader.
///
/// The reader is dropped as soon as it is exhausted or fails, and otherwise together with the
/// iterator, so stopping early releases it too. Every chunk holds exactly `chunk_samples`
/// samples except possibly the last one. A trailing partial sample is discarded.
pub struct ChunkedSampleReader<R: Read> {
    reader: Option<R>,
    datatype: Datatype,
    chunk_bytes: usize,
    pending: Vec<u8>,
    scratch: Vec<u8>,
    bytes_read: u64,
}

impl<R: Read> ChunkedSampleReader<R> {
    /// A `chunk_samples` of zero is treated as one. Buffers grow with the bytes actually read,
    /// so a chunk size far beyond the source size is fine.
    pub fn new(reader: R, datatype: Datatype, chunk_samples: usize) -> Self {
        let chunk_bytes = chunk_samples
            .max(1)
            .saturating_mul(datatype.bytes_per_sample());
        let scratch_len = chunk_bytes.min(READ_BUF_BYTES);
        ChunkedSampleReader {
            reader: Some(reader),
            datatype,
            chunk_bytes,
            pending: Vec::with_capacity(scratch_len),
            scratch: vec![0; scratch_len],
            bytes_read: 0,
        }
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    /// Bytes pulled from the reader so far, including bytes not yet decoded.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn take_chunk(&mut self, len: usize) -> SampleBuffer {
        let chunk = decode(&self.pending[..len], self.datatype, ReadOptions::default());
        self.pending.drain(..len);
        trace!(
            "Decoded chunk of {} samples, {} bytes left over",
            chunk.sample_count,
            self.pending.len()
        );
        chunk
    }

    /// Reads more bytes into `pending`, up to a full chunk. Returns false once the reader is
    /// exhausted.
    fn fill(&mut self) -> Result<bool, io::Error> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(false);
        };

        let want = (self.chunk_bytes - self.pending.len()).min(self.scratch.len());
        let result = loop {
            match reader.read(&mut self.scratch[..want]) {
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                other => break other,
            }
        };

        match result {
            Ok(0) => {
                self.reader = None;
                debug!("Sample source exhausted after {} bytes", self.bytes_read);
                Ok(false)
            }
            Ok(n) => {
                self.pending.extend_from_slice(&self.scratch[..n]);
                self.bytes_read += n as u64;
                Ok(true)
            }
            Err(e) => {
                self.pending.clear();
                self.reader = None;
                Err(e)
            }
        }
    }
}

impl<R: Read> Iterator for ChunkedSampleReader<R> {
    type Item = Result<SampleBuffer, SampleError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.pending.len() >= self.chunk_bytes {
                return Some(Ok(self.take_chunk(self.chunk_bytes)));
            }

            match self.fill() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return Some(Err(e.into())),
            }
        }

        let bps = self.datatype.bytes_per_sample();
        let whole = self.pending.len() / bps * bps;
        if self.pending.len() > whole {
            warn!(
                "Discarding {} trailing bytes that do not form a whole {} sample",
                self.pending.len() - whole,
                self.datatype
            );
        }

        if whole == 0 {
            self.pending.clear();
            return None;
        }

        let chunk = self.take_chunk(whole);
        self.pending.clear();
        Some(Ok(chunk))
    }
}

impl<'a> ChunkedSampleReader<Box<dyn Read + 'a>> {
    pub fn from_source<S: ByteSource + ?Sized>(
        source: &'a S,
        datatype: Datatype,
        chunk_samples: usize,
    ) -> Result<Self, SampleError> {
        Ok(ChunkedSampleReader::new(source.open()?, datatype, chunk_samples))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SourceReadOptions {
    pub window: ReadOptions,
    /// Sources up to this size are read whole instead of chunk by chunk.
    pub in_memory_threshold: u64,
    pub chunk_samples: usize,
}

impl Default for SourceReadOptions {
    fn default() -> Self {
        SourceReadOptions {
            window: ReadOptions::default(),
            in_memory_threshold: DEFAULT_IN_MEMORY_THRESHOLD,
            chunk_samples: DEFAULT_CHUNK_SAMPLES,
        }
    }
}

/// Decodes a window of samples from `source`. Small sources are read whole, large ones are
/// streamed through a [`ChunkedSampleReader`]; both give the same samples. `progress` receives
/// the cumulative bytes read and the total size of the source.
pub fn read_source<S: ByteSource + ?Sized>(
    source: &S,
    datatype: &str,
    options: SourceReadOptions,
    mut progress: Option<&mut dyn FnMut(u64, u64)>,
) -> Result<SampleBuffer, SampleError> {
    let datatype = Datatype::parse(datatype)?;
    let total = source.size()?;
    let mut reader = source.open()?;

    if total <= options.in_memory_threshold {
        let mut bytes = Vec::with_capacity(total as usize);
        reader.read_to_end(&mut bytes)?;
        if let Some(cb) = progress.as_mut() {
            cb(bytes.len() as u64, total);
        }
        return Ok(decode(&bytes, datatype, options.window));
    }

    let bps = datatype.bytes_per_sample() as u64;
    let skip = (options.window.offset as u64).saturating_mul(bps);
    let skipped = io::copy(&mut reader.by_ref().take(skip), &mut io::sink())?;
    let limited: Box<dyn Read + '_> = match options.window.count {
        Some(count) => Box::new(reader.take((count as u64).saturating_mul(bps))),
        None => reader,
    };

    debug!(
        "Streaming {} byte source as {} in chunks of {} samples",
        total, datatype, options.chunk_samples
    );
    let mut chunks = ChunkedSampleReader::new(limited, datatype, options.chunk_samples);
    let mut out = SampleBuffer::empty(datatype);
    while let Some(chunk) = chunks.next() {
        out.append(chunk?);
        if let Some(cb) = progress.as_mut() {
            cb(skipped + chunks.bytes_read(), total);
        }
    }
    Ok(out)
}
