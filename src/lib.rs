//! # sigmf
//! This library reads and writes recordings in the Signal Metadata Format (SigMF): raw sample
//! files described by a JSON metadata document, optionally bundled together as a `.sigmf` TAR
//! archive.
//!
//! ## What is covered
//! * Datatype tokens such as `cf32_le` or `ru8`, see [`datatype`].
//! * Decoding and encoding of samples in every supported datatype, see [`samples`], and
//!   reading large data files in chunks, see [`chunked`].
//! * The metadata model (global object, captures, annotations) and its validation, see
//!   [`metadata`] and [`validate`]. Extension namespaces can be type checked through an
//!   [`ExtensionRegistry`].
//! * `.sigmf` archives and `.sigmf-collection` documents, see [`archive`] and [`collection`].
//!
//! Sample values are always handed out as `f64`, interleaved I/Q for complex datatypes. Integer
//! values are not scaled.
//!
//! ## Crate status
//! * Targets SigMF 1.2.0.
//! * Only the ustar subset of TAR needed for `.sigmf` archives is implemented.
//!
//! ## Examples
//!
//! ### Writing and reading back a recording
//!
//! ```
//! use sigmf::{ArchiveEntry, Recording, RecordingOptions, create_archive, read_archive_bytes};
//! use sigmf::{read_samples, write_samples, ReadOptions};
//!
//! let metadata = Recording::with_options(RecordingOptions {
//!     sample_rate: Some(1e6),
//!     ..RecordingOptions::with_datatype("ci16_le")
//! })?;
//! let data = write_samples(&[1.0, -1.0, 300.0, -300.0], "ci16_le")?;
//!
//! let archive = create_archive(&[ArchiveEntry::new("example", metadata, data)], None)?;
//! let entries = read_archive_bytes(&archive)?;
//!
//! let samples = read_samples(&entries[0].data, "ci16_le", ReadOptions::default())?;
//! assert_eq!(samples.sample_count, 2);
//! assert_eq!(samples.values, vec![1.0, -1.0, 300.0, -300.0]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
pub mod archive;
pub mod chunked;
pub mod collection;
pub mod datatype;
pub mod extensions;
pub mod hash;
pub mod metadata;
pub mod samples;
pub mod validate;

pub use archive::{
    ArchiveEntry, ArchiveError, ArchiveWriter, create_archive, read_archive, read_archive_bytes,
    stream_archive,
};
pub use chunked::{ByteSource, ChunkedSampleReader, FileSource, SourceReadOptions, read_source};
pub use collection::{Collection, CollectionError, StreamRef};
pub use datatype::{ComponentType, Datatype, DatatypeError, Endianness, SampleFormat};
pub use extensions::{Extension, ExtensionError, ExtensionRegistry, FieldType};
pub use metadata::{
    Annotation, Capture, GeoPoint, MetadataError, Recording, RecordingOptions, SIGMF_VERSION,
};
pub use samples::{
    ReadOptions, SampleBuffer, SampleError, decode, encode, read_samples, write_samples,
    write_samples_complex,
};
pub use validate::{ValidationIssue, ValidationReport};
