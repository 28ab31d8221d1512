//! Conversion between packed sample bytes and `f64` values.
//!
//! Every component, whatever its wire width, is widened to `f64`. This is exact for all
//! integer widths of the grammar and for both float widths. Complex samples are kept
//! interleaved as `[i0, q0, i1, q1, ...]`.

use crate::datatype::{ComponentType, Datatype, DatatypeError, Endianness};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use num_complex::Complex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SampleError {
    #[error(transparent)]
    Datatype(#[from] DatatypeError),
    #[error("Datatype {0} is real, complex samples cannot be written with it")]
    NotComplexDatatype(String),
    #[error("Complex datatype {datatype} needs an even number of components, got {len}")]
    OddComponentCount { datatype: String, len: usize },
    #[error("Reader I/O error while reading samples")]
    Io(#[from] std::io::Error),
}

/// Window of samples to decode. Both values count samples, not bytes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub offset: usize,
    /// `None` reads until the end of the buffer.
    pub count: Option<usize>,
}

impl ReadOptions {
    pub fn window(offset: usize, count: usize) -> Self {
        ReadOptions {
            offset,
            count: Some(count),
        }
    }
}

/// Decoded samples along with the datatype they were read as.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    pub datatype: Datatype,
    pub sample_count: usize,
    /// One value per real sample, or interleaved I/Q pairs for complex datatypes.
    pub values: Vec<f64>,
}

impl SampleBuffer {
    pub fn empty(datatype: Datatype) -> Self {
        SampleBuffer {
            datatype,
            sample_count: 0,
            values: Vec::new(),
        }
    }

    pub fn is_complex(&self) -> bool {
        self.datatype.is_complex()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    /// Pairs up interleaved components. Returns `None` for real datatypes.
    pub fn to_complex(&self) -> Option<Vec<Complex<f64>>> {
        if !self.is_complex() {
            return None;
        }
        Some(
            self.values
                .chunks_exact(2)
                .map(|iq| Complex::new(iq[0], iq[1]))
                .collect(),
        )
    }

    pub fn append(&mut self, other: SampleBuffer) {
        debug_assert_eq!(self.datatype, other.datatype);
        self.sample_count += other.sample_count;
        self.values.extend(other.values);
    }
}

fn read_component<B: ByteOrder>(component: ComponentType, bytes: &[u8]) -> f64 {
    match component {
        ComponentType::F32 => B::read_f32(bytes) as f64,
        ComponentType::F64 => B::read_f64(bytes),
        ComponentType::I32 => B::read_i32(bytes) as f64,
        ComponentType::I16 => B::read_i16(bytes) as f64,
        ComponentType::I8 => bytes[0] as i8 as f64,
        ComponentType::U32 => B::read_u32(bytes) as f64,
        ComponentType::U16 => B::read_u16(bytes) as f64,
        ComponentType::U8 => bytes[0] as f64,
    }
}

/// Out of range values saturate to the component's limits, fractions truncate towards zero.
fn write_component<B: ByteOrder>(component: ComponentType, out: &mut [u8], value: f64) {
    match component {
        ComponentType::F32 => B::write_f32(out, value as f32),
        ComponentType::F64 => B::write_f64(out, value),
        ComponentType::I32 => B::write_i32(out, value as i32),
        ComponentType::I16 => B::write_i16(out, value as i16),
        ComponentType::I8 => out[0] = value as i8 as u8,
        ComponentType::U32 => B::write_u32(out, value as u32),
        ComponentType::U16 => B::write_u16(out, value as u16),
        ComponentType::U8 => out[0] = value as u8,
    }
}

fn decode_components<B: ByteOrder>(component: ComponentType, bytes: &[u8], out: &mut Vec<f64>) {
    out.extend(
        bytes
            .chunks_exact(component.bytes())
            .map(|c| read_component::<B>(component, c)),
    );
}

fn encode_components<B: ByteOrder>(component: ComponentType, values: &[f64], out: &mut [u8]) {
    for (chunk, value) in out.chunks_exact_mut(component.bytes()).zip(values) {
        write_component::<B>(component, chunk, *value);
    }
}

/// Decodes a window of `buffer` with an already parsed datatype. An offset past the end of the
/// buffer gives an empty result, as does a zero count.
pub fn decode(buffer: &[u8], datatype: Datatype, options: ReadOptions) -> SampleBuffer {
    let bps = datatype.bytes_per_sample();
    let byte_offset = match options.offset.checked_mul(bps) {
        Some(o) if o <= buffer.len() => o,
        _ => return SampleBuffer::empty(datatype),
    };

    let available = (buffer.len() - byte_offset) / bps;
    let count = options.count.map_or(available, |c| c.min(available));
    let bytes = &buffer[byte_offset..byte_offset + count * bps];

    let mut values = Vec::with_capacity(count * datatype.components_per_sample());
    match datatype.endianness() {
        Some(Endianness::Big) => {
            decode_components::<BigEndian>(datatype.component(), bytes, &mut values)
        }
        _ => decode_components::<LittleEndian>(datatype.component(), bytes, &mut values),
    }

    SampleBuffer {
        datatype,
        sample_count: count,
        values,
    }
}

/// Encodes interleaved (complex) or plain (real) values with an already parsed datatype.
pub fn encode(values: &[f64], datatype: Datatype) -> Result<Vec<u8>, SampleError> {
    if datatype.is_complex() && values.len() % 2 != 0 {
        return Err(SampleError::OddComponentCount {
            datatype: datatype.to_string(),
            len: values.len(),
        });
    }

    let mut out = vec![0u8; values.len() * datatype.bytes_per_component()];
    match datatype.endianness() {
        Some(Endianness::Big) => {
            encode_components::<BigEndian>(datatype.component(), values, &mut out)
        }
        _ => encode_components::<LittleEndian>(datatype.component(), values, &mut out),
    }
    Ok(out)
}

/// Reads samples stored as `datatype` from `buffer`. Only the datatype token can make this fail.
pub fn read_samples(
    buffer: &[u8],
    datatype: &str,
    options: ReadOptions,
) -> Result<SampleBuffer, SampleError> {
    let datatype = Datatype::parse(datatype)?;
    Ok(decode(buffer, datatype, options))
}

/// Packs `samples` as `datatype`. Complex datatypes take interleaved I/Q values.
pub fn write_samples(samples: &[f64], datatype: &str) -> Result<Vec<u8>, SampleError> {
    encode(samples, Datatype::parse(datatype)?)
}

pub fn write_samples_complex(
    samples: &[Complex<f64>],
    datatype: &str,
) -> Result<Vec<u8>, SampleError> {
    let dt = Datatype::parse(datatype)?;
    if !dt.is_complex() {
        return Err(SampleError::NotComplexDatatype(datatype.to_string()));
    }
    let interleaved: Vec<f64> = samples.iter().flat_map(|s| [s.re, s.im]).collect();
    encode(&interleaved, dt)
}
