//! Capture files.
//!
//! # Binary format
//!
//! All fixed-width integers are big endian except the line states.
//!
//! | Field            | Type        |                                        |
//! |------------------|-------------|----------------------------------------|
//! | magic            | `[u8; 4]`   | `ABUS`                                 |
//! | version          | `u8`        | 1                                      |
//! | channels         | `u8`        | Must be 16                             |
//! | samplerate       | `u64`       | Hz, 0 if unknown                       |
//! | samples          | `u64`       | Length of the capture                  |
//! | change count     | varint      |                                        |
//! | pack type        | `u8`        | `!` raw, `Z` zlib, `4` LZ4 block       |
//! | body length      | varint      | Uncompressed                           |
//! | stored length    | varint      | As stored in the file                  |
//! | body             | bytes       |                                        |
//!
//! The uncompressed body is, for each value change, a varint sample delta
//! from the previous change (the first is from 0) and the line states as a
//! little endian `u16`.
//!
//! # Text format
//!
//! ```text
//! # Comment
//! samplerate 1000000
//! samples 200
//! 0 0x0003
//! 10 0x0102
//! ```
//!
//! Each value change is a sample number and the line states in hex. `samples`
//! defaults to one past the last change.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Cursor, Read, Write},
    path::Path,
};

use anyhow::{bail, Context, Result};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use log::info;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::{
    capture::Capture,
    cursor::SamplePosition,
    error::DecodeError,
    lines::{LineVector, NUM_CHANNELS},
    varint::{VarintReader, VarintWriter},
};

pub const MAGIC: [u8; 4] = *b"ABUS";
pub const VERSION: u8 = 1;

/// Smallest and largest encoding of one value change.
const MIN_CHANGE_LENGTH: u64 = 1 + 2;
const MAX_CHANGE_LENGTH: u64 = 10 + 2;

/// How the body of a binary capture is compressed.
#[derive(FromPrimitive, Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum PackType {
    /// `!`
    #[default]
    Raw = 0x21,
    /// `Z`
    Zlib = 0x5A,
    /// `4`
    Lz4 = 0x34,
}

impl Capture {
    /// Load a binary or text capture, depending on whether it starts with
    /// the magic number.
    pub fn load(filename: &Path) -> Result<Self> {
        let f = File::open(filename)
            .with_context(|| format!("Opening capture {}", filename.display()))?;

        let mut reader = BufReader::new(f);

        let is_binary = reader.fill_buf()?.starts_with(&MAGIC);

        let capture = if is_binary {
            Self::read_binary(&mut reader)
        } else {
            Self::read_text(&mut reader)
        }
        .with_context(|| format!("Reading capture {}", filename.display()))?;

        info!(
            "Loaded {} ({} samples, {} value changes)",
            filename.display(),
            capture.num_samples(),
            capture.changes().len()
        );
        Ok(capture)
    }

    pub fn save(&self, filename: &Path, pack_type: PackType) -> Result<()> {
        let f = File::create(filename)
            .with_context(|| format!("Creating capture {}", filename.display()))?;
        let mut writer = BufWriter::new(f);
        self.write_binary(&mut writer, pack_type)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_binary(reader: &mut impl Read) -> Result<Self> {
        let mut magic = [0; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            bail!("Not a bus capture: {:x?}", magic);
        }

        let version = reader.read_u8()?;
        if version != VERSION {
            bail!("Unsupported capture version {version} (expected {VERSION})");
        }

        let num_channels = reader.read_u8()? as usize;
        if num_channels != NUM_CHANNELS {
            return Err(DecodeError::MalformedChannelCount {
                expected: NUM_CHANNELS,
                actual: num_channels,
            }
            .into());
        }

        let samplerate = reader.read_u64::<BigEndian>()?;
        let num_samples = reader.read_u64::<BigEndian>()?;
        let change_count = reader.read_varint()?;

        let pack_type = reader.read_u8()?;
        let pack_type = match PackType::from_u8(pack_type) {
            Some(p) => p,
            None => {
                bail!("Unknown pack type {}", pack_type);
            }
        };

        let body_length = reader.read_varint()?;
        let stored_length = reader.read_varint()?;

        if body_length < change_count.saturating_mul(MIN_CHANGE_LENGTH)
            || body_length > change_count.saturating_mul(MAX_CHANGE_LENGTH)
        {
            bail!("Body length {body_length} doesn't fit {change_count} value changes");
        }

        // Read through `take()` so a bogus length can't allocate more than
        // the file holds.
        let mut stored = Vec::new();
        reader.by_ref().take(stored_length).read_to_end(&mut stored)?;
        if stored.len() as u64 != stored_length {
            bail!(
                "Capture body truncated: expected {stored_length} bytes but only {} remain",
                stored.len()
            );
        }

        let body = match pack_type {
            PackType::Raw => {
                if stored_length != body_length {
                    bail!("Raw body has stored length {stored_length} but length {body_length}");
                }
                stored
            }
            PackType::Zlib => {
                let mut body = Vec::new();
                let mut decoder = ZlibDecoder::new(stored.as_slice());
                decoder
                    .by_ref()
                    .take(body_length)
                    .read_to_end(&mut body)
                    .context("ZLib decompression")?;
                let mut extra = [0; 1];
                if decoder.read(&mut extra).context("ZLib decompression")? != 0 {
                    bail!("ZLib body decompresses to more than {body_length} bytes");
                }
                body
            }
            PackType::Lz4 => {
                // LZ4 can't expand by more than this.
                if body_length > stored_length.saturating_mul(255).saturating_add(16) {
                    bail!("Implausible LZ4 body length {body_length}");
                }
                lz4_flex::block::decompress(&stored, body_length as usize)
                    .context("LZ4 decompression")?
            }
        };

        if body.len() as u64 != body_length {
            bail!(
                "Capture body is {} bytes; expected {body_length}",
                body.len()
            );
        }

        let mut trailing = [0; 1];
        if reader.read(&mut trailing)? != 0 {
            bail!("Unexpected data after the capture body");
        }

        let mut cursor = Cursor::new(body);
        let mut changes = Vec::with_capacity(change_count as usize);
        let mut sample: u64 = 0;
        for n in 0..change_count {
            let delta = cursor
                .read_varint()
                .with_context(|| format!("Reading value change {n}"))?;
            sample = sample
                .checked_add(delta)
                .context("Sample number overflow")?;
            let bits = cursor
                .read_u16::<LittleEndian>()
                .with_context(|| format!("Reading value change {n}"))?;
            changes.push((SamplePosition(sample), LineVector::from_bits(bits)));
        }

        if cursor.position() != body_length {
            bail!(
                "Capture body has {} unused bytes",
                body_length - cursor.position()
            );
        }

        Capture::new(Some(samplerate), num_samples, changes)
    }

    pub fn write_binary(&self, writer: &mut impl Write, pack_type: PackType) -> Result<()> {
        let mut body = Vec::with_capacity(self.changes().len() * 4);
        let mut previous = 0;
        for (position, lines) in self.changes() {
            body.write_varint(position.0 - previous)?;
            body.write_u16::<LittleEndian>(lines.bits())?;
            previous = position.0;
        }
        let body_length = body.len() as u64;

        let stored = match pack_type {
            PackType::Raw => body,
            PackType::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&body)?;
                encoder.finish()?
            }
            PackType::Lz4 => lz4_flex::block::compress(&body),
        };

        writer.write_all(&MAGIC)?;
        writer.write_u8(VERSION)?;
        writer.write_u8(NUM_CHANNELS as u8)?;
        writer.write_u64::<BigEndian>(self.samplerate.unwrap_or(0))?;
        writer.write_u64::<BigEndian>(self.num_samples())?;
        writer.write_varint(self.changes().len() as u64)?;
        writer.write_u8(pack_type as u8)?;
        writer.write_varint(body_length)?;
        writer.write_varint(stored.len() as u64)?;
        writer.write_all(&stored)?;
        Ok(())
    }

    pub fn read_text(reader: &mut impl BufRead) -> Result<Self> {
        let mut samplerate = None;
        let mut num_samples = None;
        let mut changes = Vec::new();

        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            let line_number = n + 1;
            let line = match line.split_once('#') {
                Some((content, _comment)) => content,
                None => line.as_str(),
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (Some(key), Some(value), None) = (fields.next(), fields.next(), fields.next())
            else {
                bail!("Line {line_number}: expected two fields but got {line:?}");
            };

            match key {
                "samplerate" => {
                    samplerate = Some(
                        value
                            .parse::<u64>()
                            .with_context(|| format!("Line {line_number}: invalid samplerate"))?,
                    );
                }
                "samples" => {
                    num_samples = Some(
                        value
                            .parse::<u64>()
                            .with_context(|| format!("Line {line_number}: invalid sample count"))?,
                    );
                }
                sample => {
                    let sample: u64 = sample
                        .parse()
                        .with_context(|| format!("Line {line_number}: invalid sample {sample:?}"))?;
                    let hex = value
                        .strip_prefix("0x")
                        .or_else(|| value.strip_prefix("0X"))
                        .unwrap_or(value);
                    let bits = u16::from_str_radix(hex, 16).with_context(|| {
                        format!("Line {line_number}: invalid line states {value:?}")
                    })?;
                    changes.push((SamplePosition(sample), LineVector::from_bits(bits)));
                }
            }
        }

        let num_samples = match num_samples {
            Some(n) => n,
            None => match changes.last() {
                Some((last, _)) => last
                    .0
                    .checked_add(1)
                    .with_context(|| format!("Sample {last} is too large without a `samples` line"))?,
                None => 0,
            },
        };

        Capture::new(samplerate, num_samples, changes)
    }

    pub fn write_text(&self, writer: &mut impl Write) -> Result<()> {
        if let Some(samplerate) = self.samplerate {
            writeln!(writer, "samplerate {samplerate}")?;
        }
        writeln!(writer, "samples {}", self.num_samples())?;
        for (position, lines) in self.changes() {
            writeln!(writer, "{position} {lines:#06x}")?;
        }
        Ok(())
    }
}
