//! Frame sinks.
//!
//! A [`FrameSink`] receives every surface the driver decides to keep.
//! [`RawFileSink`] appends tightly packed planes to a file, the format raw
//! YUV viewers expect; [`NullSink`] throws everything away for benchmarks.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{error::DecodeError, surface::Surface};

/// Destination for decoded surfaces.
pub trait FrameSink {
    /// Write one surface.
    fn write_surface(&mut self, surface: &dyn Surface) -> Result<(), DecodeError>;

    /// Number of surfaces written so far.
    fn frames_written(&self) -> u64;

    /// Flush anything buffered.
    fn finish(&mut self) -> Result<(), DecodeError>;
}

/// Appends raw planar frames to a file.
pub struct RawFileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    frames_written: u64,
    bytes_written: u64,
    warned_unmapped: bool,
}

impl RawFileSink {
    /// Create (or truncate) `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        log::debug!("Writing raw frames to {}", path.display());

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            frames_written: 0,
            bytes_written: 0,
            warned_unmapped: false,
        })
    }

    /// Destination path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl FrameSink for RawFileSink {
    fn write_surface(&mut self, surface: &dyn Surface) -> Result<(), DecodeError> {
        let Some(bytes) = surface.packed_bytes() else {
            if !self.warned_unmapped {
                log::warn!(
                    "Surfaces are not mapped to memory; nothing is written to {}",
                    self.path.display()
                );
                self.warned_unmapped = true;
            }
            return Ok(());
        };

        self.writer.write_all(&bytes)?;
        self.frames_written += 1;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn finish(&mut self) -> Result<(), DecodeError> {
        self.writer.flush()?;
        log::debug!(
            "Wrote {} frames ({} bytes) to {}",
            self.frames_written,
            self.bytes_written,
            self.path.display()
        );
        Ok(())
    }
}

/// Discards every surface.
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn write_surface(&mut self, _surface: &dyn Surface) -> Result<(), DecodeError> {
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        0
    }

    fn finish(&mut self) -> Result<(), DecodeError> {
        Ok(())
    }
}
