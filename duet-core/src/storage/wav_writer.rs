use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::CaptureError;
use crate::processing::wav_format;

/// Streaming WAV file writer.
///
/// Writes a placeholder 44-byte header on create, appends raw PCM in
/// arrival order, and patches the RIFF/data sizes on finalize. Protect
/// with a `Mutex` when shared with a writer thread.
pub struct WavWriter {
    path: PathBuf,
    file: Option<File>,
    sample_rate: u32,
    channels: u16,
    bit_depth: u16,
    data_bytes: u64,
}

/// A completed, size-patched WAV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedWav {
    pub path: PathBuf,
    pub data_bytes: u64,
    pub frames: u64,
    pub checksum: String,
}

impl WavWriter {
    /// Create the file (and its parent directory) and write the header.
    pub fn create(
        path: PathBuf,
        sample_rate: u32,
        channels: u16,
        bit_depth: u16,
    ) -> Result<Self, CaptureError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CaptureError::StorageError(format!("failed to create directory: {}", e))
            })?;
        }

        let mut file = File::create(&path)
            .map_err(|e| CaptureError::StorageError(format!("failed to create file: {}", e)))?;

        let header = wav_format::generate_wav_header(sample_rate, bit_depth, channels, 0);
        file.write_all(&header)
            .map_err(|e| CaptureError::StorageError(format!("header write failed: {}", e)))?;

        Ok(Self {
            path,
            file: Some(file),
            sample_rate,
            channels,
            bit_depth,
            data_bytes: 0,
        })
    }

    /// Append raw PCM bytes in arrival order.
    pub fn write_pcm(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;
        file.write_all(data)
            .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))?;
        self.data_bytes += data.len() as u64;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    pub fn frames_written(&self) -> u64 {
        wav_format::frames_in_data(self.data_bytes, self.channels, self.bit_depth)
    }

    pub fn bit_depth(&self) -> u16 {
        self.bit_depth
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Patch header sizes, flush, and compute the file's SHA-256.
    pub fn finalize(mut self) -> Result<FinalizedWav, CaptureError> {
        let frames = self.frames_written();
        let data_bytes = self.data_bytes;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;

        let total = wav_format::WAV_HEADER_SIZE as u64 + data_bytes;

        file.seek(SeekFrom::Start(4))
            .map_err(|e| CaptureError::StorageError(e.to_string()))?;
        file.write_all(&((total - 8) as u32).to_le_bytes())
            .map_err(|e| CaptureError::StorageError(e.to_string()))?;

        file.seek(SeekFrom::Start(40))
            .map_err(|e| CaptureError::StorageError(e.to_string()))?;
        file.write_all(&(data_bytes as u32).to_le_bytes())
            .map_err(|e| CaptureError::StorageError(e.to_string()))?;

        file.flush()
            .map_err(|e| CaptureError::StorageError(e.to_string()))?;
        self.file = None;

        let checksum = sha256_file(&self.path)?;
        Ok(FinalizedWav {
            path: self.path.clone(),
            data_bytes,
            frames,
            checksum,
        })
    }
}

/// SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let data = fs::read(path)
        .map_err(|e| CaptureError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("duet_wav_writer_{}_{}", std::process::id(), name))
    }

    #[test]
    fn writes_header_then_data_and_patches_sizes() {
        let path = temp_path("basic.wav");
        let mut writer = WavWriter::create(path.clone(), 44_100, 2, 16).unwrap();

        writer.write_pcm(&[0u8; 16]).unwrap(); // 4 stereo frames
        assert_eq!(writer.frames_written(), 4);

        let done = writer.finalize().unwrap();
        assert_eq!(done.frames, 4);
        assert!(!done.checksum.is_empty());

        let data = fs::read(&path).unwrap();
        assert_eq!(data.len(), 44 + 16);
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(
            u32::from_le_bytes([data[40], data[41], data[42], data[43]]),
            16
        );
        assert_eq!(
            u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            36 + 16
        );

        fs::remove_file(&path).ok();
    }

    #[test]
    fn empty_file_is_still_a_valid_container() {
        let path = temp_path("empty.wav");
        let writer = WavWriter::create(path.clone(), 44_100, 2, 16).unwrap();
        let done = writer.finalize().unwrap();

        assert_eq!(done.frames, 0);
        let data = fs::read(&path).unwrap();
        assert_eq!(data.len(), 44);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn frame_count_at_24_bit() {
        let path = temp_path("deep.wav");
        let mut writer = WavWriter::create(path.clone(), 44_100, 2, 24).unwrap();
        writer.write_pcm(&[0u8; 18]).unwrap(); // 3 stereo 24-bit frames
        assert_eq!(writer.frames_written(), 3);

        let data_path = writer.finalize().unwrap().path;
        let data = fs::read(&data_path).unwrap();
        assert_eq!(u16::from_le_bytes([data[34], data[35]]), 24);

        fs::remove_file(&path).ok();
    }
}
