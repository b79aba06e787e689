//! Compression codecs applied to a partition's tar stream

use flate2::write::GzEncoder;
use lz4_flex::frame::FrameEncoder;
use std::io::{self, Write};

use crate::config::Compression;

/// Streaming compressor selected once per partition
pub enum CodecWriter<W: Write> {
    /// Bytes pass through unchanged
    Plain(W),
    /// gzip member stream
    Gzip(GzEncoder<W>),
    /// LZ4 frame stream
    Lz4(FrameEncoder<W>),
}

impl<W: Write> CodecWriter<W> {
    /// Wrap `dest` with the given codec
    pub fn new(dest: W, compression: Compression) -> Self {
        match compression {
            Compression::None => CodecWriter::Plain(dest),
            Compression::Gzip => {
                CodecWriter::Gzip(GzEncoder::new(dest, flate2::Compression::default()))
            }
            Compression::Lz4 => CodecWriter::Lz4(FrameEncoder::new(dest)),
        }
    }

    /// Emit the codec trailer and hand back the destination
    pub fn finish(self) -> io::Result<W> {
        match self {
            CodecWriter::Plain(mut dest) => {
                dest.flush()?;
                Ok(dest)
            }
            CodecWriter::Gzip(encoder) => encoder.finish(),
            CodecWriter::Lz4(encoder) => encoder.finish().map_err(io::Error::from),
        }
    }
}

impl<W: Write> Write for CodecWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CodecWriter::Plain(dest) => dest.write(buf),
            CodecWriter::Gzip(encoder) => encoder.write(buf),
            CodecWriter::Lz4(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CodecWriter::Plain(dest) => dest.flush(),
            CodecWriter::Gzip(encoder) => encoder.flush(),
            CodecWriter::Lz4(encoder) => encoder.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use lz4_flex::frame::FrameDecoder;
    use std::io::Read;

    fn payload() -> Vec<u8> {
        (0..20_000u32).flat_map(|i| (i % 251).to_le_bytes()).collect()
    }

    fn encode(compression: Compression, data: &[u8]) -> Vec<u8> {
        let mut writer = CodecWriter::new(Vec::new(), compression);
        writer.write_all(data).unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_plain_passthrough() {
        let data = payload();
        assert_eq!(encode(Compression::None, &data), data);
    }

    #[test]
    fn test_gzip_stream_decodes() {
        let data = payload();
        let encoded = encode(Compression::Gzip, &data);
        assert_eq!(&encoded[..2], &[0x1f, 0x8b]);

        let mut decoded = Vec::new();
        GzDecoder::new(encoded.as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_lz4_stream_decodes() {
        let data = payload();
        let encoded = encode(Compression::Lz4, &data);
        assert_eq!(&encoded[..4], &[0x04, 0x22, 0x4d, 0x18]);

        let mut decoded = Vec::new();
        FrameDecoder::new(encoded.as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_empty_streams_still_carry_trailers() {
        assert!(encode(Compression::None, &[]).is_empty());
        assert!(!encode(Compression::Gzip, &[]).is_empty());
        assert!(!encode(Compression::Lz4, &[]).is_empty());
    }
}
