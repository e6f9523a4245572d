//! Raw deflate decoding, in one shot or chunk by chunk.

use flate2::{Decompress, FlushDecompress, Status};

use crate::errors::*;

/// Outcome of feeding one chunk to a `StreamDecompressor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inflate {
    /// The chunk was consumed; the stream needs more input.
    NeedMore,
    /// The end of the stream was reached within this chunk.
    Complete,
    /// The input is corrupt or does not fit the output.
    Failed,
}

/// Per-load decoder state of a package.
///
/// `decompress` is called once per input chunk, in stream order, with the
/// same `output` buffer every time. The decoder keeps track of how much of
/// `output` it already filled.
pub trait StreamDecompressor: Send {
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Inflate;

    /// Bytes written to `output` so far.
    fn total_out(&self) -> usize;
}

pub struct DeflateStream {
    inner: Decompress,
    spill: [u8; 1],
}

impl DeflateStream {
    pub fn new() -> Self {
        DeflateStream {
            inner: Decompress::new(false),
            spill: [0],
        }
    }
}

impl Default for DeflateStream {
    fn default() -> Self {
        DeflateStream::new()
    }
}

impl StreamDecompressor for DeflateStream {
    fn decompress(&mut self, mut input: &[u8], output: &mut [u8]) -> Inflate {
        loop {
            let out_pos = self.total_out();
            if out_pos > output.len() {
                return Inflate::Failed;
            }

            // Once `output` is full the trailing input is fed against a
            // one-byte spill buffer: it may still end the stream, but it must
            // not produce anything.
            let full = out_pos == output.len();
            let DeflateStream { inner, spill } = &mut *self;
            let target = if full {
                &mut spill[..]
            } else {
                &mut output[out_pos..]
            };

            let before_in = inner.total_in();
            let before_out = inner.total_out();
            let status = inner.decompress(input, target, FlushDecompress::None);

            let consumed = (inner.total_in() - before_in) as usize;
            let produced = (inner.total_out() - before_out) as usize;
            input = &input[consumed..];

            match status {
                _ if full && produced > 0 => return Inflate::Failed,
                Ok(Status::StreamEnd) => return Inflate::Complete,
                Ok(_) if input.is_empty() => return Inflate::NeedMore,
                Ok(_) if consumed == 0 && produced == 0 => return Inflate::Failed,
                Ok(_) => continue,
                Err(_) => return Inflate::Failed,
            }
        }
    }

    #[inline]
    fn total_out(&self) -> usize {
        self.inner.total_out() as usize
    }
}

/// Decodes all of `input` into `output`, which must be exactly the size of
/// the decoded stream.
pub fn inflate_into(input: &[u8], output: &mut [u8]) -> Result<()> {
    let mut stream = DeflateStream::new();
    match stream.decompress(input, output) {
        Inflate::Complete if stream.total_out() == output.len() => Ok(()),
        Inflate::Complete => Err(Error::Decompression(format!(
            "stream holds {} bytes, expected {}",
            stream.total_out(),
            output.len()
        ))),
        Inflate::NeedMore => Err(Error::Decompression("truncated stream".into())),
        Inflate::Failed => Err(Error::Decompression("corrupt stream".into())),
    }
}
