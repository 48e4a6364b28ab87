//! A stand-in optical codec.
//!
//! "Images" are a short header followed by the reference text. A real
//! deployment plugs a QR library in behind the same trait.

use medtrace_contracts::error::MedtraceResult;
use medtrace_core::traits::OpticalCodec;

const HEADER: &[u8] = b"MTQR1\n";

#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl OpticalCodec for TextCodec {
    fn render(&self, reference: &str) -> MedtraceResult<Vec<u8>> {
        Ok([HEADER, reference.as_bytes()].concat())
    }

    fn scan(&self, image: &[u8]) -> MedtraceResult<Option<String>> {
        Ok(image
            .strip_prefix(HEADER)
            .and_then(|body| std::str::from_utf8(body).ok())
            .map(|text| text.trim_end().to_string()))
    }
}
