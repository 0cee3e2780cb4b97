//! Binary/text conversions, compression and content hashing
//!
//! Everything that crosses the broker is text, so any binary value (ciphertexts,
//! exported keys, compressed payloads) is rendered as hex or base64 first.
//! All functions here are stateless.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

/// Size of a SHA-256 digest in bytes
pub const HASH_SIZE: usize = 32;

/// Errors that can occur while decoding text back into bytes
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("compression error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decompressed payload is not valid utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Encode bytes as lowercase hex
pub fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(bytes)
}

/// Decode a hex string, accepting an optional "0x" prefix
pub fn from_hex(text: &str) -> Result<Vec<u8>, CodecError> {
    let text = text.strip_prefix("0x").unwrap_or(text);
    Ok(hex::decode(text)?)
}

/// Encode bytes as standard (padded) base64
pub fn to_base64(bytes: impl AsRef<[u8]>) -> String {
    STANDARD.encode(bytes)
}

pub fn from_base64(text: &str) -> Result<Vec<u8>, CodecError> {
    Ok(STANDARD.decode(text)?)
}

/// Hex encoded SHA-256 of a message
///
/// Senders attach this to chat messages so receivers can detect
/// payloads that were altered in transit.
pub fn hash(message: &str) -> String {
    let digest = Sha256::digest(message.as_bytes());
    to_hex(digest)
}

/// Gzip compress bytes and render the result as base64
pub fn compress_bytes(data: &[u8]) -> Result<String, CodecError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;
    Ok(to_base64(compressed))
}

/// Reverse of [`compress_bytes`]
pub fn decompress_bytes(data: &str) -> Result<Vec<u8>, CodecError> {
    let compressed = from_base64(data)?;
    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Gzip compress a string payload into base64 text
pub fn compress(data: &str) -> Result<String, CodecError> {
    compress_bytes(data.as_bytes())
}

/// Decompress base64 gzip text back into the original string
pub fn decompress(data: &str) -> Result<String, CodecError> {
    Ok(String::from_utf8(decompress_bytes(data)?)?)
}
