//! Container tags and magic-byte sniffing

use serde::{Deserialize, Serialize};
use std::fmt;

/// Audio container/codec tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// RIFF/WAVE PCM
    Wav,
    /// MPEG-1/2 Layer III
    Mp3,
    /// Free Lossless Audio Codec
    Flac,
    /// Ogg (Vorbis)
    Ogg,
    /// AAC in ADTS or MP4
    Aac,
}

impl Container {
    /// Usual file extension
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Wav => "wav",
            Container::Mp3 => "mp3",
            Container::Flac => "flac",
            Container::Ogg => "ogg",
            Container::Aac => "m4a",
        }
    }

    /// Map a file extension (case-insensitive, without the dot) to a container
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Some(Container::Wav),
            "mp3" => Some(Container::Mp3),
            "flac" => Some(Container::Flac),
            "ogg" | "oga" => Some(Container::Ogg),
            "aac" | "m4a" | "mp4" => Some(Container::Aac),
            _ => None,
        }
    }

    /// Guess the container from the leading bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            return Some(Container::Wav);
        }
        if bytes.starts_with(b"fLaC") {
            return Some(Container::Flac);
        }
        if bytes.starts_with(b"OggS") {
            return Some(Container::Ogg);
        }
        if bytes.starts_with(b"ID3") {
            return Some(Container::Mp3);
        }
        if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            return Some(Container::Aac);
        }
        if bytes.len() >= 2 && bytes[0] == 0xFF {
            // 12-bit frame sync; layer bits tell MP3 (layer III) from ADTS (layer 0)
            match bytes[1] & 0xF6 {
                0xF0 => return Some(Container::Aac),
                b if b & 0xE0 == 0xE0 && (bytes[1] >> 1) & 0x03 == 0x01 => {
                    return Some(Container::Mp3)
                }
                _ => {}
            }
        }
        None
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_wav() {
        let mut header = b"RIFF".to_vec();
        header.extend_from_slice(&[0, 0, 0, 0]);
        header.extend_from_slice(b"WAVE");
        assert_eq!(Container::sniff(&header), Some(Container::Wav));
    }

    #[test]
    fn test_sniff_others() {
        assert_eq!(Container::sniff(b"fLaC\0\0\0\""), Some(Container::Flac));
        assert_eq!(Container::sniff(b"OggS\0\x02"), Some(Container::Ogg));
        assert_eq!(Container::sniff(b"ID3\x04\0"), Some(Container::Mp3));
        assert_eq!(Container::sniff(&[0xFF, 0xFB, 0x90, 0x64]), Some(Container::Mp3));
        assert_eq!(Container::sniff(&[0xFF, 0xF1, 0x50, 0x80]), Some(Container::Aac));
        assert_eq!(Container::sniff(b"\0\0\0\x20ftypM4A "), Some(Container::Aac));
    }

    #[test]
    fn test_sniff_unknown() {
        assert_eq!(Container::sniff(&[0x13; 64]), None);
        assert_eq!(Container::sniff(&[]), None);
    }

    #[test]
    fn test_extensions() {
        assert_eq!(Container::from_extension("WAV"), Some(Container::Wav));
        assert_eq!(Container::from_extension("m4a"), Some(Container::Aac));
        assert_eq!(Container::from_extension("txt"), None);
        assert_eq!(Container::Mp3.to_string(), "mp3");
    }
}
