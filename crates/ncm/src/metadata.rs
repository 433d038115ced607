//! Track metadata carried in the encrypted JSON block.

use crate::error::{ErrorKind, Result};
use serde::Deserialize;

/// The subset of the metadata block this crate understands.
///
/// Unknown keys are ignored. Only [`format`](Self::format) is needed to
/// write the audio out; the rest is informational.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Container of the decrypted audio, used as the output extension
    /// (`mp3`, `flac`, ...).
    #[serde(default = "default_format")]
    pub format: String,
    pub music_name: Option<String>,
    pub album: Option<String>,
}

fn default_format() -> String {
    "mp3".to_string()
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            format: default_format(),
            music_name: None,
            album: None,
        }
    }
}

impl Metadata {
    /// Parse the decrypted JSON document and check the format is safe to
    /// use as a file extension.
    pub(crate) fn from_json(json: &[u8]) -> Result<Self> {
        let metadata: Self =
            serde_json::from_slice(json).map_err(|e| ErrorKind::Metadata(format!("malformed JSON: {e}")))?;
        if metadata.format.is_empty() || !metadata.format.chars().all(|c| c.is_ascii_alphanumeric()) {
            exn::bail!(ErrorKind::Metadata(format!("unusable format {:?}", metadata.format)));
        }
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse() {
        let json = br#"{"musicId":1,"musicName":"Song","album":"Record","artist":[["A",1]],"format":"flac","bitrate":999000}"#;
        let metadata = Metadata::from_json(json).unwrap();
        assert_eq!(metadata.format, "flac");
        assert_eq!(metadata.music_name.as_deref(), Some("Song"));
        assert_eq!(metadata.album.as_deref(), Some("Record"));
    }

    #[test]
    fn test_missing_format_defaults_to_mp3() {
        let metadata = Metadata::from_json(br#"{"musicName":"Song"}"#).unwrap();
        assert_eq!(metadata.format, "mp3");
    }

    #[rstest]
    #[case(br#"{"format":""}"#.as_slice())]
    #[case(br#"{"format":"../../etc"}"#.as_slice())]
    #[case(br#"{"format":"mp3 "}"#.as_slice())]
    #[case(b"not json".as_slice())]
    fn test_rejected(#[case] json: &[u8]) {
        let err = Metadata::from_json(json).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Metadata(_)));
    }
}
