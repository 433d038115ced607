//! Decoder for NCM encrypted audio containers.
//!
//! An NCM file wraps an ordinary audio file (usually MP3 or FLAC) in three
//! layers: an AES-wrapped per-file key, an AES-wrapped JSON metadata block,
//! and an RC4-derived keystream over the audio itself. Cover art sits in the
//! clear between the metadata and the audio.
//!
//! - [`NcmReader`] parses the header and decrypts the audio as it is read.
//! - [`dump`] writes the audio (and cover art, if any) next to each other in
//!   an output directory.

mod cipher;
pub mod error;
mod metadata;
mod reader;

pub use crate::metadata::Metadata;
pub use crate::reader::NcmReader;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Files written by a successful [`dump`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dumped {
    pub audio: PathBuf,
    pub cover: Option<PathBuf>,
}

fn output_path(dir: &Path, stem: &OsStr, extension: &str) -> PathBuf {
    // Not `Path::with_extension`; stems may contain dots of their own.
    let mut name = stem.to_os_string();
    name.push(".");
    name.push(extension);
    dir.join(name)
}

fn image_extension(image: &[u8]) -> &'static str {
    match image {
        [0xFF, 0xD8, 0xFF, ..] => "jpg",
        _ => "png",
    }
}

/// Decode the NCM file at `path` into `output_dir`.
///
/// The audio lands at `<output_dir>/<stem>.<format>`, and cover art (when
/// present) at `<output_dir>/<stem>.jpg` or `.png` depending on its magic
/// bytes. Existing files are overwritten.
///
/// # Errors
/// Anything from [`ErrorKind`]. Partially written output is left in place.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn dump(path: &Path, output_dir: &Path) -> Result<Dumped> {
    let Some(stem) = path.file_stem() else {
        exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
    };
    let file = File::open(path).or_raise(|| ErrorKind::Io)?;
    let mut reader = NcmReader::new(BufReader::new(file))?;

    let cover = match reader.cover() {
        Some(image) => {
            let cover_path = output_path(output_dir, stem, image_extension(image));
            fs::write(&cover_path, image).or_raise(|| ErrorKind::Io)?;
            Some(cover_path)
        },
        None => None,
    };

    let audio = output_path(output_dir, stem, &reader.metadata().format);
    let mut writer = BufWriter::new(File::create(&audio).or_raise(|| ErrorKind::Io)?);
    let bytes = io::copy(&mut reader, &mut writer).or_raise(|| ErrorKind::Io)?;
    writer.flush().or_raise(|| ErrorKind::Io)?;
    tracing::debug!(audio = %audio.display(), bytes, "NCM file dumped");

    Ok(Dumped { audio, cover })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::tests::build;
    use rstest::rstest;

    #[rstest]
    #[case(&[0xFF, 0xD8, 0xFF, 0xE0], "jpg")]
    #[case(b"\x89PNG\r\n\x1a\n", "png")]
    #[case(&[], "png")]
    fn test_image_extension(#[case] image: &[u8], #[case] expected: &str) {
        assert_eq!(image_extension(image), expected);
    }

    #[test]
    fn test_output_path_keeps_dots() {
        let path = output_path(Path::new("/out"), OsStr::new("Artist - Song.live"), "flac");
        assert_eq!(path, Path::new("/out/Artist - Song.live.flac"));
    }

    #[test]
    fn test_dump() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let audio: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
        let cover = [0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3];
        let source = input.path().join("Song.ncm");
        fs::write(&source, build(b"a key", Some(r#"{"format":"flac"}"#), &cover, &audio)).unwrap();

        let dumped = dump(&source, output.path()).unwrap();
        assert_eq!(dumped.audio, output.path().join("Song.flac"));
        assert_eq!(dumped.cover, Some(output.path().join("Song.jpg")));
        assert_eq!(fs::read(&dumped.audio).unwrap(), audio);
        assert_eq!(fs::read(output.path().join("Song.jpg")).unwrap(), cover);
    }

    #[test]
    fn test_dump_without_cover() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let source = input.path().join("plain.ncm");
        fs::write(&source, build(b"a key", None, b"", b"audio bytes")).unwrap();

        let dumped = dump(&source, output.path()).unwrap();
        assert_eq!(dumped.cover, None);
        assert_eq!(dumped.audio, output.path().join("plain.mp3"));
        assert_eq!(fs::read(&dumped.audio).unwrap(), b"audio bytes");
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_dump_missing_input() {
        let output = tempfile::tempdir().unwrap();
        let err = dump(Path::new("/definitely/not/here.ncm"), output.path()).unwrap_err();
        assert_eq!(*err, ErrorKind::Io);
    }

    #[test]
    fn test_dump_not_ncm() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let source = input.path().join("fake.ncm");
        fs::write(&source, b"ID3 this is an mp3").unwrap();
        let err = dump(&source, output.path()).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidHeader);
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
    }
}
