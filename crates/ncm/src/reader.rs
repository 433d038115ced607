//! Streaming NCM reader.

use crate::cipher::{CORE_KEY, KeyBox, META_KEY, aes_decrypt};
use crate::error::{ErrorKind, Result};
use crate::metadata::Metadata;
use base64::prelude::*;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read};

const MAGIC: &[u8; 8] = b"CTENFDAM";
const KEY_PREFIX: &[u8] = b"neteasecloudmusic";
const META_PREFIX: &[u8] = b"163 key(Don't modify):";
const META_JSON_PREFIX: &[u8] = b"music:";
const KEY_XOR: u8 = 0x64;
const META_XOR: u8 = 0x63;

fn read_error(err: io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => ErrorKind::Truncated,
        _ => ErrorKind::Io,
    }
}

fn skip<R: Read>(reader: &mut R, bytes: u64) -> Result<()> {
    let skipped = io::copy(&mut reader.take(bytes), &mut io::sink()).map_err(read_error)?;
    if skipped != bytes {
        exn::bail!(ErrorKind::Truncated);
    }
    Ok(())
}

fn read_block<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let length = reader.read_u32::<LittleEndian>().map_err(read_error)?;
    // Grow as data actually arrives rather than trusting the declared length.
    let mut block = Vec::new();
    let read = reader.take(u64::from(length)).read_to_end(&mut block).map_err(read_error)?;
    if read != length as usize {
        exn::bail!(ErrorKind::Truncated);
    }
    Ok(block)
}

fn strip<'a>(data: &'a [u8], prefix: &[u8]) -> Result<&'a [u8]> {
    match data.strip_prefix(prefix) {
        Some(rest) => Ok(rest),
        None => exn::bail!(ErrorKind::Cipher),
    }
}

/// Reads the header blocks of an NCM file, then yields decrypted audio
/// through [`Read`].
///
/// Construction consumes everything up to the audio payload, so the
/// metadata and cover image are available straight away.
///
/// # Examples
///
/// ```no_run
/// use ncmdrop_ncm::NcmReader;
/// use std::fs::File;
/// use std::io::BufReader;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let file = BufReader::new(File::open("song.ncm")?);
/// let mut reader = NcmReader::new(file)?;
/// let mut out = File::create(format!("song.{}", reader.metadata().format))?;
/// std::io::copy(&mut reader, &mut out)?;
/// # Ok(())
/// # }
/// ```
pub struct NcmReader<R> {
    inner: R,
    keybox: KeyBox,
    metadata: Metadata,
    cover: Option<Vec<u8>>,
    offset: u64,
}

impl<R: Read> NcmReader<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let mut magic = [0u8; 8];
        inner.read_exact(&mut magic).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => ErrorKind::InvalidHeader,
            _ => ErrorKind::Io,
        })?;
        if &magic != MAGIC {
            exn::bail!(ErrorKind::InvalidHeader);
        }
        skip(&mut inner, 2)?;

        let keybox = Self::read_key(&mut inner)?;
        let metadata = Self::read_metadata(&mut inner)?;
        let cover = Self::read_cover(&mut inner)?;
        tracing::debug!(format = %metadata.format, cover = cover.as_ref().map_or(0, Vec::len), "NCM header read");

        Ok(Self {
            inner,
            keybox,
            metadata,
            cover,
            offset: 0,
        })
    }

    fn read_key(inner: &mut R) -> Result<KeyBox> {
        let mut block = read_block(inner)?;
        block.iter_mut().for_each(|b| *b ^= KEY_XOR);
        let decrypted = aes_decrypt(CORE_KEY, &block)?;
        KeyBox::new(strip(&decrypted, KEY_PREFIX)?)
    }

    fn read_metadata(inner: &mut R) -> Result<Metadata> {
        let mut block = read_block(inner)?;
        if block.is_empty() {
            return Ok(Metadata::default());
        }
        block.iter_mut().for_each(|b| *b ^= META_XOR);
        let encoded = strip(&block, META_PREFIX)?;
        let sealed = BASE64_STANDARD.decode(encoded).map_err(|_| ErrorKind::Cipher)?;
        let decrypted = aes_decrypt(META_KEY, &sealed)?;
        Metadata::from_json(strip(&decrypted, META_JSON_PREFIX)?)
    }

    fn read_cover(inner: &mut R) -> Result<Option<Vec<u8>>> {
        // CRC32 of something; nothing checks it.
        let _crc = inner.read_u32::<LittleEndian>().map_err(read_error)?;
        skip(inner, 5)?;
        let image = read_block(inner)?;
        Ok((!image.is_empty()).then_some(image))
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Embedded cover art, if the file has any.
    pub fn cover(&self) -> Option<&[u8]> {
        self.cover.as_deref()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for NcmReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.keybox.apply(&mut buf[..read], self.offset);
        self.offset += read as u64;
        Ok(read)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cipher::aes_encrypt;
    use byteorder::WriteBytesExt;
    use std::io::Cursor;

    /// Assemble an NCM file the way the encoder would.
    pub(crate) fn build(key: &[u8], json: Option<&str>, cover: &[u8], audio: &[u8]) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        out.extend([0x01u8, 0x70]);

        let mut key_block = aes_encrypt(CORE_KEY, &[KEY_PREFIX, key].concat());
        key_block.iter_mut().for_each(|b| *b ^= KEY_XOR);
        out.write_u32::<LittleEndian>(key_block.len() as u32).unwrap();
        out.extend(key_block);

        match json {
            Some(json) => {
                let sealed = aes_encrypt(META_KEY, &[META_JSON_PREFIX, json.as_bytes()].concat());
                let mut meta_block = [META_PREFIX, BASE64_STANDARD.encode(sealed).as_bytes()].concat();
                meta_block.iter_mut().for_each(|b| *b ^= META_XOR);
                out.write_u32::<LittleEndian>(meta_block.len() as u32).unwrap();
                out.extend(meta_block);
            },
            None => out.write_u32::<LittleEndian>(0).unwrap(),
        }

        out.write_u32::<LittleEndian>(0xDEADBEEF).unwrap();
        out.extend([0u8; 5]);
        out.write_u32::<LittleEndian>(cover.len() as u32).unwrap();
        out.extend(cover);

        let mut sealed_audio = audio.to_vec();
        KeyBox::new(key).unwrap().apply(&mut sealed_audio, 0);
        out.extend(sealed_audio);
        out
    }

    fn audio_sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn test_decode() {
        let audio = audio_sample(70_000);
        let cover = b"\x89PNG\r\n\x1a\nfake";
        let data = build(b"123456789012345678901234", Some(r#"{"format":"flac","musicName":"Song"}"#), cover, &audio);
        let mut reader = NcmReader::new(Cursor::new(data)).unwrap();
        assert_eq!(reader.metadata().format, "flac");
        assert_eq!(reader.metadata().music_name.as_deref(), Some("Song"));
        assert_eq!(reader.cover(), Some(cover.as_slice()));
        let mut decoded = Vec::new();
        reader.read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, audio);
    }

    #[test]
    fn test_decode_with_small_reads() {
        let audio = audio_sample(1000);
        let data = build(b"key", Some(r#"{"format":"mp3"}"#), b"", &audio);
        let mut reader = NcmReader::new(Cursor::new(data)).unwrap();
        let mut decoded = Vec::new();
        let mut buf = [0u8; 37];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            decoded.extend_from_slice(&buf[..n]);
        }
        assert_eq!(decoded, audio);
        assert_eq!(reader.cover(), None);
    }

    #[test]
    fn test_empty_metadata_block() {
        let data = build(b"key", None, b"", b"audio");
        let reader = NcmReader::new(Cursor::new(data)).unwrap();
        assert_eq!(reader.metadata(), &Metadata::default());
    }

    #[test]
    fn test_bad_magic() {
        let mut data = build(b"key", None, b"", b"audio");
        data[0] = b'X';
        let err = NcmReader::new(Cursor::new(data)).err().unwrap();
        assert_eq!(*err, ErrorKind::InvalidHeader);
        let err = NcmReader::new(Cursor::new(b"CTEN".to_vec())).err().unwrap();
        assert_eq!(*err, ErrorKind::InvalidHeader);
    }

    #[test]
    fn test_truncated_header() {
        let data = build(b"key", Some(r#"{"format":"mp3"}"#), b"cover", b"");
        for cut in [12, 40, data.len() - 3] {
            let err = NcmReader::new(Cursor::new(data[..cut].to_vec())).err().unwrap();
            assert!(matches!(*err, ErrorKind::Truncated), "cut at {cut}: {:?}", *err);
        }
    }

    #[test]
    fn test_corrupt_key_block() {
        let mut data = build(b"key", None, b"", b"audio");
        // First byte of the encrypted key block.
        data[14] ^= 0xFF;
        let err = NcmReader::new(Cursor::new(data)).err().unwrap();
        assert_eq!(*err, ErrorKind::Cipher);
    }
}
