//! Encryption transform
//!
//! Composable streaming pipeline between plaintext and swarm artifact:
//!
//! - publish direction: read plaintext → gzip → AES-128-CBC encrypt → artifact
//! - fetch direction:   read artifact → AES-128-CBC decrypt → gunzip → plaintext
//!
//! Both directions run over bounded buffers so file size never bounds
//! memory. Output is staged at a `.part` path next to the destination and
//! renamed into place on success; every failure path removes the partial
//! file, so no half-written output is ever visible to the rest of the
//! system.
//!
//! The initialization vector is fixed and reused across all encryptions.
//! That is a known confidentiality weakness, preserved deliberately for
//! compatibility with existing artifacts; do not "fix" it without a
//! coordinated format change.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use aes::cipher::{
    block_padding::Pkcs7, generic_array::GenericArray, BlockDecryptMut, BlockEncryptMut, KeyIvInit,
};
use flate2::read::GzEncoder;
use flate2::write::GzDecoder;
use flate2::Compression;
use tracing::debug;

use crate::distributor::error::DistributorError;

use super::keys::GroupKeyRef;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// AES block size in bytes
const BLOCK: usize = 16;

/// Streaming read buffer size
const PIPE_BUF_SIZE: usize = 8 * 1024;

/// Fixed initialization vector reused across all encryptions
/// (hex "0123456789abcdef0123456789abcdef"). Compatibility constant.
pub const FIXED_IV: [u8; BLOCK] = [
    0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef,
];

/// Staged output file that is renamed into place only on commit.
///
/// Dropping without commit removes the partial file.
struct TempArtifact {
    part_path: PathBuf,
    final_path: PathBuf,
    committed: bool,
}

impl TempArtifact {
    fn new(final_path: &Path) -> Result<Self, DistributorError> {
        let name = final_path
            .file_name()
            .ok_or_else(|| DistributorError::Io(format!("bad output path: {}", final_path.display())))?;
        let mut part_name = name.to_os_string();
        part_name.push(".part");
        Ok(Self {
            part_path: final_path.with_file_name(part_name),
            final_path: final_path.to_path_buf(),
            committed: false,
        })
    }

    fn path(&self) -> &Path {
        &self.part_path
    }

    fn commit(mut self) -> Result<(), DistributorError> {
        fs::rename(&self.part_path, &self.final_path)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.part_path);
        }
    }
}

/// Compress and encrypt `input` into the artifact at `output`
pub fn encrypt_file(
    input: &Path,
    output: &Path,
    key: &GroupKeyRef,
) -> Result<(), DistributorError> {
    let source = File::open(input)?;
    let mut compressed = GzEncoder::new(BufReader::new(source), Compression::default());

    let staged = TempArtifact::new(output)?;
    let mut sink = BufWriter::new(File::create(staged.path())?);

    let mut cipher = Aes128CbcEnc::new(&key.symmetric_key.into(), &FIXED_IV.into());
    let mut buf = [0u8; PIPE_BUF_SIZE];
    let mut pending: Vec<u8> = Vec::with_capacity(PIPE_BUF_SIZE + BLOCK);

    loop {
        let n = compressed.read(&mut buf)?;
        if n == 0 {
            break;
        }
        pending.extend_from_slice(&buf[..n]);

        // Encrypt every complete block, keep the tail for the next read
        let full = (pending.len() / BLOCK) * BLOCK;
        if full > 0 {
            for block in pending[..full].chunks_exact_mut(BLOCK) {
                cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
            }
            sink.write_all(&pending[..full])?;
            pending.drain(..full);
        }
    }

    // Final partial (possibly empty) block gets PKCS#7 padding
    let tail_len = pending.len();
    let mut last = [0u8; BLOCK];
    last[..tail_len].copy_from_slice(&pending);
    let padded = cipher
        .encrypt_padded_mut::<Pkcs7>(&mut last, tail_len)
        .map_err(|_| DistributorError::Io("encryption padding failed".to_string()))?;
    sink.write_all(padded)?;
    sink.flush()?;
    drop(sink);

    staged.commit()?;
    debug!(input = %input.display(), output = %output.display(), "artifact encrypted");
    Ok(())
}

/// Decrypt and decompress the artifact at `input` into `output`
pub fn decrypt_file(
    input: &Path,
    output: &Path,
    key: &GroupKeyRef,
) -> Result<(), DistributorError> {
    let mut source = BufReader::new(File::open(input)?);

    let staged = TempArtifact::new(output)?;
    let sink = BufWriter::new(File::create(staged.path())?);
    let mut decompressor = GzDecoder::new(sink);

    let mut cipher = Aes128CbcDec::new(&key.symmetric_key.into(), &FIXED_IV.into());
    let mut buf = [0u8; PIPE_BUF_SIZE];
    let mut pending: Vec<u8> = Vec::with_capacity(PIPE_BUF_SIZE + BLOCK);

    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            break;
        }
        pending.extend_from_slice(&buf[..n]);

        // Decrypt complete blocks but always hold the last one back: it may
        // be the padded final block, which needs special handling at EOF.
        if pending.len() > BLOCK {
            let take = ((pending.len() - BLOCK) / BLOCK) * BLOCK;
            if take > 0 {
                for block in pending[..take].chunks_exact_mut(BLOCK) {
                    cipher.decrypt_block_mut(GenericArray::from_mut_slice(block));
                }
                decompressor
                    .write_all(&pending[..take])
                    .map_err(|e| DistributorError::DecodeFailure(e.to_string()))?;
                pending.drain(..take);
            }
        }
    }

    if pending.len() != BLOCK {
        return Err(DistributorError::DecodeFailure(format!(
            "truncated ciphertext: {} trailing bytes",
            pending.len()
        )));
    }

    let plain = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut pending)
        .map_err(|_| DistributorError::DecodeFailure("invalid padding".to_string()))?;
    decompressor
        .write_all(plain)
        .map_err(|e| DistributorError::DecodeFailure(e.to_string()))?;

    let mut sink = decompressor
        .finish()
        .map_err(|e| DistributorError::DecodeFailure(e.to_string()))?;
    sink.flush()?;
    drop(sink);

    staged.commit()?;
    debug!(input = %input.display(), output = %output.display(), "artifact decrypted");
    Ok(())
}
