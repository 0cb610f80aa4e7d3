//! Content digests of package artifacts.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::Md5;
use sha2::{Digest, Sha256};

const CHUNK_SIZE: usize = 4096;

/// Lowercase hex digest of everything `reader` yields, read in 4 KiB chunks.
pub fn digest_reader<D: Digest>(reader: &mut impl Read) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hex(&hasher.finalize()))
}

pub fn sha256_reader(reader: &mut impl Read) -> io::Result<String> {
    digest_reader::<Sha256>(reader)
}

pub fn sha256_file(path: &Path) -> io::Result<String> {
    digest_reader::<Sha256>(&mut File::open(path)?)
}

pub fn md5_reader(reader: &mut impl Read) -> io::Result<String> {
    digest_reader::<Md5>(reader)
}

pub fn md5_file(path: &Path) -> io::Result<String> {
    digest_reader::<Md5>(&mut File::open(path)?)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
