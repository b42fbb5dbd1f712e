//! Large-value references: when a value exceeds a size threshold it is
//! written to its own content-addressed file instead of being stored
//! inline in an SSTable, and a short reference record is stored in its
//! place.

use sha1::{Digest, Sha1};

use crate::{
    codec::{NumberDecoder, NumberEncoder},
    error::{Error, Result},
    options::Compress,
};

pub const LARGE_VALUE_REF_SIZE: usize = 20 + 8 + 1;

/// A reference to a value stored out-of-line: its content hash, size and
/// the compression applied to the referenced file's contents.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LargeValueRef {
    pub sha1: [u8; 20],
    pub size: u64,
    pub ctype: Compress,
}

impl LargeValueRef {
    pub fn make(value: &[u8], ctype: Compress) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(value);
        let digest = hasher.finalize();
        let mut sha1 = [0u8; 20];
        sha1.copy_from_slice(&digest);

        LargeValueRef {
            sha1,
            size: value.len() as u64,
            ctype,
        }
    }

    pub fn encode(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(&self.sha1);
        dst.encode_u64_le(self.size).unwrap();
        dst.encode_u8(self.ctype.as_byte()).unwrap();
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < LARGE_VALUE_REF_SIZE {
            return Err(Error::Corruption("truncated large value ref".into()));
        }
        let mut sha1 = [0u8; 20];
        sha1.copy_from_slice(&data[..20]);
        let mut rest = &data[20..];
        let size = rest.decode_u64_le()?;
        let ctype_byte = rest.decode_u8()?;
        let ctype = Compress::try_from(ctype_byte)
            .map_err(|_| Error::Corruption("bad large value ref compression type".into()))?;

        Ok(LargeValueRef { sha1, size, ctype })
    }

    /// Renders the reference as the on-disk filename used to store the
    /// large value: `hex(sha1)-size-ctype`.
    pub fn as_filename(&self) -> String {
        let mut hex = String::with_capacity(40);
        for b in self.sha1.iter() {
            hex.push_str(&format!("{:02x}", b));
        }
        format!("{}-{}-{}", hex, self.size, self.ctype.as_byte())
    }

    /// Parses a filename produced by [`as_filename`](Self::as_filename)
    /// back into a reference. Returns `None` for names that don't match
    /// the expected shape, so callers can treat unrecognized files as
    /// "other" rather than erroring.
    pub fn from_filename(name: &str) -> Option<Self> {
        let mut parts = name.splitn(3, '-');
        let hex = parts.next()?;
        let size = parts.next()?;
        let ctype = parts.next()?;
        if hex.len() != 40 {
            return None;
        }

        let mut sha1 = [0u8; 20];
        for (i, byte) in sha1.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        let size: u64 = size.parse().ok()?;
        let ctype_byte: u8 = ctype.parse().ok()?;
        let ctype = Compress::try_from(ctype_byte).ok()?;

        Some(LargeValueRef { sha1, size, ctype })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_and_round_trip() {
        let value = b"a value large enough to be redirected out of line";
        let r = LargeValueRef::make(value, Compress::NO);
        assert_eq!(r.size, value.len() as u64);

        let mut buf = Vec::new();
        r.encode(&mut buf);
        assert_eq!(buf.len(), LARGE_VALUE_REF_SIZE);
        let decoded = LargeValueRef::decode(&buf).unwrap();
        assert_eq!(decoded, r);
    }

    #[test]
    fn test_filename_round_trip() {
        let value = b"another value";
        let r = LargeValueRef::make(value, Compress::Snappy);
        let name = r.as_filename();
        let back = LargeValueRef::from_filename(&name).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_from_filename_rejects_garbage() {
        assert!(LargeValueRef::from_filename("not-a-large-value-name").is_none());
        assert!(LargeValueRef::from_filename("000000-12-0").is_none());
    }
}
