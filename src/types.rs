use crate::error::Error;

pub type SequenceNumber = u64;
pub const MAX_SEQUENCE_NUMBER: SequenceNumber = (1 << 56) - 1;

/// Tag stored alongside the sequence number in every internal key, telling
/// readers how to interpret the value that follows.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueType {
    Deletion = 0,
    Value = 1,
    /// The value is redirected through a large-value reference record
    /// rather than stored inline.
    LargeValueRef = 2,
}

/// Sentinel used when constructing a seek key: numerically larger than any
/// real value type, so that `InternalKeyComparator::compare` places the
/// lookup key before every real entry for the same user key and sequence
/// number.
pub const VALUE_TYPE_FOR_SEEK: u8 = ValueType::LargeValueRef as u8;

impl TryFrom<u8> for ValueType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0u8 => Ok(ValueType::Deletion),
            1u8 => Ok(ValueType::Value),
            2u8 => Ok(ValueType::LargeValueRef),
            _ => Err(Error::Corruption("wrong tag type".into())),
        }
    }
}
