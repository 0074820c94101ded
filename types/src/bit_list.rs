use core::{
    fmt::{Debug, Formatter, Result as FmtResult},
    marker::PhantomData,
    ops::BitOrAssign,
};

use bitvec::{bitbox, boxed::BitBox, order::Lsb0};
use derivative::Derivative;
use derive_more::Deref;
use static_assertions::assert_eq_size;
use thiserror::Error;
use typenum::{Unsigned, U2048};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum BitListError {
    #[error("bit list is too long (maximum: {maximum}, actual: {actual})")]
    TooLong { maximum: usize, actual: usize },
    #[error("bit index {index} is out of bounds for bit list of length {length}")]
    IndexOutOfBounds { index: usize, length: usize },
}

/// A variable-length bitfield with a maximum length of `N` bits.
///
/// Used for `Attestation.aggregation_bits`. Operations that combine 2 bit lists
/// require them to have the same length. Bit lists of different lengths come from
/// different committees and are never compared.
#[derive(Deref, Derivative)]
#[derivative(
    Clone(bound = ""),
    PartialEq(bound = ""),
    Eq(bound = ""),
    Hash(bound = ""),
    Default(bound = "")
)]
pub struct BitList<N> {
    // We rely on `bitvec::order::Lsb0` being the default bit ordering.
    // Comparisons of raw bytes below assume unused bits in the last byte are cleared.
    #[deref]
    bits: BitBox<u8>,
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    phantom: PhantomData<N>,
}

// The `U2048` is in reference to `MaxValidatorsPerCommittee`.
assert_eq_size!(BitList<U2048>, [usize; 2]);

impl<N: Unsigned, const SIZE: usize> TryFrom<[bool; SIZE]> for BitList<N> {
    type Error = BitListError;

    fn try_from(bits: [bool; SIZE]) -> Result<Self, Self::Error> {
        let mut bit_list = Self::with_length(SIZE)?;

        for (index, bit) in bits.into_iter().enumerate() {
            bit_list.bits.set(index, bit);
        }

        Ok(bit_list)
    }
}

impl<N> BitOrAssign<&Self> for BitList<N> {
    fn bitor_assign(&mut self, other: &Self) {
        assert_eq!(self.len(), other.len());

        self.bits |= &other.bits;
    }
}

impl<N> Debug for BitList<N> {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        formatter.write_str("0b")?;

        for bit in self.iter().by_vals() {
            formatter.write_str(if bit { "1" } else { "0" })?;
        }

        Ok(())
    }
}

impl<N> BitList<N> {
    pub fn with_length(length: usize) -> Result<Self, BitListError>
    where
        N: Unsigned,
    {
        let maximum = N::USIZE;

        if length > maximum {
            return Err(BitListError::TooLong {
                maximum,
                actual: length,
            });
        }

        let mut bits = bitbox![u8, Lsb0; 0; length];
        bits.fill_uninitialized(false);

        Ok(Self {
            bits,
            phantom: PhantomData,
        })
    }

    /// Returns a bit list of `length` bits with only the bit at `index` set.
    pub fn single(length: usize, index: usize) -> Result<Self, BitListError>
    where
        N: Unsigned,
    {
        let mut bit_list = Self::with_length(length)?;
        bit_list.set(index, true)?;
        Ok(bit_list)
    }

    pub fn set(&mut self, index: usize, value: bool) -> Result<(), BitListError> {
        let length = self.len();

        if index >= length {
            return Err(BitListError::IndexOutOfBounds { index, length });
        }

        self.bits.set(index, value);

        Ok(())
    }

    #[must_use]
    pub fn any_not_in(&self, other: &Self) -> bool {
        assert_eq!(self.len(), other.len());

        core::iter::zip(self.as_raw_slice(), other.as_raw_slice())
            .any(|(byte, other_byte)| byte & !other_byte > 0)
    }

    #[must_use]
    pub fn any_in_common(&self, other: &Self) -> bool {
        assert_eq!(self.len(), other.len());

        core::iter::zip(self.as_raw_slice(), other.as_raw_slice())
            .any(|(byte, other_byte)| (byte & other_byte) > 0)
    }

    /// Returns `true` if every bit set in `self` is also set in `other`.
    ///
    /// Bit lists of different lengths are never subsets of each other.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.len() == other.len() && !self.any_not_in(other)
    }
}
