use core::{fmt::Debug, hash::Hash, num::NonZeroU64};

use nonzero_ext::nonzero;
use strum::{Display, EnumString};
use typenum::{NonZero, Unsigned, U128, U2048, U32, U8};

/// Compile-time configuration variables.
///
/// Only the variables that fork choice and attestation aggregation depend on are included.
pub trait Preset: Copy + Eq + Ord + Hash + Default + Debug + Send + Sync + 'static {
    type MaxAttestations: Unsigned + NonZero + Debug + Send + Sync;
    type MaxValidatorsPerCommittee: Unsigned + NonZero + Eq + Ord + Debug + Send + Sync;
    type SlotsPerEpoch: Unsigned + NonZero + Debug + Send + Sync;

    const NAME: PresetName;
    const MAX_COMMITTEES_PER_SLOT: NonZeroU64;
}

/// [Mainnet preset](https://github.com/ethereum/consensus-specs/tree/dev/presets/mainnet).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Mainnet;

impl Preset for Mainnet {
    type MaxAttestations = U128;
    type MaxValidatorsPerCommittee = U2048;
    type SlotsPerEpoch = U32;

    const NAME: PresetName = PresetName::Mainnet;
    const MAX_COMMITTEES_PER_SLOT: NonZeroU64 = nonzero!(64_u64);
}

/// [Minimal preset](https://github.com/ethereum/consensus-specs/tree/dev/presets/minimal).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Minimal;

impl Preset for Minimal {
    type MaxAttestations = U128;
    type MaxValidatorsPerCommittee = U2048;
    type SlotsPerEpoch = U8;

    const NAME: PresetName = PresetName::Minimal;
    const MAX_COMMITTEES_PER_SLOT: NonZeroU64 = nonzero!(4_u64);
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PresetName {
    Mainnet,
    Minimal,
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("mainnet" => Ok(PresetName::Mainnet))]
    #[test_case("minimal" => Ok(PresetName::Minimal))]
    #[test_case("gnosis" => Err(strum::ParseError::VariantNotFound))]
    fn preset_name_parses_lowercase(name: &str) -> Result<PresetName, strum::ParseError> {
        name.parse()
    }

    #[test]
    fn preset_names_match_presets() {
        assert_eq!(Mainnet::NAME.to_string(), "mainnet");
        assert_eq!(Minimal::NAME.to_string(), "minimal");
        assert_eq!(<Mainnet as Preset>::SlotsPerEpoch::U64, 32);
        assert_eq!(<Minimal as Preset>::SlotsPerEpoch::U64, 8);
    }
}
