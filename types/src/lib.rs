pub mod bit_list;
pub mod preset;
pub mod traits;

pub mod phase0 {
    pub mod consts;
    pub mod containers;
    pub mod primitives;

    mod container_impls;
}
