//! PDG particle-code helpers.

pub const ELECTRON: i32 = 11;
pub const NU_E: i32 = 12;
pub const MUON: i32 = 13;
pub const NU_MU: i32 = 14;
pub const NU_TAU: i32 = 16;
pub const PHOTON: i32 = 22;
pub const PION: i32 = 211;
pub const KAON: i32 = 321;
pub const PROTON: i32 = 2212;

pub fn is_neutrino(pdg_code: i32) -> bool {
    matches!(pdg_code.abs(), NU_E | NU_MU | NU_TAU)
}

/// Electromagnetic particles that develop into showers.
pub fn is_electromagnetic(pdg_code: i32) -> bool {
    matches!(pdg_code.abs(), ELECTRON | PHOTON)
}
