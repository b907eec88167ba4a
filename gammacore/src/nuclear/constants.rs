// Purpose: To store constants that are used in the program

// Germanium detector efficiency fit, ascending powers of the energy in keV
pub const GE_EFFICIENCY_COEFFICIENTS: [f64; 7] = [
    -0.00410,
    0.00014,
    -9.133059e-7,
    2.6714e-9,
    -3.9719e-12,
    2.92359e-15,
    -8.45485e-19,
];

// Ranking
pub const LEADERBOARD_CAPACITY: usize = 10;
pub const LIGHT_NUCLIDE_MASS_LIMIT: f64 = 180.0; // Unified atomic mass unit

// Nuclide identifier encodings
pub const NUCID_Z_FACTOR: i64 = 10_000_000; // zzzaaassss
pub const NUCID_A_FACTOR: i64 = 10_000;
pub const ZZAAAM_Z_FACTOR: i64 = 10_000; // zzaaam
pub const ZZAAAM_A_FACTOR: i64 = 10;
