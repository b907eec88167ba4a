// Element symbols ordered by atomic number, ELEMENT_SYMBOLS[z - 1]
pub const ELEMENT_SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne",
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca",
    "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn",
    "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr",
    "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn",
    "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd",
    "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th",
    "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm",
    "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds",
    "Rg", "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// get the element symbol for an atomic number
///
/// Arguments:
///
/// * `z` - atomic number
///
/// Returns:
///
/// * `Option<&'static str>` - the symbol, `None` outside 1..=118
///
/// # Examples
///
/// ```
/// use gammacore::nuclear::elements::element_symbol;
///
/// assert_eq!(element_symbol(19), Some("K"));
/// assert_eq!(element_symbol(0), None);
/// ```
pub fn element_symbol(z: u32) -> Option<&'static str> {
    if z == 0 {
        return None;
    }
    ELEMENT_SYMBOLS.get(z as usize - 1).copied()
}

/// get the atomic number for an element symbol, ignoring case
///
/// Arguments:
///
/// * `symbol` - element symbol, e.g. `"Cs"` or `"cs"`
///
/// Returns:
///
/// * `Option<u32>` - the atomic number, `None` for unknown symbols
///
/// # Examples
///
/// ```
/// use gammacore::nuclear::elements::atomic_number;
///
/// assert_eq!(atomic_number("Cs"), Some(55));
/// assert_eq!(atomic_number("cs"), Some(55));
/// assert_eq!(atomic_number("Xx"), None);
/// ```
pub fn atomic_number(symbol: &str) -> Option<u32> {
    ELEMENT_SYMBOLS
        .iter()
        .position(|s| s.eq_ignore_ascii_case(symbol))
        .map(|index| index as u32 + 1)
}
