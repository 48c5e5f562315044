use rand::Rng;

/// A fresh four-digit handoff code, 1000 to 9999 inclusive.
pub fn generate_handoff_code() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

pub fn is_well_formed_handoff_code(code: &str) -> bool {
    code.len() == 4 && code.bytes().all(|b| b.is_ascii_digit()) && !code.starts_with('0')
}
