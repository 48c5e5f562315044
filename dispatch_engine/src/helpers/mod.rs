mod handoff_code;

pub use handoff_code::{generate_handoff_code, is_well_formed_handoff_code};
