use anyhow::Result;

use arq_lab_abstract::Variant;

use crate::BuiltinProtocol;

/// Parse a user-visible protocol family name.
pub fn parse_variant(name: &str) -> Result<Variant> {
    match name.to_ascii_lowercase().as_str() {
        "gbn" | "go-back-n" => Ok(Variant::GoBackN),
        "sr" | "selective-repeat" => Ok(Variant::SelectiveRepeat),
        other => anyhow::bail!("Unknown protocol '{other}'. Try 'gbn' or 'sr'."),
    }
}

/// Map a user-visible builtin name to the enum used by the loader.
pub fn builtin_by_name(name: &str, is_sender: bool) -> Result<BuiltinProtocol> {
    let variant = parse_variant(name)?;
    Ok(if is_sender {
        BuiltinProtocol::sender_for(variant)
    } else {
        BuiltinProtocol::receiver_for(variant)
    })
}
