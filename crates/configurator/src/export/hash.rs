//! Content address of a configuration
//!
//! The canonical form is the compact JSON of
//! `{"color":…,"replacedParts":[…],"hiddenParts":[…]}` with both lists
//! sorted, reduced by the `h * 31 + c` rolling hash over UTF-16 code units
//! with 32-bit wrap-around, and printed as the lower-case hex of its
//! absolute value.

use serde::Serialize;

use crate::state::ConfigurationState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalConfig<'a> {
    color: &'a str,
    replaced_parts: Vec<&'a str>,
    hidden_parts: Vec<&'a str>,
}

/// Hash of a color plus the replaced/hidden identity sets. Order of the
/// inputs does not matter.
pub fn hash_configuration<S: AsRef<str>>(color: &str, replaced: &[S], hidden: &[S]) -> String {
    let mut replaced_parts: Vec<&str> = replaced.iter().map(AsRef::as_ref).collect();
    replaced_parts.sort_unstable();
    let mut hidden_parts: Vec<&str> = hidden.iter().map(AsRef::as_ref).collect();
    hidden_parts.sort_unstable();

    let canonical = CanonicalConfig {
        color,
        replaced_parts,
        hidden_parts,
    };
    // Serializing a struct of strings cannot fail
    let json = serde_json::to_string(&canonical).unwrap_or_default();
    to_hex_abs(rolling_hash(&json))
}

/// Content hash of the live configuration
pub fn compute_config_hash(state: &ConfigurationState) -> String {
    hash_configuration(&state.paint_color, &state.replaced_keys(), &state.hidden_keys())
}

fn rolling_hash(s: &str) -> i32 {
    s.encode_utf16().fold(0i32, |h, c| {
        h.wrapping_shl(5).wrapping_sub(h).wrapping_add(c as i32)
    })
}

fn to_hex_abs(h: i32) -> String {
    format!("{:x}", (h as i64).abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_hash_known_values() {
        assert_eq!(rolling_hash(""), 0);
        // 'a' = 97, 97 * 31 + 98 = 3105
        assert_eq!(rolling_hash("ab"), 3105);
        assert_eq!(to_hex_abs(3105), "c21");
        assert_eq!(to_hex_abs(-3105), "c21");
        assert_eq!(to_hex_abs(i32::MIN), "80000000");
    }

    #[test]
    fn test_canonical_json_shape() {
        let canonical = CanonicalConfig {
            color: "#e20407",
            replaced_parts: vec!["a"],
            hidden_parts: vec![],
        };
        assert_eq!(
            serde_json::to_string(&canonical).unwrap(),
            r##"{"color":"#e20407","replacedParts":["a"],"hiddenParts":[]}"##
        );
    }

    #[test]
    fn test_order_invariance() {
        let a = hash_configuration("#e20407", &["x", "y"], &["p", "q", "r"]);
        let b = hash_configuration("#e20407", &["y", "x"], &["r", "p", "q"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_color_and_sets_change_hash() {
        let empty: [&str; 0] = [];
        let base = hash_configuration("#e20407", &empty, &empty);
        assert_ne!(base, hash_configuration("#e20408", &empty, &empty));
        assert_ne!(base, hash_configuration("#e20407", &["wheels"], &empty));
        // Replaced vs hidden are distinct fields
        assert_ne!(
            hash_configuration("#e20407", &["x"], &empty),
            hash_configuration("#e20407", &empty, &["x"])
        );
    }

    #[test]
    fn test_hash_is_lowercase_hex() {
        let h = hash_configuration("#ffffff", &["wheels_&_tires:Wheel_2"], &["Tire_FL"]);
        assert!(!h.is_empty());
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
