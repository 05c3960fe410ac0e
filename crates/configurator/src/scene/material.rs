//! Surface materials and paint colors.

use crate::error::ColorError;

/// Linear-space RGB color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parse a `#rrggbb` sRGB string into linear space.
    pub fn from_hex(hex: &str) -> Result<Self, ColorError> {
        let digits = hex.trim().strip_prefix('#').unwrap_or(hex.trim());
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(ColorError::Invalid(hex.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map(|v| srgb_to_linear(v as f32 / 255.0))
                .map_err(|_| ColorError::Invalid(hex.to_string()))
        };
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }

    /// Format as a `#rrggbb` sRGB string.
    pub fn to_hex(&self) -> String {
        let q = |c: f32| (linear_to_srgb(c.clamp(0.0, 1.0)) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", q(self.r), q(self.g), q(self.b))
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c < 0.04045 {
        c * 0.0773993808
    } else {
        (c * 0.9478672986 + 0.0521327014).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c < 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Which faces a material renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    #[default]
    Front,
    Double,
}

/// PBR metallic-roughness material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub color: Color,
    pub opacity: f32,
    pub metallic: f32,
    pub roughness: f32,
    pub side: Side,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: Color::WHITE,
            opacity: 1.0,
            metallic: 0.0,
            roughness: 1.0,
            side: Side::Front,
        }
    }
}

impl Material {
    pub fn named(name: &str, color: Color) -> Self {
        Self {
            name: name.to_string(),
            color,
            ..Default::default()
        }
    }

    pub fn is_double_sided(&self) -> bool {
        self.side == Side::Double
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        for hex in ["#e20407", "#e7e9ef", "#09090e", "#0280c2", "#000000", "#ffffff"] {
            let c = Color::from_hex(hex).unwrap();
            assert_eq!(c.to_hex(), hex);
        }
    }

    #[test]
    fn test_hex_without_hash_and_uppercase() {
        assert_eq!(Color::from_hex("E20407").unwrap().to_hex(), "#e20407");
    }

    #[test]
    fn test_hex_invalid() {
        assert!(Color::from_hex("#e2040").is_err());
        assert!(Color::from_hex("#zzzzzz").is_err());
        assert!(Color::from_hex("red").is_err());
    }

    #[test]
    fn test_linear_conversion() {
        let white = Color::from_hex("#ffffff").unwrap();
        assert!((white.r - 1.0).abs() < 1e-5);
        let mid = Color::from_hex("#808080").unwrap();
        assert!(mid.r < 0.5, "sRGB mid-gray is darker in linear space");
    }
}
