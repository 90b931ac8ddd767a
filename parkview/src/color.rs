/// Display color of inspector elements, e.g. style preset buttons.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Color {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl Color {
    /// White color: `#FFFFFFFF`
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    /// Black color: `#000000FF`
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);

    /// Constructs color from its RGBA channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses a color from `#RRGGBB` or `#RRGGBBAA` in a const context.
    ///
    /// # Panics
    ///
    /// Panics if the string is not a valid hex color. Intended for compile-time constants, use
    /// [`Color::parse_hex`] for anything coming from the outside.
    pub const fn from_hex(hex: &'static str) -> Self {
        let bytes = hex.as_bytes();
        if (bytes.len() != 7 && bytes.len() != 9) || bytes[0] != b'#' {
            panic!("invalid color hex string");
        }

        let a = if bytes.len() == 9 {
            hex_pair(bytes[7], bytes[8])
        } else {
            255
        };

        Self {
            r: hex_pair(bytes[1], bytes[2]),
            g: hex_pair(bytes[3], bytes[4]),
            b: hex_pair(bytes[5], bytes[6]),
            a,
        }
    }

    /// Parses a color from `#RRGGBB` or `#RRGGBBAA`. Returns `None` for anything else.
    pub fn parse_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if (digits.len() != 6 && digits.len() != 8) || !digits.is_ascii() {
            return None;
        }

        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        let a = if digits.len() == 8 { channel(6)? } else { 255 };

        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a,
        })
    }

    /// RGBA channels.
    pub fn to_u8_array(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

const fn hex_pair(high: u8, low: u8) -> u8 {
    hex_digit(high) * 16 + hex_digit(low)
}

const fn hex_digit(byte: u8) -> u8 {
    match byte {
        b'0'..=b'9' => byte - b'0',
        b'a'..=b'f' => byte - b'a' + 10,
        b'A'..=b'F' => byte - b'A' + 10,
        _ => panic!("invalid hex character"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_and_runtime_parsing_agree() {
        const VELVET: Color = Color::from_hex("#7c3aed");
        assert_eq!(Color::parse_hex("#7C3AED"), Some(VELVET));
        assert_eq!(VELVET.to_u8_array(), [0x7c, 0x3a, 0xed, 255]);
    }

    #[test]
    fn alpha_is_kept() {
        let color = Color::parse_hex("#FF1000AA").expect("valid color");
        assert_eq!(color.to_u8_array(), [0xFF, 0x10, 0x00, 0xAA]);
    }

    #[test]
    fn invalid_strings_are_rejected() {
        assert_eq!(Color::parse_hex("7c3aed"), None);
        assert_eq!(Color::parse_hex("#7c3ae"), None);
        assert_eq!(Color::parse_hex("#zz3aed"), None);
        assert_eq!(Color::parse_hex("#ééé"), None);
    }
}
