/// Three 8-bit channels in blue, green, red order.
pub type Bgr = [u8; 3];

/// Fallback for class ids without an entry in the table.
pub const DEFAULT_COLOR: Bgr = [0, 255, 0];

/// Display colors for class ids 0..=4, as hex codes.
pub const CLASS_HEX_COLORS: [&str; 5] = [
    "#000000", // black
    "#76B93E", // green
    "#FFBD59", // yellow
    "#FF1616", // red
    "#00FFFF", // cyan
];

const CLASS_COLORS: [Bgr; 5] = [
    hex_to_bgr(CLASS_HEX_COLORS[0]),
    hex_to_bgr(CLASS_HEX_COLORS[1]),
    hex_to_bgr(CLASS_HEX_COLORS[2]),
    hex_to_bgr(CLASS_HEX_COLORS[3]),
    hex_to_bgr(CLASS_HEX_COLORS[4]),
];

/// Converts `#RRGGBB` (leading `#` optional) into BGR channel order.
/// Malformed digits decode as zero.
pub const fn hex_to_bgr(hex: &str) -> Bgr {
    let bytes = hex.as_bytes();
    let offset = if !bytes.is_empty() && bytes[0] == b'#' {
        1
    } else {
        0
    };
    if bytes.len() < offset + 6 {
        return [0, 0, 0];
    }
    let r = hex_pair(bytes[offset], bytes[offset + 1]);
    let g = hex_pair(bytes[offset + 2], bytes[offset + 3]);
    let b = hex_pair(bytes[offset + 4], bytes[offset + 5]);
    [b, g, r]
}

const fn hex_pair(hi: u8, lo: u8) -> u8 {
    hex_digit(hi) * 16 + hex_digit(lo)
}

const fn hex_digit(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

/// Total lookup: never fails, unknown ids get [`DEFAULT_COLOR`].
pub fn color_for(class_id: u32) -> Bgr {
    CLASS_COLORS
        .get(class_id as usize)
        .copied()
        .unwrap_or(DEFAULT_COLOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_to_bgr_swaps_channel_order() {
        assert_eq!(hex_to_bgr("#76B93E"), [0x3E, 0xB9, 0x76]);
        assert_eq!(hex_to_bgr("FF1616"), [0x16, 0x16, 0xFF]);
        assert_eq!(hex_to_bgr("#00ffff"), [255, 255, 0]);
    }

    #[test]
    fn test_class_table() {
        assert_eq!(color_for(0), [0, 0, 0]);
        assert_eq!(color_for(1), [0x3E, 0xB9, 0x76]);
        assert_eq!(color_for(2), [0x59, 0xBD, 0xFF]);
        assert_eq!(color_for(3), [0x16, 0x16, 0xFF]);
        assert_eq!(color_for(4), [0xFF, 0xFF, 0x00]);
    }

    #[test]
    fn test_unknown_class_falls_back_to_green() {
        assert_eq!(color_for(5), DEFAULT_COLOR);
        assert_eq!(color_for(99), [0, 255, 0]);
        assert_eq!(color_for(u32::MAX), DEFAULT_COLOR);
    }
}
