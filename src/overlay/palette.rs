use image::Rgb;

/// Color for class ids outside the table.
pub const DEFAULT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

const CLASS_COLORS: [Rgb<u8>; 10] = [
    Rgb([255, 0, 0]),     // red
    Rgb([0, 255, 0]),     // green
    Rgb([0, 0, 255]),     // blue
    Rgb([0, 255, 255]),   // cyan
    Rgb([255, 0, 255]),   // magenta
    Rgb([255, 255, 0]),   // yellow
    Rgb([128, 0, 128]),   // purple
    Rgb([255, 165, 0]),   // orange
    Rgb([128, 128, 0]),   // olive
    Rgb([0, 128, 128]),   // teal
];

/// Static class id to color mapping.
pub fn class_color(class_id: u32) -> Rgb<u8> {
    CLASS_COLORS
        .get(class_id as usize)
        .copied()
        .unwrap_or(DEFAULT_COLOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_classes_have_fixed_colors() {
        assert_eq!(class_color(0), Rgb([255, 0, 0]));
        assert_eq!(class_color(7), Rgb([255, 165, 0]));
        assert_eq!(class_color(9), Rgb([0, 128, 128]));
    }

    #[test]
    fn unknown_class_falls_back_to_default() {
        assert_eq!(class_color(10), DEFAULT_COLOR);
        assert_eq!(class_color(99), DEFAULT_COLOR);
        assert_eq!(class_color(u32::MAX), DEFAULT_COLOR);
    }

    #[test]
    fn same_class_same_color() {
        assert_eq!(class_color(3), class_color(3));
    }
}
