// THEORY (single-pixel colour heuristics):
// The `pixel` module is the smallest unit of the detector. It wraps one RGB
// sample and converts it into the hue/saturation/value representation the
// colour segmenter thresholds against. Nothing here looks at neighbours; any
// spatial reasoning (blur, morphology, contours) lives in higher modules.
//
// Scale convention:
// All HSV triples use the 8-bit scale common to video tooling:
//   • hue        0..180  (degrees halved so it fits a byte)
//   • saturation 0..255  (chroma relative to value)
//   • value      0..255  (max channel)
// Red sits on both ends of the hue circle, which is why a red `ColorProfile`
// needs two disjoint hue ranges while white needs one.

pub mod pixel {
    pub type Channel = u8;
    pub type Hue = u8;
    pub type Saturation = u8;
    pub type Value = u8;

    /// Upper bound of the halved hue scale.
    pub const HUE_SCALE_MAX: u8 = 180;

    /// A "dumb" data container for a single RGB sample.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        pub red: Channel,
        pub green: Channel,
        pub blue: Channel,
    }

    /// A hue/saturation/value sample on the 8-bit scale.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Hsv {
        pub hue: Hue,
        pub saturation: Saturation,
        pub value: Value,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Self { red, green, blue }
        }

        /// HSV Value: brightness as max(R, G, B).
        pub fn value(&self) -> Value {
            self.red.max(self.green.max(self.blue))
        }

        /// Chroma: max(R, G, B) - min(R, G, B), zero for any grey.
        pub fn chroma(&self) -> Channel {
            self.value() - self.red.min(self.green.min(self.blue))
        }

        /// HSV saturation rescaled to 0..255. Black has zero saturation.
        pub fn saturation(&self) -> Saturation {
            let value = self.value();
            if value == 0 {
                return 0;
            }
            (255.0 * self.chroma() as f32 / value as f32).round() as Saturation
        }

        /// Hue on the halved 0..180 scale. Greys report hue 0.
        pub fn hue(&self) -> Hue {
            let chroma = self.chroma() as f32;
            if chroma <= 0.0 {
                return 0;
            }

            let red = self.red as f32;
            let green = self.green as f32;
            let blue = self.blue as f32;
            let maximum_channel = self.value();

            let (base_difference, sector_offset) = if maximum_channel == self.red {
                (green - blue, 0.0)
            } else if maximum_channel == self.green {
                (blue - red, 2.0)
            } else {
                (red - green, 4.0)
            };

            let mut hue_degrees = (base_difference / chroma + sector_offset) * 60.0;
            if hue_degrees < 0.0 {
                hue_degrees += 360.0;
            }

            // 359.x degrees rounds up to 180 which wraps back onto pure red.
            let halved = (hue_degrees / 2.0).round() as u16;
            (halved % HUE_SCALE_MAX as u16) as Hue
        }

        pub fn to_hsv(&self) -> Hsv {
            Hsv {
                hue: self.hue(),
                saturation: self.saturation(),
                value: self.value(),
            }
        }
    }

    impl From<image::Rgb<u8>> for Pixel {
        fn from(rgb: image::Rgb<u8>) -> Self {
            let [red, green, blue] = rgb.0;
            Pixel::new(red, green, blue)
        }
    }

    impl From<&image::Rgb<u8>> for Pixel {
        fn from(rgb: &image::Rgb<u8>) -> Self {
            Pixel::from(*rgb)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::pixel::*;

    #[test]
    fn white_is_unsaturated_and_bright() {
        let hsv = Pixel::new(255, 255, 255).to_hsv();
        assert_eq!(hsv.saturation, 0);
        assert_eq!(hsv.value, 255);
        assert_eq!(hsv.hue, 0);
    }

    #[test]
    fn primaries_land_on_expected_hues() {
        assert_eq!(Pixel::new(255, 0, 0).hue(), 0);
        assert_eq!(Pixel::new(0, 255, 0).hue(), 60);
        assert_eq!(Pixel::new(0, 0, 255).hue(), 120);
        assert_eq!(Pixel::new(255, 0, 0).saturation(), 255);
    }

    #[test]
    fn magenta_leaning_red_wraps_to_top_of_scale() {
        // 340 degrees -> 170 on the halved scale.
        let hsv = Pixel::new(255, 0, 85).to_hsv();
        assert_eq!(hsv.hue, 170);
    }

    #[test]
    fn black_has_no_saturation() {
        assert_eq!(Pixel::new(0, 0, 0).saturation(), 0);
        assert_eq!(Pixel::new(0, 0, 0).value(), 0);
    }
}
