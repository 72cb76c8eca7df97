// THEORY:
// The `Pixel` module is the smallest unit the capture engine reasons about. It is
// a "dumb" data container for a single RGBA sample plus the handful of
// single-pixel heuristics the quality gate needs. Nothing here looks at
// neighbors or at previous frames; that belongs to `Frame` and the analyzers.
//
// Heuristics provided:
// - Brightness: Rec. 601 luma (R*0.299 + G*0.587 + B*0.114), the broadcast-safe
//   weighting used for the darkness gate.
// - Chroma: the Cb/Cr components of the same Rec. 601 transform, which the
//   skin-region detector uses to separate skin tones from background without
//   caring about illumination.

pub mod pixel {
    pub type Byte = u8;
    pub type Channel = Byte;
    pub type Luminance = f64;
    pub type Chroma = f64;

    pub const CHANNELS: usize = 4;

    const LUMA_RED: f64 = 0.299;
    const LUMA_GREEN: f64 = 0.587;
    const LUMA_BLUE: f64 = 0.114;

    /// A "dumb" data container representing a single RGBA pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
        /// The alpha (transparency) channel value (0-255).
        pub alpha: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Pixel {
                red,
                green,
                blue,
                alpha,
            }
        }

        /// Luminance estimate (Rec. 601 luma) on the 0..255 scale.
        pub fn luminance(&self) -> Luminance {
            Self::luminance_of(self.red as f64, self.green as f64, self.blue as f64)
        }

        /// Rec. 601 luma of fractional channel values, e.g. channel averages.
        pub fn luminance_of(red: f64, green: f64, blue: f64) -> Luminance {
            LUMA_RED * red + LUMA_GREEN * green + LUMA_BLUE * blue
        }

        /// Blue-difference chroma, centered on 128.
        pub fn chroma_blue(&self) -> Chroma {
            128.0 - 0.168_736 * self.red as f64 - 0.331_264 * self.green as f64
                + 0.5 * self.blue as f64
        }

        /// Red-difference chroma, centered on 128.
        pub fn chroma_red(&self) -> Chroma {
            128.0 + 0.5 * self.red as f64
                - 0.418_688 * self.green as f64
                - 0.081_312 * self.blue as f64
        }
    }

    impl From<image::Rgba<u8>> for Pixel {
        fn from(rgba: image::Rgba<u8>) -> Self {
            let [red, green, blue, alpha] = rgba.0;
            Pixel::new(red, green, blue, alpha)
        }
    }

    impl From<Pixel> for image::Rgba<u8> {
        fn from(pixel: Pixel) -> Self {
            image::Rgba([pixel.red, pixel.green, pixel.blue, pixel.alpha])
        }
    }
}
