//! Pixel color values and the conversions patterns need.
//!
//! Patterns think in either linear RGB intensities (0-255, real numbers) or
//! HSV triples (0-1). Both end up as RGB before the output channel gamma
//! encodes them.
//!
//! ## Rust concepts
//! - `enum` with data variants for "either RGB or HSV"
//! - `From` impls so callers can write `out.write_pixel(hsv.into())`
//! - `f64::rem_euclid` for wrapping negative hues

// ── RGB ────────────────────────────────────────────────────────────

/// Linear intensities, each nominally in `[0, 255]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Round and clamp each channel into a byte.
    pub fn to_bytes(self) -> [u8; 3] {
        [channel_byte(self.r), channel_byte(self.g), channel_byte(self.b)]
    }
}

fn channel_byte(intensity: f64) -> u8 {
    // NaN casts to 0
    intensity.round().clamp(0.0, 255.0) as u8
}

// ── HSV ────────────────────────────────────────────────────────────

/// Hue wraps modulo 1.0; saturation and value clamp to `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Hsv {
    pub hue: f64,
    pub saturation: f64,
    pub value: f64,
}

impl Hsv {
    pub const fn new(hue: f64, saturation: f64, value: f64) -> Self {
        Self {
            hue,
            saturation,
            value,
        }
    }

    /// Sector-based HSV to RGB conversion.
    ///
    /// The hue circle is split into 6 sectors by `floor(hue * 6) mod 6`; each
    /// sector assigns (v, t, p), (q, v, p), (p, v, t), (p, q, v), (t, p, v) or
    /// (v, p, q) to (r, g, b).
    pub fn to_rgb(self) -> Rgb {
        let h = self.hue.rem_euclid(1.0) * 6.0;
        let s = self.saturation.clamp(0.0, 1.0);
        let v = self.value.clamp(0.0, 1.0);

        let sector = h.floor();
        let f = h - sector;
        let p = v * (1.0 - s);
        let q = v * (1.0 - f * s);
        let t = v * (1.0 - (1.0 - f) * s);

        let (r, g, b) = match (sector as u8) % 6 {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };

        Rgb::new(r * 255.0, g * 255.0, b * 255.0)
    }
}

// ── Pixel ──────────────────────────────────────────────────────────

/// What a pattern hands to the output channel for one pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pixel {
    Rgb(Rgb),
    Hsv(Hsv),
}

impl Pixel {
    pub const OFF: Self = Self::Rgb(Rgb::BLACK);

    pub fn to_rgb(self) -> Rgb {
        match self {
            Self::Rgb(rgb) => rgb,
            Self::Hsv(hsv) => hsv.to_rgb(),
        }
    }
}

impl From<Rgb> for Pixel {
    fn from(rgb: Rgb) -> Self {
        Self::Rgb(rgb)
    }
}

impl From<Hsv> for Pixel {
    fn from(hsv: Hsv) -> Self {
        Self::Hsv(hsv)
    }
}

// ── Color temperature ──────────────────────────────────────────────

/// Lowest temperature the approximation is fitted for, in kelvin.
pub const MIN_TEMPERATURE: f64 = 1000.0;
/// Highest temperature the approximation is fitted for, in kelvin.
pub const MAX_TEMPERATURE: f64 = 40000.0;

/// Approximate the RGB color of a black body at `kelvin`.
///
/// Tanner Helland's curve fit of the CIE 1964 black-body data. Each channel is
/// rounded and clamped to `[0, 255]`.
pub fn temperature_to_rgb(kelvin: f64) -> Rgb {
    let t = kelvin.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE) / 100.0;

    let red = if t <= 66.0 {
        255.0
    } else {
        329.698727446 * (t - 60.0).powf(-0.1332047592)
    };

    let green = if t <= 66.0 {
        99.4708025861 * t.ln() - 161.1195681661
    } else {
        288.1221695283 * (t - 60.0).powf(-0.0755148492)
    };

    let blue = if t >= 66.0 {
        255.0
    } else if t <= 19.0 {
        0.0
    } else {
        138.5177312231 * (t - 10.0).ln() - 305.0447927307
    };

    Rgb::new(
        red.clamp(0.0, 255.0).round(),
        green.clamp(0.0, 255.0).round(),
        blue.clamp(0.0, 255.0).round(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, [255, 0, 0])] // Red
    #[case(0.25, [128, 255, 0])] // Chartreuse
    #[case(0.5, [0, 255, 255])] // Cyan
    #[case(0.75, [128, 0, 255])] // Violet
    fn hsv_sectors(#[case] hue: f64, #[case] expected: [u8; 3]) {
        assert_eq!(Hsv::new(hue, 1.0, 1.0).to_rgb().to_bytes(), expected);
    }

    #[rstest]
    #[case(0.05)]
    #[case(0.2)]
    #[case(0.4)]
    #[case(0.55)]
    #[case(0.7)]
    #[case(0.9)]
    fn full_saturation_has_one_max_and_one_zero_channel(#[case] hue: f64) {
        let bytes = Hsv::new(hue, 1.0, 1.0).to_rgb().to_bytes();
        assert_eq!(bytes.iter().filter(|&&c| c == 255).count(), 1);
        assert_eq!(bytes.iter().filter(|&&c| c == 0).count(), 1);
    }

    #[test]
    fn hue_wraps_modulo_one() {
        assert_eq!(Hsv::new(1.0, 1.0, 1.0).to_rgb(), Hsv::new(0.0, 1.0, 1.0).to_rgb());
        assert_eq!(
            Hsv::new(-0.25, 1.0, 1.0).to_rgb().to_bytes(),
            Hsv::new(0.75, 1.0, 1.0).to_rgb().to_bytes()
        );
        assert_eq!(
            Hsv::new(1.5, 1.0, 1.0).to_rgb().to_bytes(),
            Hsv::new(0.5, 1.0, 1.0).to_rgb().to_bytes()
        );
    }

    #[test]
    fn zero_saturation_is_gray() {
        assert_eq!(Hsv::new(0.3, 0.0, 1.0).to_rgb().to_bytes(), [255, 255, 255]);
        assert_eq!(Hsv::new(0.3, 0.0, 0.0).to_rgb().to_bytes(), [0, 0, 0]);
    }

    #[test]
    fn saturation_and_value_are_clamped() {
        assert_eq!(Hsv::new(0.0, 3.0, 2.0).to_rgb(), Hsv::new(0.0, 1.0, 1.0).to_rgb());
        assert_eq!(Hsv::new(0.0, -1.0, -1.0).to_rgb().to_bytes(), [0, 0, 0]);
    }

    #[test]
    fn rgb_to_bytes_rounds_and_clamps() {
        assert_eq!(Rgb::new(-4.0, 127.5, 300.0).to_bytes(), [0, 128, 255]);
        assert_eq!(Rgb::new(f64::NAN, 0.4, 254.6).to_bytes(), [0, 0, 255]);
    }

    #[test]
    fn pixel_from_either_representation() {
        let hsv = Hsv::new(0.5, 1.0, 1.0);
        assert_eq!(Pixel::from(hsv).to_rgb(), hsv.to_rgb());
        assert_eq!(Pixel::from(Rgb::new(1.0, 2.0, 3.0)).to_rgb(), Rgb::new(1.0, 2.0, 3.0));
        assert_eq!(Pixel::OFF.to_rgb().to_bytes(), [0, 0, 0]);
    }

    #[rstest]
    #[case(1000.0, [255, 68, 0])]
    #[case(6600.0, [255, 255, 255])]
    #[case(500.0, [255, 68, 0])] // clamped up to 1000K
    fn temperature_known_points(#[case] kelvin: f64, #[case] expected: [u8; 3]) {
        assert_eq!(temperature_to_rgb(kelvin).to_bytes(), expected);
    }

    #[test]
    fn hot_temperatures_saturate_blue_and_soften_red() {
        let rgb = temperature_to_rgb(19_582.0);
        assert_eq!(rgb.b, 255.0);
        assert!(rgb.r < 255.0);
        assert!(rgb.g < 255.0);
    }

    #[test]
    fn temperature_channels_are_whole_numbers_in_range() {
        for kelvin in (1000..=40000).step_by(700) {
            let rgb = temperature_to_rgb(f64::from(kelvin));
            for c in [rgb.r, rgb.g, rgb.b] {
                assert_eq!(c, c.round());
                assert!((0.0..=255.0).contains(&c));
            }
        }
    }
}
