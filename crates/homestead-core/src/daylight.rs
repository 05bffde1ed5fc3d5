//! Day/night lighting derived from the clock phase.
//!
//! Phase 0 is sunrise-side day, 0.5 is the middle of the night, and the cycle
//! wraps at 1. The shell applies the sample to its lights and sky.

use std::f64::consts::{FRAC_PI_2, TAU};

/// An sRGB color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn hex(v: u32) -> Self {
        Self((v >> 16) as u8, (v >> 8) as u8, v as u8)
    }

    /// Linear blend; `t` is clamped to `[0, 1]`.
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }
}

const FOG: (Rgb, Rgb) = (Rgb::hex(0xffaf8f), Rgb::hex(0x222a3a));
const SKY: (Rgb, Rgb) = (Rgb::hex(0xaaaf8f), Rgb::hex(0x1a1e2a));
const SUN: (Rgb, Rgb) = (Rgb::hex(0xffafaf), Rgb::hex(0x6a7bff));
const AMBIENT: (Rgb, Rgb) = (Rgb::hex(0xffffff), Rgb::hex(0x7a7aff));

const DAY_INTENSITY: f64 = 6.0;
const NIGHT_INTENSITY: f64 = 3.0;
pub const AMBIENT_INTENSITY: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DaylightSample {
    /// 0 at full day, 1 at full night.
    pub night_factor: f64,
    /// Angle of the sun on its circle, radians. `-π/2` at phase 0.
    pub sun_angle: f64,
    /// Unit vector `(cos, sin)` of `sun_angle`; `y > 0` is above the horizon.
    pub sun_direction: (f64, f64),
    pub sun_intensity: f64,
    pub sun_color: Rgb,
    pub ambient_color: Rgb,
    pub fog_color: Rgb,
    pub sky_color: Rgb,
}

impl DaylightSample {
    pub fn is_night(&self) -> bool {
        self.night_factor > 0.5
    }
}

/// Sample lighting at `phase`. Values outside `[0, 1)` wrap.
pub fn sample(phase: f64) -> DaylightSample {
    let phase = if phase.is_finite() { phase.rem_euclid(1.0) } else { 0.0 };
    let t = 0.5 - 0.5 * (phase * TAU).cos();
    let sun_angle = phase * TAU - FRAC_PI_2;

    DaylightSample {
        night_factor: t,
        sun_angle,
        sun_direction: (sun_angle.cos(), sun_angle.sin()),
        sun_intensity: DAY_INTENSITY * (1.0 - t) + NIGHT_INTENSITY * t,
        sun_color: SUN.0.lerp(SUN.1, t),
        ambient_color: AMBIENT.0.lerp(AMBIENT.1, t),
        fog_color: FOG.0.lerp(FOG.1, t),
        sky_color: SKY.0.lerp(SKY.1, t),
    }
}
