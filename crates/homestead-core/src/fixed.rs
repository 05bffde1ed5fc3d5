use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Virtual time in seconds. Stored fixed-point so that due checks and
/// accumulated elapsed time are deterministic across platforms.
pub type SimTime = Fixed64;

/// Convert a real-valued number of seconds to [`SimTime`].
///
/// Non-finite and negative inputs map to zero; values beyond the
/// representable range saturate.
#[inline]
pub fn secs(v: f64) -> SimTime {
    if !v.is_finite() || v <= 0.0 {
        return SimTime::ZERO;
    }
    SimTime::saturating_from_num(v)
}

/// Convert [`SimTime`] back to seconds. Use only for display and for the
/// presentation boundary.
#[inline]
pub fn to_secs(v: SimTime) -> f64 {
    v.to_num::<f64>()
}
