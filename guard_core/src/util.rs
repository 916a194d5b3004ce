//! Rate and tick arithmetic shared by loops and samplers.

pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Tick period in microseconds for a rate in Hz; `hz` is clamped to at least 1.
#[inline]
pub fn period_us(hz: u32) -> u64 {
    (MICROS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Number of ticks at `hz` covering `seconds`, rounded up, at least 1.
#[inline]
pub fn ticks_for(seconds: f64, hz: u32) -> u32 {
    let t = (seconds * f64::from(hz.max(1))).ceil();
    if t.is_finite() && t >= 1.0 {
        // Clamped to u32 range before the cast.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = t.min(f64::from(u32::MAX)) as u32;
        n
    } else {
        1
    }
}
