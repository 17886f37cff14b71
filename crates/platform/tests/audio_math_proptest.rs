//! Property-based tests for audio domain math.
//! Verifies invariants hold for ALL valid inputs, not just fixed examples.

use platform::audio_types::{SampleRateHz, VolumePercent};

proptest::proptest! {
    /// VolumePercent::new never panics for any u8 input (clamps to 100).
    #[test]
    fn volume_percent_new_never_panics(pct in 0u8..=255u8) {
        let v = VolumePercent::new(pct);
        assert!(v.get() <= 100);
    }

    /// Scaling never increases a sample's magnitude.
    #[test]
    fn scale_never_amplifies(pct in 0u8..=100u8, s in i16::MIN..=i16::MAX) {
        let scaled = VolumePercent::new(pct).scale(s);
        assert!(i32::from(scaled).abs() <= i32::from(s).abs());
        assert!(scaled == 0 || scaled.signum() == s.signum());
    }

    /// Higher volume → magnitude at least as large (monotone).
    #[test]
    fn scale_is_monotone_in_volume(a in 0u8..=100u8, b in 0u8..=100u8, s in i16::MIN..=i16::MAX) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let m_lo = i32::from(VolumePercent::new(lo).scale(s)).abs();
        let m_hi = i32::from(VolumePercent::new(hi).scale(s)).abs();
        assert!(m_lo <= m_hi, "volume {lo} → {m_lo} should be <= volume {hi} → {m_hi}");
    }

    /// SampleRateHz::new never panics for any u32 input.
    #[test]
    fn sample_rate_hz_new_never_panics(hz in 0u32..=u32::MAX) {
        let _ = SampleRateHz::new(hz);
    }

    /// SampleRateHz valid range [8000, 48000] always succeeds.
    #[test]
    fn sample_rate_hz_valid_range_always_ok(hz in 8000u32..=48_000u32) {
        assert!(SampleRateHz::new(hz).is_ok(),
            "SampleRateHz::new({}) should be Ok within [8000, 48000]", hz);
    }

    /// SampleRateHz out of range always fails.
    #[test]
    fn sample_rate_hz_out_of_range_always_err(hz in 48_001u32..=u32::MAX) {
        assert!(SampleRateHz::new(hz).is_err(),
            "SampleRateHz::new({}) should be Err above 48000", hz);
    }
}
