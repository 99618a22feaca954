//! Phred quality constants and conversions.

/// Bases reported below this quality are left untouched by recalibration.
pub const MIN_USABLE_Q_SCORE: u8 = 6;

/// Upper clamp applied to every recalibrated quality.
pub const MAX_RECALIBRATED_Q_SCORE: u8 = 93;

/// Highest representable quality; quantization maps cover `0..=MAX_QUAL_SCORE`.
pub const MAX_QUAL_SCORE: u8 = 93;

/// Default ceiling on the number of bases in a recalibrated read.
pub const MAXIMUM_RECALIBRATED_READ_LENGTH: usize = 5000;

/// Insertion/deletion quality assigned to reads that carry none.
pub const DEFAULT_INDEL_QUALITY: u8 = 45;

/// Error probability for a Phred quality: `10^(-q/10)`.
pub fn qual_to_error_prob(qual: u8) -> f64 {
    10f64.powf(-f64::from(qual) / 10.0)
}

/// Phred quality for an error probability, rounded and capped at `max_qual`.
///
/// A zero error rate maps to `max_qual`.
pub fn error_prob_to_qual(error_rate: f64, max_qual: u8) -> u8 {
    if error_rate <= 0.0 {
        return max_qual;
    }
    let q = (-10.0 * error_rate.log10()).round();
    if q >= f64::from(max_qual) {
        max_qual
    } else if q <= 0.0 {
        0
    } else {
        q as u8
    }
}

/// Clamp a rounded quality into `[1, max_qual]`. Zero is never produced.
pub fn bound_qual(qual: i64, max_qual: u8) -> u8 {
    qual.clamp(1, i64::from(max_qual.max(1))) as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
