use super::constants::{TSC_WORD_BITS, TSC_WORD_MASK};
use super::event::Timestamp;

/// Build the full clock value from the lower and upper words of a timestamp counter FIFO.
///
/// The counter hands out its clock in 30-bit words; the upper word is shifted
/// above the masked lower word.
pub fn compose_clock(lower: u32, upper: u32) -> Timestamp {
    (lower as u64 & TSC_WORD_MASK) | ((upper as u64) << TSC_WORD_BITS)
}

/// Split a clock value into (lower, upper) timestamp counter words.
///
/// Returns None if the clock does not fit into two words.
pub fn split_clock(clock: Timestamp) -> Option<(u32, u32)> {
    let upper = u32::try_from(clock >> TSC_WORD_BITS).ok()?;
    Some(((clock & TSC_WORD_MASK) as u32, upper))
}

/// Convert clock ticks to microseconds for a clock running at `clock_mhz`
pub fn ticks_to_micros(ticks: f64, clock_mhz: f64) -> f64 {
    ticks / clock_mhz
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_masks_the_lower_word() {
        assert_eq!(compose_clock(0xffff_ffff, 0), 0x3fff_ffff);
        assert_eq!(compose_clock(5, 1), (1 << 30) + 5);
    }

    #[test]
    fn split_rejects_oversized_clock() {
        assert_eq!(split_clock((1 << 30) + 5), Some((5, 1)));
        assert_eq!(split_clock(u64::MAX), None);
    }

    #[test]
    fn ticks_at_twenty_mhz() {
        assert_eq!(ticks_to_micros(200.0, 20.0), 10.0);
        assert_eq!(ticks_to_micros(-40.0, 20.0), -2.0);
    }
}
