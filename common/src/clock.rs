//! Wall-clock access, isolated to one place so every timestamp in the
//! workspace (envelope marshaling, validation's not-in-the-future check,
//! auth-row `last_used`) goes through the same source.

use chrono::Utc;

/// Current time in microseconds since the Unix epoch, matching the
/// `timestamp_micros` precision fixed by the wire format (spec §6).
pub fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_micros_is_positive_and_monotone_enough_to_order_calls() {
        let a = now_micros();
        let b = now_micros();
        assert!(a > 0);
        assert!(b >= a);
    }
}
