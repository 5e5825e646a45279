//! RTMP timestamps are 32-bit millisecond counters from an arbitrary epoch
//! and are expected to wrap on long-lived streams.  `RtmpTimestamp` keeps
//! the wrapping arithmetic and ordering rules in one place: two times are
//! compared directly when they are within 2<sup>31</sup> - 1 milliseconds
//! of each other, and in reverse otherwise (so a freshly wrapped timestamp
//! still sorts after one from just before the wrap).

use std::cmp::{max, min, Ordering};
use std::ops::{Add, Sub};

/// The representation of an RTMP timestamp
#[derive(Eq, PartialEq, Debug, Copy, Clone)]
pub struct RtmpTimestamp {
    /// The time (as milliseconds from an unknown epoch) being represented
    pub value: u32,
}

impl RtmpTimestamp {
    /// Creates a new timestamp with the specified time value
    pub fn new(initial_value: u32) -> Self {
        RtmpTimestamp {
            value: initial_value,
        }
    }

    /// Sets the timestamp to a new time value
    pub fn set(&mut self, new_value: u32) {
        self.value = new_value;
    }
}

impl Add<u32> for RtmpTimestamp {
    type Output = RtmpTimestamp;

    fn add(self, delta: u32) -> Self {
        RtmpTimestamp {
            value: self.value.wrapping_add(delta),
        }
    }
}

impl Sub for RtmpTimestamp {
    type Output = RtmpTimestamp;

    fn sub(self, other: RtmpTimestamp) -> Self {
        RtmpTimestamp {
            value: self.value.wrapping_sub(other.value),
        }
    }
}

impl Ord for RtmpTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self.value, other.value)
    }
}

impl PartialOrd for RtmpTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(compare(self.value, other.value))
    }
}

impl PartialEq<u32> for RtmpTimestamp {
    fn eq(&self, other: &u32) -> bool {
        self.value == *other
    }
}

impl PartialEq<RtmpTimestamp> for u32 {
    fn eq(&self, other: &RtmpTimestamp) -> bool {
        *self == other.value
    }
}

fn compare(value1: u32, value2: u32) -> Ordering {
    // Per the RTMP specification, times are adjacent when within
    // 2^31 - 1 milliseconds of each other
    const MAX_ADJACENT_VALUE: u32 = 2147483647;

    let difference = max(value1, value2) - min(value1, value2);
    if difference <= MAX_ADJACENT_VALUE {
        value1.cmp(&value2)
    } else {
        value2.cmp(&value1)
    }
}

#[cfg(test)]
mod tests {
    use super::RtmpTimestamp;

    #[test]
    fn can_add_delta_to_timestamp() {
        let time = RtmpTimestamp::new(50);
        assert_eq!(time + 60, RtmpTimestamp::new(110));
    }

    #[test]
    fn addition_wraps_around_u32() {
        let time = RtmpTimestamp::new(u32::max_value());
        assert_eq!(time + 60, RtmpTimestamp::new(59));
    }

    #[test]
    fn subtraction_wraps_under_zero() {
        let time1 = RtmpTimestamp::new(10);
        let time2 = RtmpTimestamp::new(60);
        assert_eq!(time1 - time2, RtmpTimestamp::new(u32::max_value() - 49));
    }

    #[test]
    fn adjacent_timestamps_compare_directly() {
        let time1 = RtmpTimestamp::new(50);
        let time2 = RtmpTimestamp::new(60);

        assert!(time1 < time2);
        assert!(time2 > time1);
    }

    #[test]
    fn wrapped_timestamps_compare_in_stream_order() {
        let before_wrap = RtmpTimestamp::new(4000000000);
        let after_wrap = RtmpTimestamp::new(10000);

        assert!(after_wrap > before_wrap);
    }

    #[test]
    fn can_compare_timestamp_with_u32() {
        let time = RtmpTimestamp::new(50);
        assert_eq!(time, 50);
        assert_eq!(50, time);
    }
}
