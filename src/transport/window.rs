use crate::messages::PeerBandwidthLimitType;

/// Tracks received byte counts against the acknowledgement window the
/// peer asked for.
///
/// Until the peer sends a WindowAcknowledgementSize message no
/// acknowledgements are owed; after that, every time the received byte
/// count reaches the threshold an acknowledgement carrying the threshold
/// value goes out and the counter resets to zero.  Resetting (rather than
/// subtracting the threshold) keeps bursts from accumulating drift.
pub struct WindowTracker {
    read_window_size: u32,
    read_ack_threshold: Option<u32>,
    write_ack_threshold: Option<u32>,
    previous_limit_type: Option<PeerBandwidthLimitType>,
    bandwidth_limited: bool,
}

impl WindowTracker {
    pub fn new() -> WindowTracker {
        WindowTracker {
            read_window_size: 0,
            read_ack_threshold: None,
            write_ack_threshold: None,
            previous_limit_type: None,
            bandwidth_limited: false,
        }
    }

    /// Records bytes read off the wire.  Returns the sequence number to
    /// send in an Acknowledgement message if the window was crossed.
    pub fn bytes_received(&mut self, count: u32) -> Option<u32> {
        self.read_window_size = self.read_window_size.wrapping_add(count);
        match self.read_ack_threshold {
            Some(threshold) if self.read_window_size >= threshold => {
                self.read_window_size = 0;
                Some(threshold)
            }

            _ => None,
        }
    }

    /// Applies an inbound WindowAcknowledgementSize message.  Bytes that
    /// accumulated before the peer announced its window are acknowledged
    /// immediately, and the returned value should be sent back if present.
    pub fn set_read_ack_threshold(&mut self, size: u32) -> Option<u32> {
        self.read_ack_threshold = Some(size);
        if self.read_window_size == 0 {
            return None;
        }

        let acknowledged = self.read_window_size;
        self.read_window_size = 0;
        Some(acknowledged)
    }

    /// Records the window size we announced to the peer, after which its
    /// acknowledgements become meaningful.
    pub fn set_write_ack_threshold(&mut self, size: u32) {
        self.write_ack_threshold = Some(size);
    }

    pub fn write_ack_threshold(&self) -> Option<u32> {
        self.write_ack_threshold
    }

    /// Applies an inbound SetPeerBandwidth message.  A `Soft` limit looser
    /// than the current window is ignored, and a `Dynamic` limit only
    /// applies when the previous limit was `Hard`.  Returns true when the
    /// limit was honored (and should be confirmed to the peer).
    pub fn apply_peer_bandwidth(&mut self, size: u32, limit_type: PeerBandwidthLimitType) -> bool {
        if limit_type == PeerBandwidthLimitType::Soft {
            if let Some(current) = self.read_ack_threshold {
                if size > current {
                    return false;
                }
            }
        }

        if limit_type == PeerBandwidthLimitType::Dynamic {
            if let Some(previous) = self.previous_limit_type {
                if previous != PeerBandwidthLimitType::Hard {
                    return false;
                }
            }
        }

        self.previous_limit_type = Some(limit_type);
        self.read_ack_threshold = Some(size);
        self.bandwidth_limited = true;
        true
    }

    /// True once the peer has imposed a bandwidth limit on us
    pub fn is_bandwidth_limited(&self) -> bool {
        self.bandwidth_limited
    }
}

impl Default for WindowTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_acknowledgements_before_a_window_is_announced() {
        let mut tracker = WindowTracker::new();
        assert_eq!(tracker.bytes_received(1_000_000), None);
    }

    #[test]
    fn acknowledgement_emitted_when_threshold_reached_exactly() {
        let mut tracker = WindowTracker::new();
        tracker.set_read_ack_threshold(1000);

        assert_eq!(tracker.bytes_received(999), None, "Expected no ack yet");
        assert_eq!(tracker.bytes_received(1), Some(1000), "Expected an ack");
    }

    #[test]
    fn counter_resets_to_zero_after_acknowledgement() {
        let mut tracker = WindowTracker::new();
        tracker.set_read_ack_threshold(1000);

        // A burst past the threshold still resets the counter entirely
        assert_eq!(tracker.bytes_received(1500), Some(1000));
        assert_eq!(tracker.bytes_received(999), None, "Expected a fresh window");
        assert_eq!(tracker.bytes_received(1), Some(1000));
    }

    #[test]
    fn window_announcement_acknowledges_accumulated_bytes() {
        let mut tracker = WindowTracker::new();
        assert_eq!(tracker.bytes_received(700), None);
        assert_eq!(tracker.set_read_ack_threshold(1000), Some(700));
        assert_eq!(tracker.bytes_received(999), None, "Expected counter reset");
    }

    #[test]
    fn window_announcement_with_nothing_accumulated_is_silent() {
        let mut tracker = WindowTracker::new();
        assert_eq!(tracker.set_read_ack_threshold(1000), None);
    }

    #[test]
    fn hard_limit_is_always_honored() {
        let mut tracker = WindowTracker::new();
        tracker.set_read_ack_threshold(1000);

        assert!(tracker.apply_peer_bandwidth(5000, PeerBandwidthLimitType::Hard));
        assert!(tracker.is_bandwidth_limited());
    }

    #[test]
    fn soft_limit_looser_than_current_window_is_ignored() {
        let mut tracker = WindowTracker::new();
        tracker.set_read_ack_threshold(1000);

        assert!(!tracker.apply_peer_bandwidth(5000, PeerBandwidthLimitType::Soft));
        assert!(!tracker.is_bandwidth_limited());
        assert!(tracker.apply_peer_bandwidth(500, PeerBandwidthLimitType::Soft));
    }

    #[test]
    fn dynamic_limit_applies_only_after_a_hard_limit() {
        let mut tracker = WindowTracker::new();

        assert!(tracker.apply_peer_bandwidth(1000, PeerBandwidthLimitType::Soft));
        assert!(!tracker.apply_peer_bandwidth(500, PeerBandwidthLimitType::Dynamic));

        assert!(tracker.apply_peer_bandwidth(1000, PeerBandwidthLimitType::Hard));
        assert!(tracker.apply_peer_bandwidth(500, PeerBandwidthLimitType::Dynamic));
    }
}
