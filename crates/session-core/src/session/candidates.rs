use crate::signaling::IceCandidate;

/// Which local candidates may be signaled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPolicy {
    Any,
    /// Only TURN relay candidates (`force_turn`)
    RelayOnly,
    /// Everything except TURN relay candidates (`disable_turn`)
    NoRelay,
}

impl RelayPolicy {
    pub fn from_flags(force_turn: bool, disable_turn: bool) -> Self {
        if force_turn {
            RelayPolicy::RelayOnly
        } else if disable_turn {
            RelayPolicy::NoRelay
        } else {
            RelayPolicy::Any
        }
    }

    pub fn permits(&self, candidate: &IceCandidate) -> bool {
        match self {
            RelayPolicy::Any => true,
            RelayPolicy::RelayOnly => candidate.is_relay(),
            RelayPolicy::NoRelay => !candidate.is_relay(),
        }
    }
}

/// Candidates held back until SDP has been exchanged.
///
/// Outbound candidates wait until this side has sent or processed SDP, inbound
/// ones until a remote description is applied. Signaling does not order
/// candidates relative to offer/answer.
#[derive(Debug, Default)]
pub struct CandidateQueues {
    outbound: Vec<IceCandidate>,
    inbound: Vec<IceCandidate>,
}

impl CandidateQueues {
    pub fn queue_outbound(&mut self, candidate: IceCandidate) {
        self.outbound.push(candidate);
    }

    pub fn queue_inbound(&mut self, candidate: IceCandidate) {
        self.inbound.push(candidate);
    }

    pub fn take_outbound(&mut self) -> Vec<IceCandidate> {
        std::mem::take(&mut self.outbound)
    }

    pub fn take_inbound(&mut self) -> Vec<IceCandidate> {
        std::mem::take(&mut self.inbound)
    }

    pub fn pending_outbound(&self) -> usize {
        self.outbound.len()
    }

    pub fn pending_inbound(&self) -> usize {
        self.inbound.len()
    }

    pub fn clear(&mut self) {
        self.outbound.clear();
        self.inbound.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> IceCandidate {
        IceCandidate::new("candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host")
    }

    fn relay() -> IceCandidate {
        IceCandidate::new("candidate:3 1 udp 41885439 203.0.113.9 3478 typ relay raddr 0.0.0.0 rport 0")
    }

    #[test]
    fn relay_policy_filters() {
        assert!(RelayPolicy::from_flags(false, false).permits(&host()));
        assert!(!RelayPolicy::from_flags(true, false).permits(&host()));
        assert!(RelayPolicy::from_flags(true, false).permits(&relay()));
        assert!(!RelayPolicy::from_flags(false, true).permits(&relay()));
        // force wins when both are set
        assert_eq!(RelayPolicy::from_flags(true, true), RelayPolicy::RelayOnly);
    }

    #[test]
    fn queues_drain_in_order() {
        let mut queues = CandidateQueues::default();
        queues.queue_outbound(host());
        queues.queue_outbound(relay());
        queues.queue_inbound(host());

        assert_eq!(queues.take_outbound(), vec![host(), relay()]);
        assert_eq!(queues.pending_outbound(), 0);
        assert_eq!(queues.pending_inbound(), 1);
    }
}
