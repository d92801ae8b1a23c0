use crate::orders::OrderStatus;

/// Service for managing order status transitions
///
/// The transition table is closed: anything not listed fails, including
/// re-asserting the current status. `delivered` and `cancelled` are
/// terminal.
pub struct StatusMachine;

impl StatusMachine {
    /// The statuses reachable in one step from `from`.
    pub fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
        match from {
            OrderStatus::Pending => &[OrderStatus::Confirmed, OrderStatus::Cancelled],
            OrderStatus::Confirmed => &[OrderStatus::Preparing, OrderStatus::Cancelled],
            OrderStatus::Preparing => &[OrderStatus::Ready, OrderStatus::Cancelled],
            OrderStatus::Ready => &[OrderStatus::OutForDelivery, OrderStatus::Delivered],
            OrderStatus::OutForDelivery => &[OrderStatus::Delivered],
            OrderStatus::Delivered => &[],
            OrderStatus::Cancelled => &[],
        }
    }

    /// Check if a status transition is valid
    pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
        Self::allowed_transitions(from).contains(&to)
    }

    /// Attempt to transition from one status to another
    ///
    /// # Returns
    /// `Ok(to)` if the transition is valid, `Err((from, to))` otherwise so
    /// the caller can report both states.
    pub fn transition(from: OrderStatus, to: OrderStatus) -> Result<OrderStatus, (OrderStatus, OrderStatus)> {
        if Self::is_valid_transition(from, to) {
            Ok(to)
        } else {
            Err((from, to))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: [(OrderStatus, OrderStatus); 9] = [
        (OrderStatus::Pending, OrderStatus::Confirmed),
        (OrderStatus::Pending, OrderStatus::Cancelled),
        (OrderStatus::Confirmed, OrderStatus::Preparing),
        (OrderStatus::Confirmed, OrderStatus::Cancelled),
        (OrderStatus::Preparing, OrderStatus::Ready),
        (OrderStatus::Preparing, OrderStatus::Cancelled),
        (OrderStatus::Ready, OrderStatus::OutForDelivery),
        (OrderStatus::Ready, OrderStatus::Delivered),
        (OrderStatus::OutForDelivery, OrderStatus::Delivered),
    ];

    #[test]
    fn test_all_table_transitions_are_valid() {
        for (from, to) in VALID {
            assert!(
                StatusMachine::is_valid_transition(from, to),
                "{} -> {} should be allowed",
                from,
                to
            );
            assert_eq!(StatusMachine::transition(from, to), Ok(to));
        }
    }

    #[test]
    fn test_everything_outside_the_table_is_invalid() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                if VALID.contains(&(from, to)) {
                    continue;
                }
                assert!(
                    !StatusMachine::is_valid_transition(from, to),
                    "{} -> {} should be rejected",
                    from,
                    to
                );
                assert_eq!(StatusMachine::transition(from, to), Err((from, to)));
            }
        }
    }

    #[test]
    fn test_same_status_is_not_a_transition() {
        for status in OrderStatus::ALL {
            assert!(!StatusMachine::is_valid_transition(status, status));
        }
    }

    #[test]
    fn test_terminal_states_have_no_outbound_transitions() {
        assert!(StatusMachine::allowed_transitions(OrderStatus::Delivered).is_empty());
        assert!(StatusMachine::allowed_transitions(OrderStatus::Cancelled).is_empty());
    }

    #[test]
    fn test_ready_can_skip_delivery_leg() {
        // Pickup orders go ready -> delivered without out_for_delivery.
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::Ready,
            OrderStatus::Delivered
        ));
    }

    #[test]
    fn test_out_for_delivery_cannot_be_cancelled() {
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::OutForDelivery,
            OrderStatus::Cancelled
        ));
    }
}
