use crate::error::AppError;
use crate::models::order::OrderStatus;

/// True iff `to` is the immediate happy-path successor of `from`, or `to` is
/// cancelled/failed and `from` is not terminal. No stage skipping.
pub fn is_legal(from: OrderStatus, to: OrderStatus) -> bool {
    if from.is_terminal() {
        return false;
    }

    if matches!(to, OrderStatus::Cancelled | OrderStatus::Failed) {
        return true;
    }

    from.successor() == Some(to)
}

pub fn check(from: OrderStatus, to: OrderStatus) -> Result<(), AppError> {
    if is_legal(from, to) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::is_legal;
    use crate::models::order::OrderStatus;

    const HAPPY_PATH: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::Assigned,
        OrderStatus::PickedUp,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Completed,
    ];

    #[test]
    fn happy_path_steps_are_legal() {
        for pair in HAPPY_PATH.windows(2) {
            assert!(is_legal(pair[0], pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn stage_skipping_is_illegal() {
        assert!(!is_legal(OrderStatus::Pending, OrderStatus::InTransit));
        assert!(!is_legal(OrderStatus::Accepted, OrderStatus::PickedUp));
        assert!(!is_legal(OrderStatus::Pending, OrderStatus::Completed));
    }

    #[test]
    fn moving_backwards_is_illegal() {
        assert!(!is_legal(OrderStatus::InTransit, OrderStatus::Accepted));
        assert!(!is_legal(OrderStatus::Delivered, OrderStatus::PickedUp));
    }

    #[test]
    fn cancel_and_fail_reachable_from_any_non_terminal_state() {
        for status in HAPPY_PATH.iter().filter(|s| !s.is_terminal()) {
            assert!(is_legal(*status, OrderStatus::Cancelled), "{status:?}");
            assert!(is_legal(*status, OrderStatus::Failed), "{status:?}");
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for terminal in [
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Failed,
        ] {
            for target in HAPPY_PATH {
                assert!(!is_legal(terminal, target), "{terminal:?} -> {target:?}");
            }
            assert!(!is_legal(terminal, OrderStatus::Cancelled));
            assert!(!is_legal(terminal, OrderStatus::Failed));
        }
    }
}
