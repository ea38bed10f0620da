use super::aggregate::Order;
use super::errors::TransitionError;
use super::events::{TransitionRecord, TransitionTrigger};
use super::value_objects::OrderState;

// ============================================================================
// Order State Machine - the single transition authority
// ============================================================================
//
// Transition table:
//   Created    -> Paid, Cancelled
//   Paid       -> Fulfilling, Shipped, Cancelled, Delivered (virtual-only)
//   Fulfilling -> Shipped, Cancelled
//   Shipped    -> Delivered, Returned
//   Delivered  -> Returned
//   Cancelled, Returned: terminal
//
// The machine never talks to collaborators. Callers invoke it only after the
// external side effect backing a transition has succeeded.
//
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct OrderStateMachine;

impl OrderStateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Targets reachable from `state`, ignoring per-order guards
    pub fn allowed_targets(state: OrderState) -> &'static [OrderState] {
        use OrderState::*;
        match state {
            Created => &[Paid, Cancelled],
            Paid => &[Fulfilling, Shipped, Cancelled, Delivered],
            Fulfilling => &[Shipped, Cancelled],
            Shipped => &[Delivered, Returned],
            Delivered => &[Returned],
            Cancelled | Returned => &[],
        }
    }

    /// Full check including the virtual-only guard on `Paid -> Delivered`
    pub fn can_transition(order: &Order, target: OrderState) -> bool {
        if !Self::allowed_targets(order.state()).contains(&target) {
            return false;
        }
        match (order.state(), target) {
            (OrderState::Paid, OrderState::Delivered) => order.is_virtual_only(),
            _ => true,
        }
    }

    pub fn attempt_transition(
        &self,
        order: &mut Order,
        target: OrderState,
        trigger: TransitionTrigger,
    ) -> Result<TransitionRecord, TransitionError> {
        let from = order.state();

        if !Self::can_transition(order, target) {
            tracing::error!(
                order_id = %order.id(),
                from = %from,
                to = %target,
                trigger = %trigger,
                "Illegal transition rejected"
            );
            return Err(TransitionError {
                order_id: order.id(),
                from,
                to: target,
            });
        }

        let record = TransitionRecord::new(from, target, trigger);
        order.state = target;
        order.updated_at = record.at;
        order.transitions.push(record.clone());

        tracing::info!(
            order_id = %order.id(),
            from = %from,
            to = %target,
            trigger = record.trigger.kind(),
            "Order transitioned"
        );

        Ok(record)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::{PaymentMethod, UserId};
    use crate::domain::order::{LineItem, OrderId, ProductId};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn physical_order() -> Order {
        Order::new(
            OrderId::new(),
            UserId::new(),
            vec![LineItem::new(ProductId::new("P1"), Decimal::from(10), 1, "general").unwrap()],
            None,
            PaymentMethod::CreditCard,
        )
    }

    fn virtual_order() -> Order {
        Order::new(
            OrderId::new(),
            UserId::new(),
            vec![LineItem::new_virtual(ProductId::new("V1"), Decimal::from(10), 1, "digital")
                .unwrap()],
            None,
            PaymentMethod::CreditCard,
        )
    }

    #[test]
    fn test_happy_path_physical() {
        let sm = OrderStateMachine::new();
        let mut order = physical_order();

        sm.attempt_transition(&mut order, OrderState::Paid, TransitionTrigger::PaymentCaptured)
            .unwrap();
        sm.attempt_transition(&mut order, OrderState::Fulfilling, TransitionTrigger::FulfillmentStarted)
            .unwrap();
        sm.attempt_transition(&mut order, OrderState::Shipped, TransitionTrigger::ShipmentCreated)
            .unwrap();
        let record = sm
            .attempt_transition(&mut order, OrderState::Delivered, TransitionTrigger::DeliveryConfirmed)
            .unwrap();

        assert_eq!(order.state(), OrderState::Delivered);
        assert_eq!(order.transitions().len(), 4);
        assert_eq!(record.from, OrderState::Shipped);
        assert_eq!(order.updated_at(), record.at);
    }

    #[test]
    fn test_illegal_transition_leaves_order_unchanged() {
        let sm = OrderStateMachine::new();
        let mut order = physical_order();
        let before = order.clone();

        let err = sm
            .attempt_transition(&mut order, OrderState::Shipped, TransitionTrigger::ShipmentCreated)
            .unwrap_err();

        assert_eq!(err.from, OrderState::Created);
        assert_eq!(err.to, OrderState::Shipped);
        assert_eq!(order, before);
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        assert!(OrderStateMachine::allowed_targets(OrderState::Cancelled).is_empty());
        assert!(OrderStateMachine::allowed_targets(OrderState::Returned).is_empty());
    }

    #[test]
    fn test_paid_to_delivered_only_for_virtual_orders() {
        let sm = OrderStateMachine::new();

        let mut digital = virtual_order();
        sm.attempt_transition(&mut digital, OrderState::Paid, TransitionTrigger::PaymentCaptured)
            .unwrap();
        assert!(sm
            .attempt_transition(&mut digital, OrderState::Delivered, TransitionTrigger::DigitalDelivery)
            .is_ok());

        let mut physical = physical_order();
        sm.attempt_transition(&mut physical, OrderState::Paid, TransitionTrigger::PaymentCaptured)
            .unwrap();
        assert!(sm
            .attempt_transition(&mut physical, OrderState::Delivered, TransitionTrigger::DigitalDelivery)
            .is_err());
        assert_eq!(physical.state(), OrderState::Paid);
    }

    #[test]
    fn test_shipped_is_not_cancellable() {
        let mut order = physical_order();
        let sm = OrderStateMachine::new();
        sm.attempt_transition(&mut order, OrderState::Paid, TransitionTrigger::PaymentCaptured)
            .unwrap();
        sm.attempt_transition(&mut order, OrderState::Shipped, TransitionTrigger::ShipmentCreated)
            .unwrap();
        assert!(!OrderStateMachine::can_transition(&order, OrderState::Cancelled));
    }

    fn arb_state() -> impl Strategy<Value = OrderState> {
        prop::sample::select(OrderState::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_random_sequences_stay_inside_table(
            targets in prop::collection::vec(arb_state(), 1..40),
            is_virtual in any::<bool>(),
        ) {
            let sm = OrderStateMachine::new();
            let mut order = if is_virtual { virtual_order() } else { physical_order() };

            for target in targets {
                let before = order.clone();
                let expected_ok = OrderStateMachine::allowed_targets(before.state()).contains(&target)
                    && !(before.state() == OrderState::Paid
                        && target == OrderState::Delivered
                        && !is_virtual);

                match sm.attempt_transition(&mut order, target, TransitionTrigger::PaymentCaptured) {
                    Ok(record) => {
                        prop_assert!(expected_ok);
                        prop_assert_eq!(record.from, before.state());
                        prop_assert_eq!(order.state(), target);
                        prop_assert_eq!(order.transitions().len(), before.transitions().len() + 1);
                    }
                    Err(_) => {
                        prop_assert!(!expected_ok);
                        prop_assert_eq!(&order, &before);
                    }
                }
            }

            for record in order.transitions() {
                prop_assert!(OrderStateMachine::allowed_targets(record.from).contains(&record.to));
            }
        }
    }
}
