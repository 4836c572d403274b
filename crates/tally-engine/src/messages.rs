//! Chat message texts.

use rust_decimal::Decimal;

/// `<@id>` mention syntax understood by the chat platform.
pub fn mention(transport_id: &str) -> String {
    format!("<@{transport_id}>")
}

pub fn reminder(
    amount: Decimal,
    currency: &str,
    lender_transport_id: &str,
    order_id: &str,
    mark_paid: &str,
) -> String {
    format!(
        "Reminder, you should pay {amount:.2} {currency} to {} for order ID {order_id}.\n\
         If you paid, you can mark yourself as paid by adding :{mark_paid}: reaction to this message or to the original rates message.",
        mention(lender_transport_id)
    )
}

pub fn debt_removed(order_id: &str) -> String {
    format!("OK! I removed your debt for order {order_id}")
}

pub fn marked_paid(borrower_transport_id: &str, order_id: &str) -> String {
    format!(
        "{} marked themselves as paid for order ID {order_id}",
        mention(borrower_transport_id)
    )
}

pub fn order_cancelled(order_id: &str, reason: &str) -> String {
    format!("I removed all debts for order ID {order_id} because {reason}")
}

pub fn host_only(host_transport_id: &str) -> String {
    format!(
        "Nice try :stuck_out_tongue_winking_eye: Only the host ({}) can cancel debts for this order",
        mention(host_transport_id)
    )
}

pub fn tracking_started(
    mark_paid: &str,
    host_transport_id: &str,
    host_cancel: &str,
    order_id: &str,
) -> String {
    format!(
        "I'll keep reminding you to pay, when you pay you can react with :{mark_paid}: to the rates message and I'll stop bothering you.\n\
         {}, as the host, you can react with :{host_cancel}: to the rates message to cancel debts tracking for order ID {order_id}",
        mention(host_transport_id)
    )
}

pub fn lender_unknown(lender_id: &str, order_id: &str) -> String {
    format!("I didn't find the user of the host ({lender_id}), I won't track debts for order {order_id}")
}

pub fn borrower_unknown(user_id: &str) -> String {
    format!("I won't track {user_id:?} payment because I can't find their user.")
}

pub fn operator_failure(context: &str, error: &str) -> String {
    format!(":warning: {context}: {error}")
}
