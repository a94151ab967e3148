//! Checkout domain: cart arithmetic, payment rules and the immutable sale
//! transaction record.
//!
//! All amounts are [`Money`](forgepos_core::Money) in minor units.

pub mod cart;
pub mod payment;
pub mod transaction;

pub use cart::{Cart, CartItem, calculate_subtotal, calculate_total};
pub use payment::{CheckoutTotals, PaymentDetails, PaymentMethod, price_checkout};
pub use transaction::{
    RecordTransaction, SaleTransaction, TRANSACTION_AGGREGATE, TransactionCommand, TransactionEvent, TransactionId,
    TransactionLine, TransactionRecorded,
};
