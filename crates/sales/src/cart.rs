use serde::{Deserialize, Serialize};

use forgepos_core::{DomainError, DomainResult, Money, ValueObject};
use forgepos_products::ProductId;

/// One cart line, priced from the catalog at the time it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    pub unit_cost: Money,
    pub quantity: i64,
    /// Line discount as an amount (not per unit).
    #[serde(default)]
    pub discount: Money,
}

impl ValueObject for CartItem {}

impl CartItem {
    /// `unit_price × quantity`, before the line discount.
    pub fn gross(&self) -> DomainResult<Money> {
        self.unit_price.checked_mul(self.quantity)
    }

    /// `unit_price × quantity − discount`.
    pub fn line_total(&self) -> DomainResult<Money> {
        self.gross()?.checked_sub(self.discount)
    }

    pub fn cost_of_goods(&self) -> DomainResult<Money> {
        self.unit_cost.checked_mul(self.quantity)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "quantity for '{}' must be positive",
                self.sku
            )));
        }
        if self.discount.is_negative() {
            return Err(DomainError::validation(format!(
                "discount for '{}' cannot be negative",
                self.sku
            )));
        }
        if self.discount > self.gross()? {
            return Err(DomainError::validation(format!(
                "discount for '{}' exceeds the line amount",
                self.sku
            )));
        }
        Ok(())
    }
}

/// A shopping cart. Lines keep insertion order; the same product may appear
/// on several lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<CartItem>) -> Self {
        Self { items }
    }

    pub fn add(&mut self, item: CartItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Non-empty and every line individually valid.
    pub fn validate(&self) -> DomainResult<()> {
        if self.items.is_empty() {
            return Err(DomainError::validation("cart is empty"));
        }
        self.items.iter().try_for_each(CartItem::validate)
    }
}

/// Σ over lines of `unit_price × quantity − discount`.
pub fn calculate_subtotal(cart: &Cart) -> DomainResult<Money> {
    cart.items()
        .iter()
        .try_fold(Money::ZERO, |acc, item| acc.checked_add(item.line_total()?))
}

/// `subtotal − discount`. Not clamped: a discount larger than the subtotal
/// yields a negative total, which checkout rejects.
pub fn calculate_total(cart: &Cart, discount: Money) -> DomainResult<Money> {
    calculate_subtotal(cart)?.checked_sub(discount)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use forgepos_core::AggregateId;
    use proptest::prelude::*;

    pub(crate) fn item(price: i64, quantity: i64, discount: i64) -> CartItem {
        CartItem {
            product_id: ProductId::new(AggregateId::new()),
            sku: format!("SKU-{price}"),
            name: "Item".to_string(),
            unit_price: Money::new(price),
            unit_cost: Money::new(price / 2),
            quantity,
            discount: Money::new(discount),
        }
    }

    #[test]
    fn example_cart_totals() {
        let cart = Cart::from_items(vec![item(3500, 2, 0)]);
        assert_eq!(calculate_subtotal(&cart).unwrap(), Money::new(7000));
        assert_eq!(calculate_total(&cart, Money::ZERO).unwrap(), Money::new(7000));
    }

    #[test]
    fn line_discounts_reduce_subtotal() {
        let cart = Cart::from_items(vec![item(1000, 3, 500), item(250, 4, 0)]);
        assert_eq!(calculate_subtotal(&cart).unwrap(), Money::new(3500));
    }

    #[test]
    fn total_is_not_clamped() {
        let cart = Cart::from_items(vec![item(100, 1, 0)]);
        assert_eq!(calculate_total(&cart, Money::new(150)).unwrap(), Money::new(-50));
    }

    #[test]
    fn empty_cart_is_invalid_but_sums_to_zero() {
        let cart = Cart::new();
        assert_eq!(calculate_subtotal(&cart).unwrap(), Money::ZERO);
        assert!(matches!(cart.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn line_validation() {
        assert!(item(100, 0, 0).validate().is_err());
        assert!(item(100, 1, -1).validate().is_err());
        assert!(item(100, 2, 201).validate().is_err());
        assert!(item(100, 2, 200).validate().is_ok());
    }

    #[test]
    fn clear_empties_the_cart() {
        let mut cart = Cart::from_items(vec![item(1, 1, 0)]);
        cart.add(item(2, 2, 0));
        assert_eq!(cart.total_quantity(), 3);
        cart.clear();
        assert!(cart.is_empty());
    }

    proptest! {
        #[test]
        fn total_is_subtotal_minus_discount(
            lines in prop::collection::vec((0i64..100_000, 1i64..50, 0i64..1_000), 0..20),
            discount in -10_000i64..1_000_000,
        ) {
            let cart = Cart::from_items(
                lines.iter().map(|&(p, q, d)| item(p, q, d)).collect()
            );
            let subtotal = calculate_subtotal(&cart).unwrap();
            let expected: i64 = lines.iter().map(|&(p, q, d)| p * q - d).sum();
            prop_assert_eq!(subtotal.minor_units(), expected);
            prop_assert_eq!(
                calculate_total(&cart, Money::new(discount)).unwrap().minor_units(),
                expected - discount
            );
        }
    }
}
