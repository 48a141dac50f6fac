use serde::{Deserialize, Serialize};

use super::invoice::LineItem;
use super::money::{Currency, Money, MoneyError};

/// A customer's cart. Owned by whoever builds the order request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<LineItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a line, merging quantities with an identical menu choice.
    pub fn add(&mut self, item: LineItem) {
        match self.lines.iter_mut().find(|line| line.same_choice(&item)) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
            }
            None => self.lines.push(item),
        }
    }

    /// Removes a line; returns it if it was present.
    pub fn remove(&mut self, name: &str, selected_size: Option<&str>) -> Option<LineItem> {
        let position = self.position(name, selected_size)?;
        Some(self.lines.remove(position))
    }

    /// Sets a line's quantity. Zero removes the line. Returns false for an unknown line.
    pub fn update_quantity(&mut self, name: &str, selected_size: Option<&str>, quantity: u32) -> bool {
        let Some(position) = self.position(name, selected_size) else {
            return false;
        };
        if quantity == 0 {
            self.lines.remove(position);
        } else {
            self.lines[position].quantity = quantity;
        }
        true
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    pub fn subtotal(&self, currency: Currency) -> Result<Money, MoneyError> {
        self.lines.iter().try_fold(Money::zero(currency), |acc, line| {
            acc.checked_add(line.line_total()?)
        })
    }

    pub fn into_line_items(self) -> Vec<LineItem> {
        self.lines
    }

    fn position(&self, name: &str, selected_size: Option<&str>) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.name == name && line.selected_size.as_deref() == selected_size)
    }
}

impl FromIterator<LineItem> for Cart {
    fn from_iter<I: IntoIterator<Item = LineItem>>(iter: I) -> Self {
        let mut cart = Cart::new();
        for item in iter {
            cart.add(item);
        }
        cart
    }
}
