use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::invoice::{FoodType, LineItem};
use super::money::{Currency, Money};
use crate::errors::ServiceError;

const EMBEDDED_MENU: &str = include_str!("../../data/menu.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MenuVariant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Display price label, e.g. `₹59`
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MenuItem {
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_type: Option<FoodType>,
    pub description: String,
    pub image: String,
    pub variants: Vec<MenuVariant>,
}

#[derive(Debug, Deserialize)]
struct MenuDocument {
    items: Vec<MenuItem>,
}

/// Read-only restaurant menu.
#[derive(Debug, Clone)]
pub struct MenuCatalog {
    items: Vec<MenuItem>,
    currency: Currency,
}

impl MenuCatalog {
    /// The menu bundled into the binary.
    pub fn embedded(currency: Currency) -> Result<Self, ServiceError> {
        Self::from_json(EMBEDDED_MENU, currency)
    }

    /// Parses a menu document; every item needs at least one variant with a valid price.
    pub fn from_json(json: &str, currency: Currency) -> Result<Self, ServiceError> {
        let document: MenuDocument = serde_json::from_str(json)?;
        for item in &document.items {
            if item.variants.is_empty() {
                return Err(ServiceError::InvalidInput(format!(
                    "menu item '{}' has no variants",
                    item.name
                )));
            }
            for variant in &item.variants {
                Money::parse_label(&variant.price, currency).map_err(|e| {
                    ServiceError::InvalidInput(format!("menu item '{}': {}", item.name, e))
                })?;
            }
        }
        Ok(Self {
            items: document.items,
            currency,
        })
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    /// Categories in menu order.
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for item in &self.items {
            if !categories.contains(&item.category.as_str()) {
                categories.push(&item.category);
            }
        }
        categories
    }

    pub fn in_category(&self, category: &str) -> Vec<&MenuItem> {
        self.items
            .iter()
            .filter(|item| item.category.eq_ignore_ascii_case(category))
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<&MenuItem> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Price for `name`; without a size the first variant is used.
    pub fn price_of(&self, name: &str, size: Option<&str>) -> Option<Money> {
        let item = self.find(name)?;
        let variant = match size {
            Some(size) => item
                .variants
                .iter()
                .find(|v| v.size.as_deref() == Some(size))?,
            None => item.variants.first()?,
        };
        Money::parse_label(&variant.price, self.currency).ok()
    }

    /// Rejects lines that are not on the menu or carry a different price.
    pub fn check_line(&self, line: &LineItem) -> Result<(), ServiceError> {
        let expected = self
            .price_of(&line.name, line.selected_size.as_deref())
            .ok_or_else(|| match &line.selected_size {
                Some(size) => ServiceError::ValidationError(format!(
                    "'{}' ({}) is not on the menu",
                    line.name, size
                )),
                None => ServiceError::ValidationError(format!("'{}' is not on the menu", line.name)),
            })?;

        if expected != line.unit_price {
            return Err(ServiceError::ValidationError(format!(
                "price for '{}' is {}, menu says {}",
                line.name,
                line.unit_price.label(),
                expected.label()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn catalog() -> MenuCatalog {
        MenuCatalog::embedded(Currency::Inr).expect("embedded menu parses")
    }

    #[test]
    fn embedded_menu_has_all_categories() {
        let catalog = catalog();
        assert_eq!(catalog.items().len(), 25);
        assert_eq!(
            catalog.categories(),
            vec!["Rolls", "Pizza", "Burgers", "Broasted", "Fries", "Pasta", "Sauce"]
        );
        assert_eq!(catalog.in_category("pasta").len(), 4);
    }

    #[test]
    fn price_lookup_defaults_to_first_variant() {
        let catalog = catalog();
        assert_eq!(catalog.price_of("Veg Roll", None).unwrap().label(), "₹59");
        assert_eq!(
            catalog.price_of("Veg Roll", Some("Jumbo")).unwrap().label(),
            "₹99"
        );
        assert_eq!(
            catalog.price_of("Broasted Chicken", Some("5pcs")).unwrap().label(),
            "₹350"
        );
        assert!(catalog.price_of("Veg Roll", Some("Family")).is_none());
    }

    #[test]
    fn mismatched_price_is_rejected() {
        let catalog = catalog();
        let cheap = Money::parse_label("₹1", Currency::Inr).unwrap();
        let line = LineItem::new("Cheese Pizza", cheap, 1, "Pizza").unwrap();
        assert_matches!(catalog.check_line(&line), Err(ServiceError::ValidationError(_)));

        let fair = Money::parse_label("₹79", Currency::Inr).unwrap();
        let line = LineItem::new("Cheese Pizza", fair, 1, "Pizza").unwrap();
        assert!(catalog.check_line(&line).is_ok());
    }

    #[test]
    fn variant_without_price_fails_to_load() {
        let json = r#"{"items":[{"name":"Tea","category":"Drinks","description":"","image":"","variants":[]}]}"#;
        assert_matches!(
            MenuCatalog::from_json(json, Currency::Inr),
            Err(ServiceError::InvalidInput(_))
        );
    }
}
