//! Goods carried by units and settlements.

use crate::element::{DecodeError, Element, ElementCodec};
use serde::{Deserialize, Serialize};

/// Amount that fills one cargo slot.
pub const GOODS_PER_SLOT: u32 = 100;

/// A quantity of one goods type, e.g. `100 model.goods.cotton`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Goods {
    /// Goods type identifier such as `model.goods.cotton`.
    pub goods_type: String,
    /// Quantity.
    pub amount: u32,
}

impl Goods {
    /// Create a goods quantity.
    pub fn new(goods_type: impl Into<String>, amount: u32) -> Self {
        Self {
            goods_type: goods_type.into(),
            amount,
        }
    }

    /// Cargo slots this quantity occupies.
    pub fn slots(&self) -> u32 {
        self.amount.div_ceil(GOODS_PER_SLOT)
    }
}

impl ElementCodec for Goods {
    const TAG: &'static str = "goods";

    fn to_element(&self) -> Element {
        Element::new(Self::TAG)
            .with_attr("type", &self.goods_type)
            .with_attr("amount", self.amount)
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        element.expect_tag(Self::TAG)?;
        Ok(Self {
            goods_type: element.required_attr("type")?.to_string(),
            amount: element.parse_attr("amount")?,
        })
    }
}

/// Add `goods` into `cargo`, merging with an existing entry of the same type.
/// Returns false (leaving `cargo` untouched) when the merged amount would
/// overflow.
#[must_use]
pub fn merge_into(cargo: &mut Vec<Goods>, goods: &Goods) -> bool {
    match cargo.iter_mut().find(|held| held.goods_type == goods.goods_type) {
        Some(held) => match held.amount.checked_add(goods.amount) {
            Some(total) => {
                held.amount = total;
                true
            }
            None => false,
        },
        None => {
            cargo.push(goods.clone());
            true
        }
    }
}

/// Amount of `goods_type` held in `cargo`, saturating at `u32::MAX`.
pub fn amount_of(cargo: &[Goods], goods_type: &str) -> u32 {
    cargo
        .iter()
        .filter(|held| held.goods_type == goods_type)
        .fold(0u32, |total, held| total.saturating_add(held.amount))
}

/// Remove `goods` from `cargo`; returns false (leaving `cargo` untouched)
/// when not enough is held.
pub fn take_from(cargo: &mut Vec<Goods>, goods: &Goods) -> bool {
    let Some(index) = cargo
        .iter()
        .position(|held| held.goods_type == goods.goods_type && held.amount >= goods.amount)
    else {
        return false;
    };
    cargo[index].amount -= goods.amount;
    if cargo[index].amount == 0 {
        cargo.remove(index);
    }
    true
}

/// Total cargo slots used by `cargo`.
pub fn slots_used(cargo: &[Goods]) -> u32 {
    cargo
        .iter()
        .fold(0u32, |total, goods| total.saturating_add(goods.slots()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goods_element_form_is_stable() {
        let goods = Goods::new("model.goods.cotton", 100);
        assert_eq!(
            goods.to_element().to_string(),
            r#"<goods type="model.goods.cotton" amount="100"/>"#
        );
        assert_eq!(Goods::from_element(&goods.to_element()).unwrap(), goods);
    }

    #[test]
    fn amount_is_required() {
        let element = Element::new("goods").with_attr("type", "model.goods.furs");
        assert!(matches!(
            Goods::from_element(&element),
            Err(DecodeError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn merge_and_take_keep_cargo_consistent() {
        let mut cargo = vec![Goods::new("model.goods.cotton", 40)];
        assert!(merge_into(&mut cargo, &Goods::new("model.goods.cotton", 60)));
        assert!(merge_into(&mut cargo, &Goods::new("model.goods.furs", 150)));
        assert_eq!(amount_of(&cargo, "model.goods.cotton"), 100);
        assert_eq!(slots_used(&cargo), 3);

        assert!(!take_from(&mut cargo, &Goods::new("model.goods.furs", 151)));
        assert!(take_from(&mut cargo, &Goods::new("model.goods.cotton", 100)));
        assert_eq!(cargo, vec![Goods::new("model.goods.furs", 150)]);
    }

    #[test]
    fn merge_refuses_to_overflow() {
        let mut cargo = vec![Goods::new("model.goods.cotton", 1 << 31)];
        assert!(!merge_into(&mut cargo, &Goods::new("model.goods.cotton", (1 << 31) + 50)));
        assert_eq!(cargo, vec![Goods::new("model.goods.cotton", 1 << 31)]);

        cargo.push(Goods::new("model.goods.cotton", u32::MAX));
        assert_eq!(amount_of(&cargo, "model.goods.cotton"), u32::MAX);
        assert_eq!(slots_used(&[Goods::new("a", u32::MAX), Goods::new("b", u32::MAX)]), 85_899_346);
    }
}
