use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::import::{Row, count_or};
use crate::model::InventoryItem;
use crate::notify::Notice;

pub const DEFAULT_UNIT: &str = "unid";
pub const DEFAULT_MIN_QUANTITY: u32 = 1;

const NAME_ALIASES: &[&str] = &["name", "Nombre", "Articulo"];
const CATEGORY_ALIASES: &[&str] = &["category", "Categoria"];
const QUANTITY_ALIASES: &[&str] = &["quantity", "Cantidad"];
const UNIT_ALIASES: &[&str] = &["unit", "Unidad"];
const MIN_ALIASES: &[&str] = &["minQuantity", "Minimo"];

#[derive(Debug, Clone, PartialEq)]
pub enum InventoryAction {
    Add(NewItem),
    AdjustQuantity { id: Uuid, delta: i64 },
    Update { id: Uuid, patch: ItemPatch },
    Delete(Uuid),
    /// Items already converted from spreadsheet rows, appended in order.
    Import(Vec<InventoryItem>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub name: String,
    pub category: String,
    pub quantity: u32,
    pub unit: String,
    pub min_quantity: u32,
}

impl NewItem {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for NewItem {
    fn default() -> Self {
        Self {
            name: String::new(),
            category: String::new(),
            quantity: 0,
            unit: DEFAULT_UNIT.to_string(),
            min_quantity: DEFAULT_MIN_QUANTITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub min_quantity: Option<u32>,
}

#[instrument(skip(items), fields(count = items.len()))]
pub fn reduce(
    items: &mut Vec<InventoryItem>,
    action: InventoryAction,
) -> Result<Vec<Notice>, ValidationError> {
    match action {
        InventoryAction::Add(new) => {
            let name = new.name.trim().to_string();
            if name.is_empty() {
                return Err(ValidationError::Required { field: "name" });
            }
            let notice = Notice::success(format!("Añadido: {name}"));
            items.push(InventoryItem {
                id: Uuid::new_v4(),
                name,
                category: new.category,
                quantity: new.quantity,
                unit: new.unit,
                min_quantity: new.min_quantity,
            });
            Ok(vec![notice])
        }
        InventoryAction::AdjustQuantity { id, delta } => {
            let item = find_mut(items, id)?;
            let was_above = item.quantity > item.min_quantity;
            item.quantity = apply_delta(item.quantity, delta);
            debug!(%id, delta, quantity = item.quantity, "adjusted quantity");

            // Only the transition into low stock notifies.
            if was_above && item.is_low_stock() {
                info!(item = %item.name, "stock crossed its minimum");
                Ok(vec![Notice::warning(format!("¡Stock bajo!: {}", item.name))])
            } else {
                Ok(vec![])
            }
        }
        InventoryAction::Update { id, patch } => {
            if let Some(name) = patch.name.as_deref()
                && name.trim().is_empty()
            {
                return Err(ValidationError::Required { field: "name" });
            }
            let item = find_mut(items, id)?;
            if let Some(name) = patch.name {
                item.name = name.trim().to_string();
            }
            if let Some(category) = patch.category {
                item.category = category;
            }
            if let Some(unit) = patch.unit {
                item.unit = unit;
            }
            if let Some(min) = patch.min_quantity {
                item.min_quantity = min;
            }
            Ok(vec![])
        }
        InventoryAction::Delete(id) => {
            let before = items.len();
            items.retain(|i| i.id != id);
            if items.len() == before {
                return Err(unknown(id));
            }
            Ok(vec![])
        }
        InventoryAction::Import(imported) => {
            let count = imported.len();
            items.extend(imported);
            Ok(vec![Notice::success(format!(
                "{count} artículos importados desde Excel"
            ))])
        }
    }
}

pub fn item_from_row(row: &Row) -> InventoryItem {
    InventoryItem {
        id: Uuid::new_v4(),
        name: row
            .first(NAME_ALIASES)
            .unwrap_or("Articulo importado")
            .to_string(),
        category: row.first(CATEGORY_ALIASES).unwrap_or("General").to_string(),
        quantity: count_or(row.first(QUANTITY_ALIASES), 0),
        unit: row.first(UNIT_ALIASES).unwrap_or(DEFAULT_UNIT).to_string(),
        min_quantity: count_or(row.first(MIN_ALIASES), DEFAULT_MIN_QUANTITY),
    }
}

pub fn low_stock_count(items: &[InventoryItem]) -> usize {
    items.iter().filter(|i| i.is_low_stock()).count()
}

fn apply_delta(quantity: u32, delta: i64) -> u32 {
    let next = i64::from(quantity)
        .saturating_add(delta)
        .clamp(0, i64::from(u32::MAX));
    u32::try_from(next).unwrap_or(u32::MAX)
}

fn find_mut(items: &mut [InventoryItem], id: Uuid) -> Result<&mut InventoryItem, ValidationError> {
    items
        .iter_mut()
        .find(|i| i.id == id)
        .ok_or_else(|| unknown(id))
}

fn unknown(id: Uuid) -> ValidationError {
    ValidationError::UnknownId {
        entity: "inventory item",
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stocked(quantity: u32, min_quantity: u32) -> (Vec<InventoryItem>, Uuid) {
        let mut items = Vec::new();
        reduce(
            &mut items,
            InventoryAction::Add(NewItem {
                name: "Leche".to_string(),
                quantity,
                min_quantity,
                ..NewItem::default()
            }),
        )
        .unwrap();
        let id = items[0].id;
        (items, id)
    }

    fn adjust(items: &mut Vec<InventoryItem>, id: Uuid, delta: i64) -> Vec<Notice> {
        reduce(items, InventoryAction::AdjustQuantity { id, delta }).unwrap()
    }

    #[test]
    fn add_uses_form_defaults() {
        let mut items = Vec::new();
        let notices = reduce(&mut items, InventoryAction::Add(NewItem::named("Arroz"))).unwrap();
        assert_eq!(items[0].unit, "unid");
        assert_eq!(items[0].quantity, 0);
        assert_eq!(items[0].min_quantity, 1);
        assert_eq!(notices, vec![Notice::success("Añadido: Arroz")]);
    }

    #[test]
    fn quantity_never_goes_below_zero() {
        let (mut items, id) = stocked(2, 0);
        for _ in 0..10 {
            adjust(&mut items, id, -1);
        }
        assert_eq!(items[0].quantity, 0);
        adjust(&mut items, id, -1_000);
        assert_eq!(items[0].quantity, 0);
    }

    #[test]
    fn low_stock_fires_once_per_crossing() {
        let (mut items, id) = stocked(4, 2);

        assert!(adjust(&mut items, id, -1).is_empty()); // 3
        let crossing = adjust(&mut items, id, -1); // 2
        assert_eq!(crossing, vec![Notice::warning("¡Stock bajo!: Leche")]);
        assert!(adjust(&mut items, id, -1).is_empty()); // 1
        assert!(adjust(&mut items, id, -1).is_empty()); // 0
        assert!(adjust(&mut items, id, -1).is_empty()); // still 0

        assert!(adjust(&mut items, id, 5).is_empty()); // 5, restocked
        assert_eq!(adjust(&mut items, id, -3).len(), 1); // 2, crosses again
    }

    #[test]
    fn large_single_drop_counts_as_one_crossing() {
        let (mut items, id) = stocked(10, 3);
        assert_eq!(adjust(&mut items, id, -9).len(), 1);
        assert_eq!(items[0].quantity, 1);
    }

    #[test]
    fn extreme_deltas_saturate() {
        let (mut items, id) = stocked(5, 1);
        assert!(adjust(&mut items, id, i64::MAX).is_empty());
        assert_eq!(items[0].quantity, u32::MAX);

        assert_eq!(adjust(&mut items, id, i64::MIN).len(), 1);
        assert_eq!(items[0].quantity, 0);
        assert!(adjust(&mut items, id, i64::MIN).is_empty());
    }

    #[test]
    fn import_appends_with_defaults() {
        let (mut items, existing) = stocked(4, 2);
        let row = Row::from_pairs([("Nombre", "Arroz"), ("Cantidad", "5")]);
        let notices = reduce(&mut items, InventoryAction::Import(vec![item_from_row(&row)])).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, existing);
        let arroz = &items[1];
        assert_eq!(arroz.name, "Arroz");
        assert_eq!(arroz.quantity, 5);
        assert_eq!(arroz.unit, "unid");
        assert_eq!(arroz.min_quantity, 1);
        assert_eq!(arroz.category, "General");
        assert_eq!(notices[0].message, "1 artículos importados desde Excel");
    }

    #[test]
    fn english_headers_win_over_spanish_aliases() {
        let row = Row::from_pairs([
            ("name", "Rice"),
            ("Nombre", "Arroz"),
            ("minQuantity", "3"),
            ("unit", "kg"),
        ]);
        let item = item_from_row(&row);
        assert_eq!(item.name, "Rice");
        assert_eq!(item.min_quantity, 3);
        assert_eq!(item.unit, "kg");
    }
}
