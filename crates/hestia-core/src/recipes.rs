use tracing::instrument;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::import::Row;
use crate::model::{InventoryItem, Recipe};
use crate::notify::Notice;

const TITLE_ALIASES: &[&str] = &["title", "Nombre"];
const PREP_TIME_ALIASES: &[&str] = &["prepTime", "Tiempo"];
const INGREDIENT_ALIASES: &[&str] = &["ingredients", "Ingredientes"];
const INSTRUCTION_ALIASES: &[&str] = &["instructions", "Pasos"];

#[derive(Debug, Clone, PartialEq)]
pub enum RecipeAction {
    Add(NewRecipe),
    Update { id: Uuid, patch: RecipePatch },
    Delete(Uuid),
    Import(Vec<Recipe>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRecipe {
    pub title: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub prep_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipePatch {
    pub title: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<Vec<String>>,
    pub prep_time: Option<String>,
}

#[instrument(skip(recipes), fields(count = recipes.len()))]
pub fn reduce(
    recipes: &mut Vec<Recipe>,
    action: RecipeAction,
) -> Result<Vec<Notice>, ValidationError> {
    match action {
        RecipeAction::Add(new) => {
            let title = new.title.trim().to_string();
            if title.is_empty() {
                return Err(ValidationError::Required { field: "title" });
            }
            recipes.push(Recipe {
                id: Uuid::new_v4(),
                title,
                ingredients: new.ingredients,
                instructions: new.instructions,
                prep_time: new.prep_time,
            });
            Ok(vec![Notice::success("Receta guardada")])
        }
        RecipeAction::Update { id, patch } => {
            if let Some(title) = patch.title.as_deref()
                && title.trim().is_empty()
            {
                return Err(ValidationError::Required { field: "title" });
            }
            let recipe = recipes
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| unknown(id))?;
            if let Some(title) = patch.title {
                recipe.title = title.trim().to_string();
            }
            if let Some(ingredients) = patch.ingredients {
                recipe.ingredients = ingredients;
            }
            if let Some(instructions) = patch.instructions {
                recipe.instructions = instructions;
            }
            if let Some(prep_time) = patch.prep_time {
                recipe.prep_time = prep_time;
            }
            Ok(vec![])
        }
        RecipeAction::Delete(id) => {
            let before = recipes.len();
            recipes.retain(|r| r.id != id);
            if recipes.len() == before {
                return Err(unknown(id));
            }
            Ok(vec![])
        }
        RecipeAction::Import(imported) => {
            let count = imported.len();
            recipes.extend(imported);
            Ok(vec![Notice::success(format!(
                "{count} recetas importadas desde Excel"
            ))])
        }
    }
}

pub fn recipe_from_row(row: &Row) -> Recipe {
    Recipe {
        id: Uuid::new_v4(),
        title: row
            .first(TITLE_ALIASES)
            .unwrap_or("Receta importada")
            .to_string(),
        prep_time: row.first(PREP_TIME_ALIASES).unwrap_or("30 min").to_string(),
        ingredients: split_list(row.first(INGREDIENT_ALIASES).unwrap_or_default(), &[',']),
        instructions: split_list(row.first(INSTRUCTION_ALIASES).unwrap_or_default(), &['.']),
    }
}

/// Free-text ingredient entry: commas and line breaks both separate items.
pub fn parse_ingredients(raw: &str) -> Vec<String> {
    split_list(raw, &[',', '\n'])
}

pub fn parse_instructions(raw: &str) -> Vec<String> {
    split_list(raw, &['\n'])
}

fn split_list(raw: &str, separators: &[char]) -> Vec<String> {
    raw.split(separators)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Ingredients with no in-stock inventory item whose name contains them,
/// compared case-insensitively.
///
/// This is a substring heuristic, not an ingredient-to-item mapping: "sal"
/// is satisfied by "Salsa de tomate" (false positive), and "Tomates" is not
/// satisfied by "Tomate" (false negative).
pub fn missing_ingredients<'a>(recipe: &'a Recipe, inventory: &[InventoryItem]) -> Vec<&'a str> {
    recipe
        .ingredients
        .iter()
        .filter(|ingredient| {
            let needle = ingredient.to_lowercase();
            !inventory
                .iter()
                .any(|item| item.quantity > 0 && item.name.to_lowercase().contains(&needle))
        })
        .map(String::as_str)
        .collect()
}

fn unknown(id: Uuid) -> ValidationError {
    ValidationError::UnknownId {
        entity: "recipe",
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, quantity: u32) -> InventoryItem {
        InventoryItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            category: String::new(),
            quantity,
            unit: "unid".to_string(),
            min_quantity: 1,
        }
    }

    fn recipe(ingredients: &[&str]) -> Recipe {
        Recipe {
            id: Uuid::new_v4(),
            title: "Ensalada".to_string(),
            ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            instructions: vec![],
            prep_time: String::new(),
        }
    }

    #[test]
    fn reports_exactly_the_missing_ingredient() {
        let inventory = vec![item("Tomate", 2)];
        let r = recipe(&["Tomate", "Queso"]);
        assert_eq!(missing_ingredients(&r, &inventory), vec!["Queso"]);
    }

    #[test]
    fn out_of_stock_items_do_not_count() {
        let inventory = vec![item("Tomate", 0)];
        let r = recipe(&["tomate"]);
        assert_eq!(missing_ingredients(&r, &inventory), vec!["tomate"]);
    }

    #[test]
    fn matching_is_a_case_insensitive_substring() {
        let inventory = vec![item("Salsa de Tomate", 1)];
        assert!(missing_ingredients(&recipe(&["SAL", "tomate"]), &inventory).is_empty());
        assert_eq!(
            missing_ingredients(&recipe(&["Tomates"]), &[item("Tomate", 3)]),
            vec!["Tomates"]
        );
    }

    #[test]
    fn add_requires_title_and_appends() {
        let mut recipes = vec![recipe(&[])];
        assert!(reduce(&mut recipes, RecipeAction::Add(NewRecipe::default())).is_err());

        let notices = reduce(
            &mut recipes,
            RecipeAction::Add(NewRecipe {
                title: "Tortilla".to_string(),
                ingredients: parse_ingredients("Huevos, Papas\nCebolla,,"),
                ..NewRecipe::default()
            }),
        )
        .unwrap();
        assert_eq!(recipes.len(), 2);
        assert_eq!(recipes[1].title, "Tortilla");
        assert_eq!(recipes[1].ingredients, vec!["Huevos", "Papas", "Cebolla"]);
        assert_eq!(notices, vec![Notice::success("Receta guardada")]);
    }

    #[test]
    fn import_splits_ingredients_and_steps() {
        let mut recipes = Vec::new();
        let rows = vec![
            Row::from_pairs([
                ("Nombre", "Arroz con leche"),
                ("Ingredientes", "Arroz, Leche , Azúcar"),
                ("Pasos", "Hervir la leche. Añadir el arroz. Servir."),
            ]),
            Row::from_pairs([("Tiempo", "10 min")]),
        ];
        let imported = rows.iter().map(recipe_from_row).collect();
        reduce(&mut recipes, RecipeAction::Import(imported)).unwrap();

        assert_eq!(recipes[0].title, "Arroz con leche");
        assert_eq!(recipes[0].prep_time, "30 min");
        assert_eq!(recipes[0].ingredients, vec!["Arroz", "Leche", "Azúcar"]);
        assert_eq!(
            recipes[0].instructions,
            vec!["Hervir la leche", "Añadir el arroz", "Servir"]
        );
        assert_eq!(recipes[1].title, "Receta importada");
        assert_eq!(recipes[1].prep_time, "10 min");
        assert!(recipes[1].ingredients.is_empty());
    }
}
