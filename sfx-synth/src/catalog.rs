//! Named recipe collections
//!
//! The built-in catalog is embedded from `catalog/effects.toml`. User catalogs use
//! the same format and can be merged over it.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, SynthError};
use crate::recipe::Recipe;

const BUILTIN: &str = include_str!("../catalog/effects.toml");

/// On-disk layout: a list of `[[recipe]]` tables
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "recipe")]
    recipes: Vec<Recipe>,
}

/// Ordered set of uniquely named recipes
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    recipes: Vec<Recipe>,
}

impl Catalog {
    /// The effects shipped with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN)
    }

    /// Parse and validate a catalog
    pub fn from_toml(text: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(text)?;
        Self::from_recipes(file.recipes)
    }

    /// Read a catalog file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let catalog = Self::from_toml(&text)?;
        debug!(path = %path.display(), recipes = catalog.len(), "loaded catalog");
        Ok(catalog)
    }

    /// Build a catalog, rejecting duplicate names and invalid recipes
    pub fn from_recipes(recipes: Vec<Recipe>) -> Result<Self> {
        let mut seen = HashSet::new();
        for recipe in &recipes {
            if !seen.insert(recipe.name.as_str()) {
                return Err(SynthError::DuplicateRecipe(recipe.name.clone()));
            }
            recipe.validate()?;
        }
        Ok(Self { recipes })
    }

    /// Overlay `other`: same-named recipes are replaced in place, new ones appended
    pub fn merge(&mut self, other: Catalog) {
        for recipe in other.recipes {
            match self.recipes.iter_mut().find(|r| r.name == recipe.name) {
                Some(existing) => {
                    debug!(name = %recipe.name, "overriding recipe");
                    *existing = recipe;
                }
                None => self.recipes.push(recipe),
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<&Recipe> {
        self.recipes
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| SynthError::UnknownRecipe(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.recipes.iter().any(|r| r.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.recipes.iter().map(|r| r.name.as_str())
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    /// Recipes grouped by category, categories in order of first appearance
    pub fn by_category(&self) -> Vec<(&str, Vec<&Recipe>)> {
        let mut groups: Vec<(&str, Vec<&Recipe>)> = Vec::new();
        for recipe in &self.recipes {
            match groups.iter_mut().find(|(c, _)| *c == recipe.category) {
                Some((_, members)) => members.push(recipe),
                None => groups.push((recipe.category.as_str(), vec![recipe])),
            }
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

impl Recipe {
    /// Serialize as a one-recipe catalog, loadable with [`Catalog::from_toml`]
    pub fn to_toml(&self) -> Result<String> {
        let file = CatalogFile {
            recipes: vec![self.clone()],
        };
        Ok(toml::to_string_pretty(&file)?)
    }
}
