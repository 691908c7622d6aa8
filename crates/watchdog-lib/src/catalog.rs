//! Service categorisation
//!
//! Maps container names to the categories the watchdog acts on. The map is
//! built once from configuration; lookups at tick time are exact.

use std::collections::HashMap;
use std::fmt;

/// Category a service can be tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Restarted whenever it is found not running
    Critical,
    /// Stopped while the CPU is too hot
    ThermalShed,
    /// Stopped while the battery is low and not charging
    BatteryShed,
}

impl Category {
    const fn bit(self) -> u8 {
        match self {
            Category::Critical => 0b001,
            Category::ThermalShed => 0b010,
            Category::BatteryShed => 0b100,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Critical => "critical",
            Category::ThermalShed => "thermal_shed",
            Category::BatteryShed => "battery_shed",
        };
        f.write_str(name)
    }
}

/// Set of categories attached to one service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategorySet(u8);

impl CategorySet {
    pub const EMPTY: CategorySet = CategorySet(0);

    pub fn with(self, category: Category) -> Self {
        CategorySet(self.0 | category.bit())
    }

    pub fn contains(self, category: Category) -> bool {
        self.0 & category.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<Category> for CategorySet {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        iter.into_iter().fold(CategorySet::EMPTY, CategorySet::with)
    }
}

/// Explicit mapping from container name to category tags
///
/// A configured entry `ollama` tags both the container named `ollama` and,
/// when a name prefix is set, the container named `{prefix}ollama`.
/// Matching is case-insensitive; blank entries are ignored.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    name_prefix: String,
    tags: HashMap<String, CategorySet>,
}

impl ServiceCatalog {
    /// Create an empty catalog resolving entries with the given name prefix
    pub fn new(name_prefix: impl Into<String>) -> Self {
        Self {
            name_prefix: name_prefix.into().trim().to_lowercase(),
            tags: HashMap::new(),
        }
    }

    /// Tag every configured entry with `category`
    pub fn with_category<I, S>(mut self, category: Category, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for entry in entries {
            let entry = entry.as_ref().trim().to_lowercase();
            if entry.is_empty() {
                continue;
            }
            if !self.name_prefix.is_empty() && !entry.starts_with(&self.name_prefix) {
                let prefixed = format!("{}{}", self.name_prefix, entry);
                self.insert(prefixed, category);
            }
            self.insert(entry, category);
        }
        self
    }

    fn insert(&mut self, name: String, category: Category) {
        let set = self.tags.entry(name).or_default();
        *set = set.with(category);
    }

    /// Categories attached to a container name
    pub fn tags(&self, name: &str) -> CategorySet {
        self.tags
            .get(name)
            .or_else(|| self.tags.get(&name.to_lowercase()))
            .copied()
            .unwrap_or_default()
    }

    /// Whether `name` is tagged with `category`
    pub fn has(&self, name: &str, category: Category) -> bool {
        self.tags(name).contains(category)
    }

    /// Number of distinct names known to the catalog
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
