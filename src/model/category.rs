//! The closed vocabulary of receipt categories.

use anyhow::{bail, ensure};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A receipt category. The set is closed: the extractor must answer with one of these, and the
/// table renderer prints their labels.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Category {
    FoodAndRestaurants,
    Groceries,
    Transportation,
    Travel,
    Shopping,
    ClothingAndShoes,
    Electronics,
    Entertainment,
    HealthAndMedical,
    HomeAndGarden,
    Utilities,
    OfficeSupplies,
    PersonalCare,
    Education,
    GiftsAndDonations,
    Other,
}

/// Every category, in display order.
pub const ALL_CATEGORIES: [Category; 16] = [
    Category::FoodAndRestaurants,
    Category::Groceries,
    Category::Transportation,
    Category::Travel,
    Category::Shopping,
    Category::ClothingAndShoes,
    Category::Electronics,
    Category::Entertainment,
    Category::HealthAndMedical,
    Category::HomeAndGarden,
    Category::Utilities,
    Category::OfficeSupplies,
    Category::PersonalCare,
    Category::Education,
    Category::GiftsAndDonations,
    Category::Other,
];

// Labels used by earlier versions of the extraction schema.
const LEGACY_LABELS: &[(&str, Category)] = &[
    ("food/restaurants", Category::FoodAndRestaurants),
    ("clothing/shoes", Category::ClothingAndShoes),
    ("health/medical", Category::HealthAndMedical),
    ("home/garden", Category::HomeAndGarden),
    ("gifts/donations", Category::GiftsAndDonations),
];

impl Category {
    /// The canonical label, e.g. `Food & Restaurants`.
    pub fn label(&self) -> &'static str {
        match self {
            Category::FoodAndRestaurants => "Food & Restaurants",
            Category::Groceries => "Groceries",
            Category::Transportation => "Transportation",
            Category::Travel => "Travel",
            Category::Shopping => "Shopping",
            Category::ClothingAndShoes => "Clothing & Shoes",
            Category::Electronics => "Electronics",
            Category::Entertainment => "Entertainment",
            Category::HealthAndMedical => "Health & Medical",
            Category::HomeAndGarden => "Home & Garden",
            Category::Utilities => "Utilities",
            Category::OfficeSupplies => "Office Supplies",
            Category::PersonalCare => "Personal Care",
            Category::Education => "Education",
            Category::GiftsAndDonations => "Gifts & Donations",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    /// Accepts the canonical label in any case, `and` in place of `&`, and legacy labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = fold(s);
        if let Some(found) = ALL_CATEGORIES
            .iter()
            .find(|c| fold(c.label()) == wanted)
        {
            return Ok(*found);
        }
        if let Some((_, found)) = LEGACY_LABELS.iter().find(|(l, _)| fold(l) == wanted) {
            return Ok(*found);
        }
        bail!("Unknown category '{}'", s.trim())
    }
}

/// Lowercases, spells out `&` and collapses whitespace.
fn fold(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .replace('&', " and ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl Serialize for Category {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Category::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A non-empty, duplicate-free list of categories, in the order the extractor gave them.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(transparent)]
pub struct Categories(Vec<Category>);

impl Categories {
    /// Builds the set, dropping repeats. Fails when `categories` is empty.
    pub fn new(categories: impl IntoIterator<Item = Category>) -> crate::Result<Self> {
        let mut list: Vec<Category> = Vec::new();
        for category in categories {
            if !list.contains(&category) {
                list.push(category);
            }
        }
        ensure!(!list.is_empty(), "A receipt needs at least one category");
        Ok(Self(list))
    }

    /// Parses each label with `Category::from_str`.
    pub fn parse<S: AsRef<str>>(labels: &[S]) -> crate::Result<Self> {
        let parsed = labels
            .iter()
            .map(|l| Category::from_str(l.as_ref()))
            .collect::<crate::Result<Vec<_>>>()?;
        Self::new(parsed)
    }

    pub fn single(category: Category) -> Self {
        Self(vec![category])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.0.iter()
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0.contains(&category)
    }

    /// The single display cell for the table, e.g. `Electronics, Entertainment`.
    pub fn display_cell(&self) -> String {
        self.0
            .iter()
            .map(Category::label)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<'de> Deserialize<'de> for Categories {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let list = Vec::<Category>::deserialize(deserializer)?;
        Categories::new(list).map_err(serde::de::Error::custom)
    }
}
