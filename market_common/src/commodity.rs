//! Commodity catalog shared between server and client.
//!
//! Every known commodity maps to a static [`CommoditySpec`] carrying its display
//! name, local and exchange units, the baseline price used by the sample price
//! generator and the symbol external providers know it by. Identifiers that are
//! not in the catalog still resolve, with a best-effort entry (see [`resolve`]).
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Unit used for identifiers that are not in the catalog.
pub const FALLBACK_UNIT: &str = "per unit";

/// Currency of the baseline prices.
pub const BASELINE_CURRENCY: &str = "KES";

/// Broad commodity groups, used to filter trend reports.
#[allow(missing_docs)]
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, EnumIter, Hash, Eq, PartialEq,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Category {
    Grains,
    Legumes,
    Oilseeds,
    Beverages,
    Softs,
    Dairy,
    Produce,
    Livestock,
    Other,
}

/// Static description of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommoditySpec {
    /// Human-readable name, also the commodity part of the storage key.
    pub display_name: &'static str,
    /// Quantity basis of local (sample exchange) prices.
    pub unit: &'static str,
    /// Quantity basis used by international exchanges.
    pub exchange_unit: &'static str,
    /// Reference price in [`BASELINE_CURRENCY`] per `unit`.
    pub baseline_price: f64,
    /// Commodity group.
    pub category: Category,
    /// Symbol used by external price providers.
    pub provider_symbol: &'static str,
}

/// Set of commodities with a catalog entry.
///
/// Parsing is case-insensitive and accepts the display name, the snake-case
/// identifier and the common aliases (`corn` for maize, etc.).
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Display, EnumString, EnumIter, Hash, Eq, PartialEq)]
#[strum(ascii_case_insensitive)]
pub enum Commodity {
    #[strum(to_string = "Maize", serialize = "corn")]
    Maize,
    Wheat,
    Rice,
    #[strum(to_string = "Beans", serialize = "bean")]
    Beans,
    Coffee,
    Tea,
    Sugar,
    Milk,
    #[strum(to_string = "Tomatoes", serialize = "tomato")]
    Tomatoes,
    #[strum(to_string = "Onions", serialize = "onion")]
    Onions,
    #[strum(to_string = "Soybeans", serialize = "soybean", serialize = "soya")]
    Soybeans,
    Sorghum,
    Barley,
    Oats,
    Cotton,
    Cocoa,
    #[strum(to_string = "Live Cattle", serialize = "live_cattle", serialize = "live-cattle")]
    LiveCattle,
    #[strum(to_string = "Feeder Cattle", serialize = "feeder_cattle", serialize = "feeder-cattle")]
    FeederCattle,
    #[strum(to_string = "Lean Hogs", serialize = "lean_hogs", serialize = "lean-hogs")]
    LeanHogs,
    Poultry,
    Butter,
    Cheese,
    #[strum(to_string = "Palm Oil", serialize = "palm_oil", serialize = "palm-oil")]
    PalmOil,
    #[strum(to_string = "Sunflower Oil", serialize = "sunflower_oil", serialize = "sunflower-oil")]
    SunflowerOil,
}

impl Commodity {
    /// Commodities of the sample exchange table, used when no filter is given.
    pub const DEMO_DEFAULTS: [Commodity; 10] = [
        Commodity::Maize,
        Commodity::Wheat,
        Commodity::Rice,
        Commodity::Beans,
        Commodity::Coffee,
        Commodity::Tea,
        Commodity::Sugar,
        Commodity::Milk,
        Commodity::Tomatoes,
        Commodity::Onions,
    ];

    /// Catalog entry for this commodity.
    pub fn spec(&self) -> CommoditySpec {
        use Category::*;
        let (display_name, unit, exchange_unit, baseline_price, category, provider_symbol) =
            match self {
                Commodity::Maize => ("Maize", "per 90kg bag", "per bushel", 3500.0, Grains, "CORN"),
                Commodity::Wheat => ("Wheat", "per 90kg bag", "per bushel", 4200.0, Grains, "WHEAT"),
                Commodity::Rice => ("Rice", "per 90kg bag", "per hundredweight", 6800.0, Grains, "RICE"),
                Commodity::Beans => ("Beans", "per 90kg bag", "per hundredweight", 8500.0, Legumes, "BEANS"),
                Commodity::Coffee => ("Coffee", "per kg", "per pound", 450.0, Beverages, "COFFEE"),
                Commodity::Tea => ("Tea", "per kg", "per kg", 280.0, Beverages, "TEA"),
                Commodity::Sugar => ("Sugar", "per kg", "per pound", 120.0, Softs, "SUGAR"),
                Commodity::Milk => ("Milk", "per liter", "per hundredweight", 55.0, Dairy, "MILK"),
                Commodity::Tomatoes => ("Tomatoes", "per kg", "per kg", 80.0, Produce, "TOMATOES"),
                Commodity::Onions => ("Onions", "per kg", "per kg", 60.0, Produce, "ONIONS"),
                Commodity::Soybeans => ("Soybeans", "per 90kg bag", "per bushel", 7200.0, Oilseeds, "SOYBEANS"),
                Commodity::Sorghum => ("Sorghum", "per 90kg bag", "per bushel", 3800.0, Grains, "SORGHUM"),
                Commodity::Barley => ("Barley", "per 90kg bag", "per bushel", 3900.0, Grains, "BARLEY"),
                Commodity::Oats => ("Oats", "per 90kg bag", "per bushel", 4000.0, Grains, "OATS"),
                Commodity::Cotton => ("Cotton", "per kg", "per pound", 65.0, Softs, "COTTON"),
                Commodity::Cocoa => ("Cocoa", "per kg", "per metric ton", 600.0, Softs, "COCOA"),
                Commodity::LiveCattle => ("Live Cattle", "per kg live weight", "per pound", 350.0, Livestock, "LIVE_CATTLE"),
                Commodity::FeederCattle => ("Feeder Cattle", "per kg live weight", "per pound", 330.0, Livestock, "FEEDER_CATTLE"),
                Commodity::LeanHogs => ("Lean Hogs", "per kg", "per pound", 300.0, Livestock, "LEAN_HOGS"),
                Commodity::Poultry => ("Poultry", "per kg", "per pound", 450.0, Livestock, "POULTRY"),
                Commodity::Butter => ("Butter", "per kg", "per pound", 900.0, Dairy, "BUTTER"),
                Commodity::Cheese => ("Cheese", "per kg", "per pound", 1200.0, Dairy, "CHEESE"),
                Commodity::PalmOil => ("Palm Oil", "per liter", "per metric ton", 250.0, Oilseeds, "PALM_OIL"),
                Commodity::SunflowerOil => ("Sunflower Oil", "per liter", "per metric ton", 320.0, Oilseeds, "SUNFLOWER_OIL"),
            };
        CommoditySpec {
            display_name,
            unit,
            exchange_unit,
            baseline_price,
            category,
            provider_symbol,
        }
    }
}

/// Catalog lookup result for an arbitrary identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Matching catalog commodity, `None` for unknown identifiers.
    pub commodity: Option<Commodity>,
    /// Display name (raw identifier when unknown).
    pub display_name: String,
    /// Local unit (`per unit` when unknown).
    pub unit: String,
    /// Exchange unit (`per unit` when unknown).
    pub exchange_unit: String,
    /// Baseline price, `None` when unknown.
    pub baseline_price: Option<f64>,
    /// Commodity group (`Other` when unknown).
    pub category: Category,
    /// Provider symbol (upper-cased identifier when unknown).
    pub provider_symbol: String,
}

/// Resolve an identifier against the catalog.
///
/// Unknown identifiers pass through: the trimmed raw value becomes the display
/// name, the units fall back to [`FALLBACK_UNIT`] and the provider symbol is the
/// upper-cased identifier with spaces replaced by underscores.
pub fn resolve(raw: &str) -> CatalogEntry {
    let trimmed = raw.trim();
    match trimmed.parse::<Commodity>() {
        Ok(commodity) => {
            let spec = commodity.spec();
            CatalogEntry {
                commodity: Some(commodity),
                display_name: spec.display_name.to_string(),
                unit: spec.unit.to_string(),
                exchange_unit: spec.exchange_unit.to_string(),
                baseline_price: Some(spec.baseline_price),
                category: spec.category,
                provider_symbol: spec.provider_symbol.to_string(),
            }
        }
        Err(_) => CatalogEntry {
            commodity: None,
            display_name: trimmed.to_string(),
            unit: FALLBACK_UNIT.to_string(),
            exchange_unit: FALLBACK_UNIT.to_string(),
            baseline_price: None,
            category: Category::Other,
            provider_symbol: trimmed.to_uppercase().replace(' ', "_"),
        },
    }
}

/// Split a comma-separated commodity filter into trimmed, non-empty identifiers.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
