//! Selector for the interchangeable price sources.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Named source of price quotes.
///
/// Wire/CLI names are kebab-case (`commodities-api`); parsing ignores case.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
    EnumIter,
    Hash,
    Eq,
    PartialEq,
)]
#[serde(rename_all = "kebab-case")]
#[clap(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Provider {
    /// Synthetic quotes around the catalog baseline prices.
    Demo,
    /// commodities-api.com latest rates.
    CommoditiesApi,
    /// api-ninjas.com commodity price endpoint.
    ApiNinjas,
    /// data.gov.in Agmarknet mandi prices.
    Agmarknet,
}

impl Provider {
    /// Environment variable holding the API key, `None` for providers without one.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Provider::Demo => None,
            Provider::CommoditiesApi => Some("COMMODITIES_API_KEY"),
            Provider::ApiNinjas => Some("API_NINJAS_KEY"),
            Provider::Agmarknet => Some("DATA_GOV_IN_KEY"),
        }
    }

    /// Whether quotes come from a network call.
    pub fn is_remote(&self) -> bool {
        !matches!(self, Provider::Demo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_kebab_case_names() {
        assert_eq!(Provider::CommoditiesApi.to_string(), "commodities-api");
        assert_eq!("API-NINJAS".parse::<Provider>().unwrap(), Provider::ApiNinjas);
        assert_eq!("demo".parse::<Provider>().unwrap(), Provider::Demo);
        assert!("bloomberg".parse::<Provider>().is_err());
    }

    #[test]
    fn serde_uses_the_same_names() {
        let json = serde_json::to_string(&Provider::Agmarknet).unwrap();
        assert_eq!(json, "\"agmarknet\"");
    }

    #[test]
    fn only_remote_providers_need_keys() {
        assert_eq!(Provider::Demo.api_key_env(), None);
        assert!(!Provider::Demo.is_remote());
        assert_eq!(Provider::ApiNinjas.api_key_env(), Some("API_NINJAS_KEY"));
    }
}
