pub mod resolver;
pub mod snapshot;

pub use resolver::IdentityResolver;
pub use snapshot::SnapshotStore;

use rust_decimal::Decimal;

/// Normalized token-list record as emitted by a provider adapter. Every
/// field except the addresses is optional; which of the two addresses is
/// present depends on the provider's addressing scheme.
#[derive(Debug, Clone, Default)]
pub struct CoinListRecord {
    pub source: &'static str,
    /// `0xaddr::module::Struct` coin type.
    pub legacy_address: Option<String>,
    /// Fungible-asset object address.
    pub fungible_address: Option<String>,

    pub name: Option<String>,
    pub symbol: Option<String>,
    pub display_symbol: Option<String>,
    pub decimals: Option<i32>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub coingecko_id: Option<String>,
    pub coinmarketcap_id: Option<String>,

    pub website: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,

    pub is_banned: Option<bool>,
    pub is_permissioned: Option<bool>,

    pub graduated: Option<bool>,
    pub bonding_curve_progress: Option<Decimal>,
}

impl CoinListRecord {
    /// True when the record can be tied to an on-chain identity at all.
    pub fn has_address(&self) -> bool {
        self.legacy_address.is_some() || self.fungible_address.is_some()
    }
}

/// Split a raw provider address into (legacy, fungible) according to the
/// chain's two addressing schemes: coin types contain `::`, fungible-asset
/// object addresses do not.
pub fn classify_address(raw: &str) -> (Option<String>, Option<String>) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        (None, None)
    } else if trimmed.contains("::") {
        (Some(trimmed.to_string()), None)
    } else {
        (None, Some(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_address_splits_schemes() {
        assert_eq!(
            classify_address("0x1::aptos_coin::AptosCoin"),
            (Some("0x1::aptos_coin::AptosCoin".to_string()), None)
        );
        assert_eq!(
            classify_address("0xa0b1"),
            (None, Some("0xa0b1".to_string()))
        );
        assert_eq!(classify_address("  "), (None, None));
    }
}
