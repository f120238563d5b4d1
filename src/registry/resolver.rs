use tracing::debug;

use crate::database::models::Coin;
use crate::error::IngestError;
use crate::registry::{CoinListRecord, SnapshotStore};

/// Merges provider token-list records into the snapshot under a stable
/// identity. The fungible-asset address is the canonical coin_id when
/// present, the legacy coin type otherwise, and once an identity exists
/// it is reused no matter which alias a later record arrives under.
pub struct IdentityResolver;

impl IdentityResolver {
    /// Fold one record into the store, returning the coin_id it landed on.
    pub fn resolve(
        store: &mut SnapshotStore,
        record: &CoinListRecord,
    ) -> Result<String, IngestError> {
        if !record.has_address() {
            return Err(IngestError::IdentityUnresolved {
                provider: record.source,
            });
        }

        let existing = record
            .fungible_address
            .as_deref()
            .and_then(|a| store.resolve_alias(a))
            .or_else(|| {
                record
                    .legacy_address
                    .as_deref()
                    .and_then(|a| store.resolve_alias(a))
            })
            .cloned();

        let coin_id = match existing {
            Some(id) => id,
            None => {
                let id = record
                    .fungible_address
                    .clone()
                    .or_else(|| record.legacy_address.clone())
                    .unwrap_or_default();
                debug!(source = record.source, coin_id = %id, "new coin identity");
                store.insert_coin(Coin {
                    coin_id: id.clone(),
                    ..Coin::default()
                });
                id
            }
        };

        Self::merge(store, &coin_id, record);
        Ok(coin_id)
    }

    /// Merge-by-presence: an incoming Some overwrites, an incoming None
    /// never clears what another source already filled in.
    fn merge(store: &mut SnapshotStore, coin_id: &str, record: &CoinListRecord) {
        let updated = match store.get_coin_mut(coin_id) {
            Some(coin) => {
                fill(&mut coin.coin_type_legacy, &record.legacy_address);
                fill(&mut coin.coin_address_fungible, &record.fungible_address);
                fill(&mut coin.coin_name, &record.name);
                fill(&mut coin.coin_symbol, &record.symbol);
                fill(&mut coin.coin_display_symbol, &record.display_symbol);
                fill(&mut coin.coin_decimals, &record.decimals);
                fill(&mut coin.coin_description, &record.description);
                fill(&mut coin.coin_logo_url, &record.logo_url);
                fill(&mut coin.coingecko_id, &record.coingecko_id);
                fill(&mut coin.coinmarketcap_id, &record.coinmarketcap_id);
                fill(&mut coin.graduated, &record.graduated);
                fill(
                    &mut coin.bonding_curve_progress,
                    &record.bonding_curve_progress,
                );
                coin.clone()
            }
            None => return,
        };
        // Re-insert so any newly learned address lands in the alias map.
        store.insert_coin(updated);

        if record.website.is_some() || record.twitter.is_some() || record.telegram.is_some() {
            let links = store.links_mut(coin_id);
            fill(&mut links.website, &record.website);
            fill(&mut links.twitter, &record.twitter);
            fill(&mut links.telegram, &record.telegram);
        }

        if record.is_banned.is_some() || record.is_permissioned.is_some() {
            let score = store.score_mut(coin_id);
            fill(&mut score.is_banned_panora, &record.is_banned);
            fill(&mut score.is_permissioned_hippo, &record.is_permissioned);
        }
    }
}

fn fill<T: Clone>(target: &mut Option<T>, incoming: &Option<T>) {
    if let Some(value) = incoming {
        *target = Some(value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &'static str) -> CoinListRecord {
        CoinListRecord {
            source,
            ..CoinListRecord::default()
        }
    }

    #[test]
    fn fungible_address_wins_as_identity() {
        let mut store = SnapshotStore::new();
        let mut rec = record("panora");
        rec.legacy_address = Some("0x1::doge::Doge".into());
        rec.fungible_address = Some("0xfa1".into());

        let id = IdentityResolver::resolve(&mut store, &rec).unwrap();
        assert_eq!(id, "0xfa1");
    }

    #[test]
    fn identity_survives_alias_only_records() {
        let mut store = SnapshotStore::new();

        let mut first = record("panora");
        first.legacy_address = Some("0x1::doge::Doge".into());
        first.fungible_address = Some("0xfa1".into());
        first.name = Some("Doge".into());
        let id = IdentityResolver::resolve(&mut store, &first).unwrap();

        // Same asset seen later under only its legacy coin type must not
        // mint a second identity, even though it has no fungible address.
        let mut second = record("hippo");
        second.legacy_address = Some("0x1::doge::Doge".into());
        second.decimals = Some(8);
        let id2 = IdentityResolver::resolve(&mut store, &second).unwrap();

        assert_eq!(id, id2);
        assert_eq!(store.coin_count(), 1);
        let coin = store.get_coin(&id).unwrap();
        assert_eq!(coin.coin_name.as_deref(), Some("Doge"));
        assert_eq!(coin.coin_decimals, Some(8));
    }

    #[test]
    fn alias_learned_late_still_resolves() {
        let mut store = SnapshotStore::new();

        let mut first = record("hippo");
        first.legacy_address = Some("0x1::doge::Doge".into());
        let id = IdentityResolver::resolve(&mut store, &first).unwrap();
        assert_eq!(id, "0x1::doge::Doge");

        // A later record teaches the store the fungible alias; lookups under
        // that alias land on the original (legacy) identity.
        let mut second = record("panora");
        second.legacy_address = Some("0x1::doge::Doge".into());
        second.fungible_address = Some("0xfa1".into());
        let id2 = IdentityResolver::resolve(&mut store, &second).unwrap();
        assert_eq!(id2, id);

        let mut third = record("pump");
        third.fungible_address = Some("0xfa1".into());
        let id3 = IdentityResolver::resolve(&mut store, &third).unwrap();
        assert_eq!(id3, id);
        assert_eq!(store.coin_count(), 1);
    }

    #[test]
    fn none_never_clears_a_filled_field() {
        let mut store = SnapshotStore::new();

        let mut first = record("panora");
        first.fungible_address = Some("0xfa1".into());
        first.logo_url = Some("https://img/a.png".into());
        IdentityResolver::resolve(&mut store, &first).unwrap();

        let mut second = record("hippo");
        second.fungible_address = Some("0xfa1".into());
        second.logo_url = None;
        second.symbol = Some("DOGE".into());
        IdentityResolver::resolve(&mut store, &second).unwrap();

        let coin = store.get_coin("0xfa1").unwrap();
        assert_eq!(coin.coin_logo_url.as_deref(), Some("https://img/a.png"));
        assert_eq!(coin.coin_symbol.as_deref(), Some("DOGE"));
    }

    #[test]
    fn addressless_record_is_rejected() {
        let mut store = SnapshotStore::new();
        let rec = record("panora");
        let err = IdentityResolver::resolve(&mut store, &rec).unwrap_err();
        assert!(matches!(
            err,
            IngestError::IdentityUnresolved { provider: "panora" }
        ));
    }

    #[test]
    fn links_and_scores_merge_by_presence() {
        let mut store = SnapshotStore::new();

        let mut first = record("panora");
        first.fungible_address = Some("0xfa1".into());
        first.website = Some("https://doge.dog".into());
        first.is_banned = Some(false);
        IdentityResolver::resolve(&mut store, &first).unwrap();

        let mut second = record("hippo");
        second.fungible_address = Some("0xfa1".into());
        second.twitter = Some("https://x.com/doge".into());
        second.is_permissioned = Some(true);
        IdentityResolver::resolve(&mut store, &second).unwrap();

        let links = store.get_links("0xfa1").unwrap();
        assert_eq!(links.website.as_deref(), Some("https://doge.dog"));
        assert_eq!(links.twitter.as_deref(), Some("https://x.com/doge"));

        let score = store.get_score("0xfa1").unwrap();
        assert_eq!(score.is_banned_panora, Some(false));
        assert_eq!(score.is_permissioned_hippo, Some(true));
    }
}
