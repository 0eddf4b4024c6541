use std::path::Path;
use std::sync::Arc;

use guildhall::config::{DefaultRankFallback, GuildsConfig};
use guildhall::guild::{
    lock_guild, ChunkRef, FileRecordStore, Guild, GuildError, GuildRegistry, PlayerId, RecordStore,
};

fn registry_in(dir: &Path, settings: GuildsConfig) -> GuildRegistry {
    let store = FileRecordStore::open(dir.join("guilds"), 100_000).unwrap();
    GuildRegistry::new(Arc::new(store), settings)
}

#[test]
fn new_guild_has_seeded_ranks_and_no_default() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    let leader = PlayerId::new_v4();
    let alpha = registry.create_guild("Alpha", leader).unwrap();

    let g = lock_guild(&alpha);
    assert_eq!(g.name(), "Alpha");
    assert_eq!(g.leader(), leader);
    assert_eq!(g.balance(), 0.0);
    assert_eq!(g.prefix(), " ");
    assert_eq!(
        g.ranks().keys().cloned().collect::<Vec<_>>(),
        vec!["member", "officer"]
    );
    assert!(g.members("member").unwrap().is_empty());
    assert!(g.members("officer").unwrap().is_empty());
    assert!(g.ranks().values().all(|r| !r.is_default));
    assert!(matches!(g.default_rank(), Err(GuildError::NoDefaultRank(_))));
}

#[test]
fn add_member_without_default_rank_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    let alpha = registry.create_guild("Alpha", PlayerId::new_v4()).unwrap();
    let mut g = lock_guild(&alpha);
    let player = PlayerId::new_v4();
    assert!(matches!(
        g.add_member(player),
        Err(GuildError::NoDefaultRank(_))
    ));
    assert!(g.rank_of(&player).is_none());
}

#[test]
fn alphabetical_fallback_picks_first_rank() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = GuildsConfig {
        default_rank_fallback: DefaultRankFallback::Alphabetical,
        ..GuildsConfig::default()
    };
    let registry = registry_in(tmp.path(), settings);
    let alpha = registry.create_guild("Alpha", PlayerId::new_v4()).unwrap();
    let mut g = lock_guild(&alpha);
    assert_eq!(g.default_rank().unwrap(), "member");
    g.set_default_rank("officer").unwrap();
    assert_eq!(g.default_rank().unwrap(), "officer");
}

#[test]
fn exists_requires_reload_after_store_level_create() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    registry.reload().unwrap();

    Guild::create(
        "Alpha",
        PlayerId::new_v4(),
        registry.store().as_ref(),
        registry.settings(),
    )
    .unwrap();
    assert!(!registry.exists("Alpha"));

    registry.reload().unwrap();
    assert!(registry.exists("Alpha"));
    assert!(registry.exists("alpha"));
    assert!(registry.exists("ALPHA"));
    assert!(!registry.exists("Beta"));
}

#[test]
fn create_guild_reloads_and_rejects_duplicates() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    registry.create_guild("Alpha", PlayerId::new_v4()).unwrap();
    assert!(registry.exists("Alpha"));
    assert!(matches!(
        registry.create_guild("ALPHA", PlayerId::new_v4()),
        Err(GuildError::AlreadyExists(_))
    ));
    assert!(matches!(
        registry.create_guild("../escape", PlayerId::new_v4()),
        Err(GuildError::InvalidName(_))
    ));
    assert_eq!(registry.len(), 1);
}

#[test]
fn membership_scenario_add_then_remove() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    let beta = registry.create_guild("Beta", PlayerId::new_v4()).unwrap();
    let u2 = PlayerId::new_v4();
    let u3 = PlayerId::new_v4();
    {
        let mut g = lock_guild(&beta);
        g.set_default_rank("member").unwrap();
        assert_eq!(g.add_member(u2).unwrap(), "member");
        assert_eq!(g.add_member(u3).unwrap(), "member");
        assert_eq!(g.members("member").unwrap(), &[u2, u3]);

        assert_eq!(g.remove_member(&u2).unwrap(), "member");
        assert_eq!(g.members("member").unwrap(), &[u3]);
        assert!(g.rank_of(&u2).is_none());
        assert_eq!(g.rank_of(&u3), Some("member"));
    }

    // The record on disk reflects the same state
    registry.reload().unwrap();
    let reloaded = registry.get("beta").unwrap();
    let g = lock_guild(&reloaded);
    assert_eq!(g.members("member").unwrap(), &[u3]);
    assert_eq!(g.default_rank().unwrap(), "member");
}

#[test]
fn duplicate_membership_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    let alpha = registry.create_guild("Alpha", PlayerId::new_v4()).unwrap();
    let mut g = lock_guild(&alpha);
    g.set_default_rank("member").unwrap();
    let player = PlayerId::new_v4();
    g.add_member(player).unwrap();
    g.set_rank(&player, "officer").unwrap();

    match g.add_member(player) {
        Err(GuildError::AlreadyMember { rank, .. }) => assert_eq!(rank, "officer"),
        other => panic!("expected AlreadyMember, got {other:?}"),
    }
    assert!(g.members("member").unwrap().is_empty());
    assert_eq!(g.members("officer").unwrap(), &[player]);
}

#[test]
fn remove_non_member_fails_explicitly() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    let alpha = registry.create_guild("Alpha", PlayerId::new_v4()).unwrap();
    let mut g = lock_guild(&alpha);
    let err = g.remove_member(&PlayerId::new_v4()).unwrap_err();
    assert!(matches!(err, GuildError::NotAMember(_)));
    assert!(err.is_not_found());
}

#[test]
fn unknown_rank_lookups_fail() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    let alpha = registry.create_guild("Alpha", PlayerId::new_v4()).unwrap();
    let mut g = lock_guild(&alpha);
    assert!(matches!(g.members("king"), Err(GuildError::RankNotFound(_))));
    assert!(matches!(
        g.set_default_rank("king"),
        Err(GuildError::RankNotFound(_))
    ));
    assert!(matches!(
        g.add_permission("king", "build"),
        Err(GuildError::RankNotFound(_))
    ));
}

#[test]
fn set_default_rank_clears_previous_flag() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    let alpha = registry.create_guild("Alpha", PlayerId::new_v4()).unwrap();
    let mut g = lock_guild(&alpha);
    g.set_default_rank("member").unwrap();
    g.set_default_rank("officer").unwrap();
    let flagged: Vec<_> = g
        .ranks()
        .iter()
        .filter(|(_, r)| r.is_default)
        .map(|(n, _)| n.as_str())
        .collect();
    assert_eq!(flagged, vec!["officer"]);
}

#[test]
fn permissions_follow_rank() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    let alpha = registry.create_guild("Alpha", PlayerId::new_v4()).unwrap();
    let mut g = lock_guild(&alpha);
    g.set_default_rank("member").unwrap();
    let player = PlayerId::new_v4();
    g.add_member(player).unwrap();

    assert!(g.add_permission("officer", "claim").unwrap());
    assert!(!g.add_permission("officer", "claim").unwrap());
    assert!(!g.has_permission(&player, "claim"));

    g.set_rank(&player, "officer").unwrap();
    assert!(g.has_permission(&player, "claim"));

    assert!(g.remove_permission("officer", "claim").unwrap());
    assert!(!g.remove_permission("officer", "claim").unwrap());
    assert!(!g.has_permission(&player, "claim"));
}

#[test]
fn deposit_then_withdraw_restores_balance() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    let alpha = registry.create_guild("Alpha", PlayerId::new_v4()).unwrap();
    let mut g = lock_guild(&alpha);
    for amount in [0.0, 1.0, 0.1, 123.456, 1e-9, 7.5e12, f64::MAX] {
        let before = g.balance();
        g.deposit(amount).unwrap();
        g.withdraw(amount).unwrap();
        assert_eq!(g.balance(), before, "amount {amount}");
    }
}

#[test]
fn withdraw_may_go_negative_and_non_finite_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    let alpha = registry.create_guild("Alpha", PlayerId::new_v4()).unwrap();
    let mut g = lock_guild(&alpha);
    assert_eq!(g.withdraw(40.0).unwrap(), -40.0);
    assert!(matches!(
        g.deposit(f64::NAN),
        Err(GuildError::InvalidAmount(_))
    ));
    assert!(matches!(
        g.withdraw(f64::INFINITY),
        Err(GuildError::InvalidAmount(_))
    ));
    assert_eq!(g.balance(), -40.0);
}

#[test]
fn claims_are_deduplicated() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    let alpha = registry.create_guild("Alpha", PlayerId::new_v4()).unwrap();
    {
        let mut g = lock_guild(&alpha);
        let home = ChunkRef::new("world", 3, -7);
        assert!(g.claim_chunk(home.clone()).unwrap());
        assert_eq!(g.claims().len(), 1);
        assert!(!g.claim_chunk(home.clone()).unwrap());
        assert_eq!(g.claims().len(), 1);
        assert!(g.claim_chunk(ChunkRef::new("world", 4, -7)).unwrap());
        assert_eq!(g.claims().len(), 2);

        assert!(g.unclaim_chunk(&home).unwrap());
        assert!(!g.unclaim_chunk(&home).unwrap());
        assert_eq!(g.claims(), &[ChunkRef::new("world", 4, -7)]);
    }
    let owner = registry
        .claim_owner(&ChunkRef::new("world", 4, -7))
        .unwrap();
    assert_eq!(lock_guild(&owner).name(), "Alpha");
    assert!(registry.claim_owner(&ChunkRef::new("nether", 4, -7)).is_none());
}

#[test]
fn prefix_is_translated_and_raw_value_persisted() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    let alpha = registry.create_guild("Alpha", PlayerId::new_v4()).unwrap();
    {
        let mut g = lock_guild(&alpha);
        g.set_prefix("&6[Alpha]").unwrap();
        assert_eq!(g.prefix(), "§6[Alpha] ");
        assert_eq!(g.raw_prefix(), "&6[Alpha]");
    }
    let record = registry.store().load("Alpha").unwrap().unwrap();
    assert_eq!(record.prefix, "&6[Alpha]");
}

#[test]
fn rename_moves_record() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    registry.create_guild("Alpha", PlayerId::new_v4()).unwrap();
    registry.create_guild("Beta", PlayerId::new_v4()).unwrap();

    assert!(matches!(
        registry.rename_guild("Alpha", "beta"),
        Err(GuildError::AlreadyExists(_))
    ));

    registry.rename_guild("alpha", "Alphabet").unwrap();
    assert!(!registry.store().contains("Alpha"));
    assert!(registry.store().contains("Alphabet"));
    assert!(registry.exists("Alphabet"));
    assert!(!registry.exists("Alpha"));

    // Case-only rename of the same guild is allowed
    registry.rename_guild("Alphabet", "ALPHABET").unwrap();
    assert!(registry.exists("ALPHABET"));
    assert_eq!(registry.names().len(), 2);
}

#[test]
fn rename_builds_path_from_root_not_substring() {
    let tmp = tempfile::tempdir().unwrap();
    // The guild name also appears in the storage path
    let root = tmp.path().join("al");
    let registry = registry_in(&root, GuildsConfig::default());
    registry.create_guild("al", PlayerId::new_v4()).unwrap();
    registry.rename_guild("al", "be").unwrap();

    assert!(root.join("guilds").join("be.json").is_file());
    assert!(!root.join("guilds").join("al.json").exists());
    assert!(!tmp.path().join("be").exists());
}

#[test]
fn disband_removes_record_and_guild() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    registry.create_guild("Alpha", PlayerId::new_v4()).unwrap();
    registry.disband("ALPHA").unwrap();
    assert!(!registry.exists("Alpha"));
    assert!(!registry.store().contains("Alpha"));
    assert!(matches!(
        registry.disband("Alpha"),
        Err(GuildError::GuildNotFound(_))
    ));
}

#[test]
fn guild_of_finds_member() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    let alpha = registry.create_guild("Alpha", PlayerId::new_v4()).unwrap();
    registry.create_guild("Beta", PlayerId::new_v4()).unwrap();
    let player = PlayerId::new_v4();
    {
        let mut g = lock_guild(&alpha);
        g.set_default_rank("member").unwrap();
        g.add_member(player).unwrap();
    }
    let found = registry.guild_of(&player).unwrap();
    assert_eq!(lock_guild(&found).name(), "Alpha");
    assert!(registry.guild_of(&PlayerId::new_v4()).is_none());
}

#[test]
fn set_leader_persists() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    let alpha = registry.create_guild("Alpha", PlayerId::new_v4()).unwrap();
    let successor = PlayerId::new_v4();
    lock_guild(&alpha).set_leader(successor).unwrap();
    let record = registry.store().load("Alpha").unwrap().unwrap();
    assert_eq!(record.leader, successor.to_string());
}

#[test]
fn uniqueness_folds_non_ascii_case() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = registry_in(tmp.path(), GuildsConfig::default());
    registry.create_guild("Drachen Öl", PlayerId::new_v4()).unwrap();
    assert!(registry.exists("drachen öl"));
    assert!(registry.exists("DRACHEN ÖL"));
    assert!(matches!(
        registry.create_guild("drachen öl", PlayerId::new_v4()),
        Err(GuildError::AlreadyExists(_))
    ));

    registry.create_guild("Öl", PlayerId::new_v4()).unwrap();
    assert!(matches!(
        registry.create_guild("öl", PlayerId::new_v4()),
        Err(GuildError::AlreadyExists(_))
    ));
    assert!(matches!(
        registry.rename_guild("Drachen Öl", "öL"),
        Err(GuildError::AlreadyExists(_))
    ));
    registry.disband("öl").unwrap();
    assert_eq!(registry.names(), vec!["Drachen Öl"]);
}
