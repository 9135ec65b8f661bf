#![allow(non_snake_case)]
use arena_client::{
    character::{AbsentReason, CharacterRecord, CharacterStatus},
    test_helpers::TestContext,
    wallet::ChainId,
};

#[tokio::test]
async fn probe__reports_missing_provider_as_distinct_state() {
    let mut ctx = TestContext::no_provider();

    // when
    ctx.session.probe().await;
    ctx.settle().await;

    // then
    let snapshot = ctx.session.snapshot();
    assert!(!snapshot.connection.provider_present);
    assert_eq!(snapshot.status, "No wallet provider detected");
    assert!(snapshot.errors.is_empty());
    let counters = ctx.chain.counters();
    assert_eq!(counters.character_fetches, 0);
    assert_eq!(counters.boss_fetches, 0);
}

#[tokio::test]
async fn probe__wrong_network_blocks_every_fetch() {
    let mut ctx = TestContext::wrong_network();

    // when
    ctx.session.probe().await;
    ctx.settle().await;

    // then
    let snapshot = ctx.session.snapshot();
    assert!(snapshot.connection.provider_present);
    assert!(!snapshot.connection.network_ok);
    assert_eq!(snapshot.connection.chain_id, Some(ChainId::new(1)));
    assert_eq!(snapshot.status, "Wrong network: wallet reports 0x1, required 0x4");
    assert!(snapshot.character.is_none());
    assert!(snapshot.boss.is_none());
    let counters = ctx.chain.counters();
    assert_eq!(counters.character_fetches, 0);
    assert_eq!(counters.boss_fetches, 0);
    assert_eq!(counters.subscribes, 0);
}

#[tokio::test]
async fn probe__without_authorized_account_requests_nothing() {
    let mut ctx = TestContext::fresh_wallet();

    // when
    ctx.session.probe().await;
    ctx.settle().await;

    // then
    let snapshot = ctx.session.snapshot();
    assert!(snapshot.connection.provider_present);
    assert!(snapshot.connection.network_ok);
    assert_eq!(snapshot.connection.account, None);
    assert_eq!(snapshot.status, "Wallet not connected");
    let counters = ctx.chain.counters();
    assert_eq!(counters.character_fetches, 0);
    assert_eq!(counters.boss_fetches, 0);
    assert_eq!(counters.subscribes, 0);
}

#[tokio::test]
async fn connect__grants_access_and_binds() {
    let mut ctx = TestContext::fresh_wallet();

    // when
    ctx.session.connect().await;
    ctx.settle().await;

    // then
    let snapshot = ctx.session.snapshot();
    assert_eq!(snapshot.connection.account, Some(ctx.alice));
    assert_eq!(snapshot.boss.as_ref().unwrap().name, "Darth Vader");
    assert_eq!(
        snapshot.character,
        Some(CharacterStatus::Absent(AbsentReason::NeverMinted)),
    );
    assert_eq!(snapshot.status, "No character minted; selection required");
    let counters = ctx.chain.counters();
    assert_eq!(counters.character_fetches, 1);
    assert_eq!(counters.boss_fetches, 1);
    assert_eq!(counters.subscribes, 1);
}

#[tokio::test]
async fn connect__user_rejection_leaves_state_unchanged() {
    let mut ctx = TestContext::fresh_wallet();
    ctx.chain.script_access_rejection();

    // when
    ctx.session.connect().await;
    ctx.settle().await;

    // then
    let snapshot = ctx.session.snapshot();
    assert_eq!(snapshot.connection.account, None);
    assert_eq!(snapshot.status, "Connection request rejected");
    assert!(snapshot.errors.is_empty());
    let counters = ctx.chain.counters();
    assert_eq!(counters.character_fetches, 0);
    assert_eq!(counters.boss_fetches, 0);

    // a later attempt proceeds normally
    ctx.session.connect().await;
    ctx.settle().await;
    let snapshot = ctx.session.snapshot();
    assert_eq!(snapshot.connection.account, Some(ctx.alice));
    assert!(snapshot.boss.is_some());
}

#[tokio::test]
async fn probe__same_connection_does_not_rebind() {
    let mut ctx = TestContext::new();
    ctx.session.probe().await;
    ctx.settle().await;

    // when
    ctx.session.probe().await;
    ctx.settle().await;

    // then
    let counters = ctx.chain.counters();
    assert_eq!(counters.character_fetches, 1);
    assert_eq!(counters.boss_fetches, 1);
    assert_eq!(counters.subscribes, 1);
    assert_eq!(ctx.chain.subscriber_count(), 1);
}

#[tokio::test]
async fn resolve__missing_record_reported_absent() {
    let mut ctx = TestContext::bare();

    // when
    ctx.session.probe().await;
    ctx.settle().await;

    // then
    let snapshot = ctx.session.snapshot();
    assert_eq!(
        snapshot.character,
        Some(CharacterStatus::Absent(AbsentReason::NeverMinted)),
    );
    assert_eq!(snapshot.status, "No character minted; selection required");
}

#[tokio::test]
async fn resolve__dead_character_reported_absent() {
    let mut ctx = TestContext::bare();
    let fallen = {
        let mut roster_entry = ctx.chain.roster().remove(0);
        roster_entry.hp = 0;
        roster_entry
    };
    ctx.chain.seed_character(ctx.alice, fallen);

    // when
    ctx.session.probe().await;
    ctx.settle().await;

    // then
    let snapshot = ctx.session.snapshot();
    assert_eq!(
        snapshot.character,
        Some(CharacterStatus::Absent(AbsentReason::Fallen)),
    );
    assert_eq!(snapshot.status, "Character has fallen; mint a new one");
}

#[tokio::test]
async fn adopt_character__injects_minted_record() {
    let mut ctx = TestContext::bare();
    ctx.session.probe().await;
    ctx.settle().await;

    // when
    let minted = ctx.chain.mint(ctx.alice, 0).unwrap();
    ctx.session.adopt_character(CharacterRecord {
        name: minted.name.clone(),
        image_uri: minted.image_uri.clone(),
        hp: minted.hp,
        max_hp: minted.max_hp,
        attack_damage: minted.attack_damage,
        owner: Some(ctx.alice),
    });

    // then
    let snapshot = ctx.session.snapshot();
    let Some(CharacterStatus::Ready(record)) = snapshot.character else {
        panic!("expected an adopted ready character");
    };
    assert_eq!(record.name, "Han Solo");
    assert_eq!(record.hp, 100);
    assert_eq!(record.owner, Some(ctx.alice));
    assert_eq!(snapshot.status, "Ready");
}
