#![allow(non_snake_case)]
use arena_client::{
    arena::AttackState,
    character::{AbsentReason, CharacterStatus},
    contract::{AttackComplete, RawUint},
    test_helpers::{TestContext, addr},
    wallet::ChainId,
};

#[tokio::test]
async fn sync__loads_boss_and_subscribes_once() {
    let mut ctx = TestContext::new();

    // when
    ctx.session.probe().await;
    ctx.settle().await;

    // then
    let boss = ctx.session.snapshot().boss.unwrap();
    assert_eq!(boss.name, "Darth Vader");
    assert_eq!(boss.hp, 10_000);
    assert_eq!(boss.max_hp, 10_000);
    let counters = ctx.chain.counters();
    assert_eq!(counters.boss_fetches, 1);
    assert_eq!(counters.subscribes, 1);
    assert_eq!(ctx.chain.subscriber_count(), 1);
}

#[tokio::test]
async fn sync__merges_foreign_attack_by_hp_only() {
    let mut ctx = TestContext::new();
    ctx.session.probe().await;
    ctx.settle().await;

    // when: another player's attack arrives over the subscription
    ctx.chain.broadcast_attack(AttackComplete {
        new_boss_hp: RawUint(9_800),
        new_player_hp: RawUint(150),
    });
    ctx.settle().await;

    // then: cached hp values move, nothing else does
    let snapshot = ctx.session.snapshot();
    let boss = snapshot.boss.unwrap();
    assert_eq!(boss.hp, 9_800);
    assert_eq!(boss.name, "Darth Vader");
    assert_eq!(boss.max_hp, 10_000);
    assert_eq!(boss.attack_damage, 50);
    let Some(CharacterStatus::Ready(character)) = snapshot.character else {
        panic!("expected the minted character to stay ready");
    };
    assert_eq!(character.hp, 150);
    assert_eq!(character.max_hp, 200);
    assert_eq!(snapshot.attack, AttackState::Idle);
    assert!(snapshot.toast.is_none());
}

#[tokio::test]
async fn sync__event_can_raise_boss_hp() {
    let mut ctx = TestContext::new();
    ctx.session.probe().await;
    ctx.settle().await;
    ctx.chain.broadcast_attack(AttackComplete {
        new_boss_hp: RawUint(9_000),
        new_player_hp: RawUint(200),
    });
    ctx.settle().await;
    assert_eq!(ctx.session.snapshot().boss.unwrap().hp, 9_000);

    // when: the service reports a higher value than the cache holds
    ctx.chain.broadcast_attack(AttackComplete {
        new_boss_hp: RawUint(10_000),
        new_player_hp: RawUint(200),
    });
    ctx.settle().await;

    // then: replace, not decrement
    assert_eq!(ctx.session.snapshot().boss.unwrap().hp, 10_000);
}

#[tokio::test]
async fn account_switch__unsubscribes_before_rebinding() {
    let mut ctx = TestContext::new();
    ctx.session.probe().await;
    ctx.settle().await;
    let bob = addr(0xB0);

    // when
    ctx.chain.set_authorized(&[bob]);
    ctx.session.probe().await;
    ctx.settle().await;

    // then
    let snapshot = ctx.session.snapshot();
    assert_eq!(snapshot.connection.account, Some(bob));
    assert_eq!(
        snapshot.character,
        Some(CharacterStatus::Absent(AbsentReason::NeverMinted)),
    );
    let counters = ctx.chain.counters();
    assert_eq!(counters.character_fetches, 2);
    assert_eq!(counters.boss_fetches, 2);
    assert_eq!(counters.subscribes, 2);
    assert_eq!(ctx.chain.subscriber_count(), 1);
}

#[tokio::test]
async fn account_switch__suppresses_stale_resolver_result() {
    let mut ctx = TestContext::new();
    let bob = addr(0xB0);

    // when: the account changes before the first resolver reports
    ctx.session.probe().await;
    ctx.chain.set_authorized(&[bob]);
    ctx.session.probe().await;
    ctx.settle().await;

    // then: the stale report is dropped, not adopted
    let snapshot = ctx.session.snapshot();
    assert_eq!(snapshot.connection.account, Some(bob));
    assert_eq!(
        snapshot.character,
        Some(CharacterStatus::Absent(AbsentReason::NeverMinted)),
    );
    assert_eq!(snapshot.boss.unwrap().name, "Darth Vader");
    assert_eq!(ctx.chain.counters().character_fetches, 2);
}

#[tokio::test]
async fn sync__stream_loss_reported_and_not_resubscribed() {
    let mut ctx = TestContext::new();
    ctx.session.probe().await;
    ctx.settle().await;

    // when
    ctx.chain.drop_subscribers();
    ctx.settle().await;

    // then
    let snapshot = ctx.session.snapshot();
    assert_eq!(snapshot.status, "Combat event stream lost");
    assert_eq!(ctx.chain.counters().subscribes, 1);
    assert_eq!(ctx.chain.subscriber_count(), 0);

    // a probe on the unchanged connection must not quietly resubscribe
    ctx.session.probe().await;
    ctx.settle().await;
    assert_eq!(ctx.chain.counters().subscribes, 1);
    assert_eq!(ctx.session.snapshot().status, "Combat event stream lost");
}

#[tokio::test]
async fn probe__network_change_releases_the_binding() {
    let mut ctx = TestContext::new();
    ctx.session.probe().await;
    ctx.settle().await;

    // when: the wallet moves to another chain
    ctx.chain.set_chain_id(ChainId::new(1));
    ctx.session.probe().await;
    ctx.settle().await;

    // then: everything bound to the old connection is gone
    let snapshot = ctx.session.snapshot();
    assert!(!snapshot.connection.network_ok);
    assert!(snapshot.boss.is_none());
    assert!(snapshot.character.is_none());
    assert_eq!(snapshot.attack, AttackState::Idle);
    assert_eq!(ctx.chain.subscriber_count(), 0);

    // and back: a fresh binding, not a resumed one
    ctx.chain.set_chain_id(ChainId::new(4));
    ctx.session.probe().await;
    ctx.settle().await;
    assert_eq!(ctx.chain.counters().subscribes, 2);
    assert_eq!(ctx.session.snapshot().boss.unwrap().hp, 10_000);
}
