#![allow(non_snake_case)]
use arena_client::{
    arena::AttackState,
    character::{AbsentReason, CharacterStatus},
    test_helpers::TestContext,
};
use std::time::Duration;

#[tokio::test]
async fn attack__full_round_matches_the_seeded_scenario() {
    let mut ctx = TestContext::new();
    ctx.session.probe().await;
    ctx.settle().await;

    // when
    let submitted = ctx.session.submit_attack();
    assert_eq!(submitted, AttackState::Submitted);
    ctx.settle().await;

    // then: one hit of Chewbacca's 50 damage, the attacker untouched
    let snapshot = ctx.session.snapshot();
    let boss = snapshot.boss.unwrap();
    assert_eq!(boss.hp, 9_950);
    assert_eq!(boss.name, "Darth Vader");
    assert_eq!(boss.max_hp, 10_000);
    let Some(CharacterStatus::Ready(character)) = snapshot.character else {
        panic!("expected the character to survive the round");
    };
    assert_eq!(character.hp, 200);
    assert_eq!(snapshot.status, "Hit landed!");
    assert_eq!(
        snapshot.toast.unwrap().message,
        "Darth Vader was hit for 50!",
    );
    assert_eq!(ctx.chain.boss().hp, 9_950);
    assert_eq!(ctx.chain.counters().attacks, 1);

    // and the hit cue clears on its own
    let at = match snapshot.attack {
        AttackState::Confirmed { at } => at,
        other => panic!("expected a confirmed attack, got {other:?}"),
    };
    ctx.session.tick_at(at + Duration::from_secs(5));
    let snapshot = ctx.session.snapshot();
    assert!(snapshot.toast.is_none());
    assert_eq!(snapshot.attack, AttackState::Idle);
    assert_eq!(snapshot.status, "Ready");
}

#[tokio::test]
async fn attack__repeat_submit_while_outstanding_is_noop() {
    let mut ctx = TestContext::new();
    ctx.session.probe().await;
    ctx.settle().await;

    // when: a second submission lands while the first is in flight
    ctx.session.submit_attack();
    let repeat = ctx.session.submit_attack();
    ctx.settle().await;

    // then: the repeat reported the live command and sent nothing
    assert_eq!(repeat, AttackState::Submitted);
    assert_eq!(ctx.chain.counters().attacks, 1);
    assert_eq!(ctx.session.snapshot().boss.unwrap().hp, 9_950);
    assert!(matches!(
        ctx.session.snapshot().attack,
        AttackState::Confirmed { .. },
    ));
}

#[tokio::test]
async fn attack__without_binding_is_ignored() {
    let mut ctx = TestContext::wrong_network();
    ctx.session.probe().await;
    ctx.settle().await;

    // when
    let state = ctx.session.submit_attack();
    ctx.settle().await;

    // then
    assert_eq!(state, AttackState::Idle);
    assert_eq!(ctx.chain.counters().attacks, 0);
    assert_eq!(ctx.chain.boss().hp, 10_000);
}

#[tokio::test]
async fn attack__user_rejection_fails_the_command() {
    let mut ctx = TestContext::new();
    ctx.session.probe().await;
    ctx.settle().await;
    ctx.chain.script_attack_rejection();

    // when
    ctx.session.submit_attack();
    ctx.settle().await;

    // then
    let snapshot = ctx.session.snapshot();
    let AttackState::Failed { reason } = &snapshot.attack else {
        panic!("expected a failed attack, got {:?}", snapshot.attack);
    };
    assert!(reason.contains("rejected"), "unexpected reason: {reason}");
    assert_eq!(snapshot.status, "Attack failed");
    assert!(!snapshot.errors.is_empty());
    assert_eq!(snapshot.boss.unwrap().hp, 10_000);

    // a failed command does not block the retry
    let retried = ctx.session.submit_attack();
    assert_eq!(retried, AttackState::Submitted);
    ctx.settle().await;
    assert_eq!(ctx.session.snapshot().boss.unwrap().hp, 9_950);
}

#[tokio::test]
async fn attack__revert_fails_and_allows_retry() {
    let mut ctx = TestContext::new();
    ctx.session.probe().await;
    ctx.settle().await;
    ctx.chain.script_attack_revert("boss is enraged");

    // when
    ctx.session.submit_attack();
    ctx.settle().await;

    // then: the revert reason reaches the command verbatim
    let snapshot = ctx.session.snapshot();
    let AttackState::Failed { reason } = &snapshot.attack else {
        panic!("expected a failed attack, got {:?}", snapshot.attack);
    };
    assert_eq!(reason, "execution reverted: boss is enraged");
    assert_eq!(snapshot.boss.unwrap().hp, 10_000);
    assert_eq!(ctx.chain.boss().hp, 10_000);
    assert_eq!(ctx.chain.counters().attacks, 1);

    // when the rage passes
    ctx.session.submit_attack();
    ctx.settle().await;

    // then
    assert_eq!(ctx.session.snapshot().boss.unwrap().hp, 9_950);
}

#[tokio::test]
async fn attack__fallen_character_reverts() {
    let mut ctx = TestContext::bare();
    let fallen = {
        let mut roster_entry = ctx.chain.roster().remove(1);
        roster_entry.hp = 0;
        roster_entry
    };
    ctx.chain.seed_character(ctx.alice, fallen);
    ctx.session.probe().await;
    ctx.settle().await;
    assert_eq!(
        ctx.session.snapshot().character,
        Some(CharacterStatus::Absent(AbsentReason::Fallen)),
    );

    // when: the attack goes out anyway
    ctx.session.submit_attack();
    ctx.settle().await;

    // then: the ledger refuses it
    let snapshot = ctx.session.snapshot();
    let AttackState::Failed { reason } = &snapshot.attack else {
        panic!("expected a failed attack, got {:?}", snapshot.attack);
    };
    assert!(reason.contains("has fallen"), "unexpected reason: {reason}");
    assert_eq!(ctx.chain.boss().hp, 10_000);
}
