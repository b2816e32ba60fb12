use super::common::*;

use crate::cache::SessionContext;
use crate::ids::HashKey;
use crate::store::{AssignMode, AutoAssignRule};
use crate::workflows::interviews::{AssignRuleUpdate, SchedulingError};
use crate::workflows::tenancy::TeamDraft;

fn expect_bad_input<T: std::fmt::Debug>(result: Result<T, SchedulingError>) {
    match result {
        Err(SchedulingError::BadInput(_)) => {}
        other => panic!("expected bad input, got {other:?}"),
    }
}

#[tokio::test]
async fn new_members_are_eligible_and_ranked_last() {
    let fx = fixture(2, AssignMode::Auto, &["A", "B"]).await;

    let settings = fx.service.team_settings(&fx.session).await.expect("settings");

    assert_eq!(settings.rounds, 2);
    assert_eq!(settings.auto_rule, Some(AutoAssignRule::AscByPriority));
    assert_eq!(settings.priority, fx.keys(&["A", "B"]));
    assert_eq!(settings.per_round.len(), 2);
    for round in &settings.per_round {
        assert_eq!(round.user_min, 1);
        assert_eq!(round.eligible.len(), 2);
    }
}

#[tokio::test]
async fn round_count_grows_and_shrinks() {
    let fx = fixture(2, AssignMode::Manual, &["A", "B"]).await;

    let grown = fx.service.update_rounds(&fx.session, 4).await.expect("grown");
    assert_eq!(grown.rounds, 4);
    assert_eq!(
        grown.per_round.iter().map(|r| r.round).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
    assert!(grown.per_round[3].eligible.len() == 2 && grown.per_round[3].user_min == 1);

    let shrunk = fx.service.update_rounds(&fx.session, 1).await.expect("shrunk");
    assert_eq!(shrunk.rounds, 1);
    assert_eq!(shrunk.per_round.len(), 1);

    expect_bad_input(fx.service.update_rounds(&fx.session, 0).await);
    expect_bad_input(fx.service.update_rounds(&fx.session, 31).await);
}

#[tokio::test]
async fn round_minimum_respects_headcount_cap() {
    let fx = fixture(2, AssignMode::Manual, &["A"]).await;

    let settings = fx
        .service
        .set_round_minimum(&fx.session, 2, 3)
        .await
        .expect("minimum");
    assert_eq!(settings.per_round[1].user_min, 3);

    expect_bad_input(fx.service.set_round_minimum(&fx.session, 1, 0).await);
    expect_bad_input(fx.service.set_round_minimum(&fx.session, 1, 7).await);
    expect_bad_input(fx.service.set_round_minimum(&fx.session, 3, 1).await);
}

#[tokio::test]
async fn eligibility_is_limited_to_members() {
    let fx = fixture(1, AssignMode::Manual, &["A", "B"]).await;
    let outsider = fx
        .tenancy
        .create_user(fx.company.id, "Z", "z@acme.test")
        .await
        .expect("user");

    let settings = fx
        .service
        .replace_eligibility(&fx.session, 1, &fx.keys(&["B"]))
        .await
        .expect("eligibility");
    assert_eq!(settings.per_round[0].eligible, fx.keys(&["B"]));

    expect_bad_input(
        fx.service
            .replace_eligibility(&fx.session, 1, &[outsider.hash_key])
            .await,
    );
    match fx
        .service
        .replace_eligibility(&fx.session, 1, &[HashKey::from("user_missing")])
        .await
    {
        Err(SchedulingError::NotFound("user")) => {}
        other => panic!("expected missing user, got {other:?}"),
    }
}

#[tokio::test]
async fn priority_must_be_a_permutation_of_members() {
    let fx = fixture(1, AssignMode::Auto, &["A", "B", "C"]).await;

    let settings = fx
        .service
        .replace_priority(&fx.session, &fx.keys(&["C", "A", "B"]))
        .await
        .expect("priority");
    assert_eq!(settings.priority, fx.keys(&["C", "A", "B"]));

    expect_bad_input(
        fx.service
            .replace_priority(&fx.session, &fx.keys(&["C", "A"]))
            .await,
    );
    expect_bad_input(
        fx.service
            .replace_priority(&fx.session, &fx.keys(&["C", "A", "A"]))
            .await,
    );
}

#[tokio::test]
async fn switching_modes_installs_the_auto_rule() {
    let fx = fixture(1, AssignMode::Manual, &["A", "B"]).await;
    assert_eq!(
        fx.service
            .team_settings(&fx.session)
            .await
            .expect("settings")
            .auto_rule,
        None
    );

    let settings = fx
        .service
        .set_assign_rule(
            &fx.session,
            AssignRuleUpdate {
                mode: AssignMode::Auto,
                auto_rule: None,
            },
        )
        .await
        .expect("auto");
    assert_eq!(settings.assign_mode, AssignMode::Auto);
    assert_eq!(settings.auto_rule, Some(AutoAssignRule::AscByPriority));
    assert_eq!(settings.priority.len(), 2);

    let settings = fx
        .service
        .set_assign_rule(
            &fx.session,
            AssignRuleUpdate {
                mode: AssignMode::Manual,
                auto_rule: None,
            },
        )
        .await
        .expect("manual");
    assert_eq!(settings.assign_mode, AssignMode::Manual);
}

#[tokio::test]
async fn sessions_cannot_edit_foreign_teams() {
    let fx = fixture(1, AssignMode::Manual, &["A"]).await;
    let other = fx.tenancy.create_company("Globex").await.expect("company");
    let foreign = fx
        .tenancy
        .create_team(
            other.id,
            &TeamDraft {
                name: "Ops".to_string(),
                rounds: 1,
                assign_mode: AssignMode::Manual,
            },
        )
        .await
        .expect("team");
    let session = SessionContext {
        team_id: Some(foreign.id),
        ..fx.session.clone()
    };

    match fx.service.update_rounds(&session, 2).await {
        Err(SchedulingError::NotFound("team")) => {}
        other => panic!("expected missing team, got {other:?}"),
    }
    match fx.service.pipeline(&session).await {
        Err(SchedulingError::NotFound("team")) => {}
        other => panic!("expected missing team, got {other:?}"),
    }
}
