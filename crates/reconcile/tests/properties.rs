//! End-to-end planning and apply properties against the in-memory gateway

use reconcile::mock::MockGateway;
use reconcile::{
    CancelToken, ChangeDetails, ChangeKind, DesiredState, Permission, Plan, Policy, Role,
    TeamSpec, apply_simple, compute_plan,
};

fn platform_team() -> TeamSpec {
    let mut team = TeamSpec::named("Platform");
    team.maintainers = vec!["alice".into(), "bob".into()];
    team.members = vec!["alice".into()];
    team.repositories.insert("infra".into(), "write".into());
    team
}

fn desired(teams: Vec<TeamSpec>, policy: Policy) -> DesiredState {
    DesiredState {
        org: "acme".into(),
        teams,
        policy,
    }
}

fn labels(plan: &Plan) -> Vec<String> {
    plan.ordered().iter().map(ToString::to_string).collect()
}

#[test]
fn platform_scenario_on_empty_org() {
    let state = desired(
        vec![platform_team()],
        Policy {
            create_repo: true,
            ..Default::default()
        },
    );
    let plan = compute_plan(&state, &MockGateway::new(), &CancelToken::new()).unwrap();

    assert_eq!(
        labels(&plan),
        vec![
            "team:create platform",
            "repo:ensure infra",
            "team-repo:grant platform/infra",
            "team-member:ensure platform",
            "team-member:ensure platform",
        ]
    );

    let ordered = plan.ordered();
    match ordered[2].details() {
        ChangeDetails::TeamRepoGrant(d) => {
            assert_eq!(d.slug, "platform");
            assert_eq!(d.repo, "infra");
            assert_eq!(d.permission, Permission::Push);
        }
        other => panic!("unexpected {other:?}"),
    }
    let members: Vec<(&str, Role)> = ordered[3..]
        .iter()
        .map(|c| match c.details() {
            ChangeDetails::TeamMemberEnsure(d) => (d.user.as_str(), d.role),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(
        members,
        vec![("alice", Role::Maintainer), ("bob", Role::Maintainer)]
    );
}

#[test]
fn planning_is_idempotent() {
    let gateway = MockGateway::new().with_page_size(1);
    gateway.add_team("Ops", "ops");
    gateway.add_team_member("ops", "erin", Role::Member);
    gateway.add_repo("tools");

    let mut ops = TeamSpec::named("Ops");
    ops.maintainers = vec!["erin".into()];
    ops.repositories.insert("tools".into(), "read".into());
    let state = desired(
        vec![platform_team(), ops],
        Policy {
            create_repo: true,
            add_default_readme: true,
            ..Default::default()
        },
    );

    let cancel = CancelToken::new();
    let first = compute_plan(&state, &gateway, &cancel).unwrap();
    let second = compute_plan(&state, &gateway, &cancel).unwrap();
    assert_eq!(first, second);
}

#[test]
fn apply_then_replan_converges() {
    let gateway = MockGateway::new().with_page_size(2);
    gateway.add_team("Ops", "ops");
    gateway.add_team_member("ops", "erin", Role::Maintainer);
    gateway.add_repo("Tools");

    let mut ops = TeamSpec::named("Ops");
    ops.members = vec!["erin".into(), "frank".into()];
    ops.repositories.insert("tools".into(), "maintain".into());
    ops.repositories.insert("infra".into(), "admin".into());
    let state = desired(
        vec![platform_team(), ops],
        Policy {
            create_repo: true,
            add_default_readme: true,
            add_renovate_config: true,
            renovate_config: Some("{}".into()),
            ..Default::default()
        },
    );

    let cancel = CancelToken::new();
    let plan = compute_plan(&state, &gateway, &cancel).unwrap();
    apply_simple(plan, &gateway, &cancel).unwrap();

    let replan = compute_plan(&state, &gateway, &cancel).unwrap();
    for change in &replan.changes {
        assert!(
            matches!(
                change.kind(),
                ChangeKind::TeamRepoGrant | ChangeKind::RepoFileEnsure
            ),
            "unexpected change after apply: {change}"
        );
    }

    // Remaining grants and file ensures are no-ops on the remote
    let before = gateway.mutations().len();
    let summary = apply_simple(replan, &gateway, &cancel).unwrap();
    assert_eq!(summary.skipped, 6);
    let repeated: Vec<String> = gateway.mutations().split_off(before);
    assert!(repeated.iter().all(|c| c.starts_with("add_team_repository")));
    assert_eq!(gateway.team_role("ops", "erin"), Some(Role::Member));
    assert_eq!(gateway.team_permission("ops", "infra"), Some(Permission::Admin));
}

#[test]
fn create_before_membership_for_same_team() {
    let gateway = MockGateway::new();
    let mut teams = Vec::new();
    for name in ["Zeta", "Alpha", "Mid"] {
        let mut team = TeamSpec::named(name);
        team.members = vec!["user".into()];
        teams.push(team);
    }
    let plan = compute_plan(&desired(teams, Policy::default()), &gateway, &CancelToken::new())
        .unwrap();

    let ordered = plan.ordered();
    for (pos, change) in ordered.iter().enumerate() {
        if change.kind() == ChangeKind::TeamMemberEnsure {
            let created_at = ordered
                .iter()
                .position(|c| c.kind() == ChangeKind::TeamCreate && c.target() == change.target())
                .unwrap();
            assert!(created_at < pos);
        }
    }
}

#[test]
fn repo_race_does_not_abort_run() {
    let state = desired(
        vec![platform_team()],
        Policy {
            create_repo: true,
            ..Default::default()
        },
    );
    let gateway = MockGateway::new();
    let cancel = CancelToken::new();
    let plan = compute_plan(&state, &gateway, &cancel).unwrap();

    // Someone else creates the repository between planning and applying
    gateway.add_repo("infra");
    let summary = apply_simple(plan, &gateway, &cancel).unwrap();

    assert_eq!(summary.tolerated, 1);
    assert_eq!(summary.applied, 4);
    assert_eq!(gateway.team_role("platform", "bob"), Some(Role::Maintainer));
}

#[test]
fn cleanup_removes_orphans_last() {
    let gateway = MockGateway::new();
    gateway.add_team("Legacy", "legacy");
    gateway.add_team_member("legacy", "dave", Role::Member);
    gateway.add_org_member("carol");

    let state = desired(
        vec![platform_team()],
        Policy {
            create_repo: true,
            delete_unconfigured_teams: true,
            remove_members_without_team: true,
            ..Default::default()
        },
    );
    let cancel = CancelToken::new();
    let plan = compute_plan(&state, &gateway, &cancel).unwrap();
    let ordered = labels(&plan);
    assert_eq!(
        &ordered[ordered.len() - 2..],
        &["team:delete legacy", "org-member:remove carol"]
    );

    apply_simple(plan, &gateway, &cancel).unwrap();
    assert_eq!(gateway.team_slugs(), vec!["platform"]);
    assert!(!gateway.is_org_member("carol"));
    // dave was in a team when planning ran
    assert!(gateway.is_org_member("dave"));
}

#[test]
fn saved_plan_applies_like_computed_plan() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.json");

    let state = desired(
        vec![platform_team()],
        Policy {
            create_repo: true,
            add_default_readme: true,
            ..Default::default()
        },
    );
    let cancel = CancelToken::new();
    let plan = compute_plan(&state, &MockGateway::new(), &cancel).unwrap();
    std::fs::write(&path, plan.to_json_pretty().unwrap()).unwrap();

    let loaded = Plan::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(loaded, plan);

    let gateway = MockGateway::new();
    let summary = apply_simple(loaded, &gateway, &cancel).unwrap();
    assert_eq!(summary.applied, plan.len());
    assert!(gateway.file("infra", "README.md", "main").is_some());
}
