use std::sync::Arc;

use credlink_core::channel::{RelationChannel, Side, PASSWORD_KEY, SECRET_ID_KEY, USERNAME_KEY};
use credlink_core::{
    DeliveryKind, DynSecretStore, Error, MemoryStore, PartyId, RelationId, ResolveOptions,
    RotationPolicy, SecretStore, StatusKind,
};
use credlink_owner::{OwnerConfig, OwnerController, OwnerEvent, OwnerState};

struct Setup {
    store: DynSecretStore,
    channel: Arc<RelationChannel>,
    owner: OwnerController,
    relation: RelationId,
    remote: PartyId,
}

fn setup(config: OwnerConfig) -> Setup {
    let store: DynSecretStore = Arc::new(MemoryStore::new());
    let channel = Arc::new(RelationChannel::new());
    let party = PartyId::new("owner-app").expect("party id");
    let owner = OwnerController::new(party, store.clone(), channel.clone(), config);
    Setup {
        store,
        channel,
        owner,
        relation: RelationId::new("secret-id.0").expect("relation id"),
        remote: PartyId::new("holder-app").expect("party id"),
    }
}

fn publish(setup: &mut Setup) {
    setup.owner.dispatch(&OwnerEvent::Install);
    setup.channel.open(&setup.relation);
    setup.owner.dispatch(&OwnerEvent::RelationCreated {
        relation: setup.relation.clone(),
        remote: setup.remote.clone(),
    });
}

#[test]
fn install_waits_for_relation() {
    let mut setup = setup(OwnerConfig::default());
    setup.owner.dispatch(&OwnerEvent::Install);
    assert_eq!(setup.owner.status().kind, StatusKind::Waiting);
    assert_eq!(setup.owner.status().detail, "waiting for relation");
    assert_eq!(setup.owner.state(), &OwnerState::WaitingForRelation);
}

#[test]
fn publish_grants_and_writes_the_secret_id() {
    let mut setup = setup(OwnerConfig::default());
    publish(&mut setup);

    let id = setup.owner.secret_id().expect("secret created").clone();
    assert_eq!(setup.owner.status().kind, StatusKind::Active);
    assert_eq!(
        setup.owner.status().detail,
        format!("published secret ID {id}")
    );
    assert_eq!(
        setup.owner.state(),
        &OwnerState::Published {
            relation: setup.relation.clone()
        }
    );
    assert_eq!(
        setup
            .channel
            .read_remote(Side::Consumer, &setup.relation, SECRET_ID_KEY),
        Some(id.to_string())
    );

    // The grant lets the remote party read revision 0.
    let view = setup
        .store
        .resolve(&setup.remote, &id, ResolveOptions::current())
        .expect("granted read");
    assert_eq!(view.revision, 0);
    assert_eq!(
        view.content.get(USERNAME_KEY).map(String::as_str),
        Some("admin")
    );
}

#[test]
fn publish_without_grant_still_publishes_the_identity() {
    let mut setup = setup(OwnerConfig {
        grant: false,
        ..OwnerConfig::default()
    });
    publish(&mut setup);

    let id = setup.owner.secret_id().expect("secret created").clone();
    assert_eq!(setup.owner.status().kind, StatusKind::Active);
    assert_eq!(
        setup.owner.status().detail,
        format!("published secret ID {id} (not granted)")
    );
    assert!(setup
        .channel
        .read_remote(Side::Consumer, &setup.relation, SECRET_ID_KEY)
        .is_some());

    let err = setup
        .store
        .resolve(&setup.remote, &id, ResolveOptions::current())
        .expect_err("no grant was issued");
    assert!(matches!(err, Error::AccessDenied { .. }));
}

#[test]
fn redelivered_relation_created_is_idempotent() {
    let mut setup = setup(OwnerConfig::default());
    publish(&mut setup);
    let id = setup.owner.secret_id().expect("secret created").clone();

    setup.owner.dispatch(&OwnerEvent::RelationCreated {
        relation: setup.relation.clone(),
        remote: setup.remote.clone(),
    });

    assert_eq!(setup.owner.secret_id(), Some(&id));
    assert_eq!(
        setup
            .channel
            .read_remote(Side::Consumer, &setup.relation, SECRET_ID_KEY),
        Some(id.to_string())
    );
    assert_eq!(setup.owner.status().kind, StatusKind::Active);
}

#[test]
fn rotate_action_reports_the_revision_step() {
    let mut setup = setup(OwnerConfig::default());
    publish(&mut setup);
    let id = setup.owner.secret_id().expect("secret created").clone();

    setup.owner.dispatch(&OwnerEvent::RotateAction);
    assert_eq!(setup.owner.status().kind, StatusKind::Active);
    assert_eq!(setup.owner.status().detail, "rotated: revision 0 --> 1");

    setup.owner.dispatch(&OwnerEvent::RotateAction);
    assert_eq!(setup.owner.status().detail, "rotated: revision 1 --> 2");

    let view = setup
        .store
        .resolve(&setup.remote, &id, ResolveOptions::peek())
        .expect("peek");
    assert_eq!(view.revision, 2);
    assert_eq!(
        view.content.get(USERNAME_KEY).map(String::as_str),
        Some("username-rev-2")
    );

    // Identity on the wire is untouched by rotation.
    assert_eq!(
        setup
            .channel
            .read_remote(Side::Consumer, &setup.relation, SECRET_ID_KEY),
        Some(id.to_string())
    );
}

#[test]
fn rotate_action_before_publish_is_a_noop() {
    let mut setup = setup(OwnerConfig::default());
    setup.owner.dispatch(&OwnerEvent::Install);
    setup.owner.dispatch(&OwnerEvent::RotateAction);
    assert_eq!(setup.owner.status().kind, StatusKind::Waiting);
    assert_eq!(setup.owner.state(), &OwnerState::WaitingForRelation);
}

#[test]
fn policy_reminders_block_until_an_explicit_rotation() {
    let mut setup = setup(OwnerConfig {
        rotate: RotationPolicy::Daily,
        ..OwnerConfig::default()
    });
    publish(&mut setup);

    setup.owner.dispatch(&OwnerEvent::SecretRotate);
    assert_eq!(setup.owner.status().kind, StatusKind::Blocked);
    assert!(setup.owner.status().detail.starts_with("rotation overdue"));

    setup.owner.dispatch(&OwnerEvent::RotateAction);
    assert_eq!(setup.owner.status().kind, StatusKind::Active);
    assert_eq!(setup.owner.status().detail, "rotated: revision 0 --> 1");
}

#[test]
fn expiry_blocks_until_an_explicit_rotation() {
    let mut setup = setup(OwnerConfig {
        expire: Some("2026-01-01T00:00:00Z".into()),
        ..OwnerConfig::default()
    });
    publish(&mut setup);

    setup.owner.dispatch(&OwnerEvent::SecretExpired);
    assert_eq!(setup.owner.status().kind, StatusKind::Blocked);
    assert!(setup.owner.status().detail.starts_with("secret expired"));
}

#[test]
fn secret_remove_is_best_effort() {
    let mut setup = setup(OwnerConfig::default());
    publish(&mut setup);
    setup.owner.dispatch(&OwnerEvent::RotateAction);
    let status_before = setup.owner.status().clone();

    // Revision 0 was never acknowledged by any reader, so it is pruned;
    // pruning the newest revision is refused and only logged. Neither
    // outcome touches the status.
    setup.owner.dispatch(&OwnerEvent::SecretRemove { revision: 0 });
    assert_eq!(setup.owner.status(), &status_before);
    setup.owner.dispatch(&OwnerEvent::SecretRemove { revision: 1 });
    assert_eq!(setup.owner.status(), &status_before);

    let id = setup.owner.secret_id().expect("secret").clone();
    let view = setup
        .store
        .resolve(&setup.remote, &id, ResolveOptions::peek())
        .expect("latest survives");
    assert_eq!(view.revision, 1);
}

#[test]
fn broken_relation_revokes_and_tears_down() {
    let mut setup = setup(OwnerConfig::default());
    publish(&mut setup);
    let id = setup.owner.secret_id().expect("secret created").clone();

    setup.owner.dispatch(&OwnerEvent::RelationBroken {
        relation: setup.relation.clone(),
    });
    setup.channel.close(&setup.relation);

    assert_eq!(setup.owner.state(), &OwnerState::Revoked);
    assert_eq!(setup.owner.status().kind, StatusKind::Waiting);
    assert_eq!(setup.owner.status().detail, "waiting for relation");

    let err = setup
        .store
        .resolve(&setup.remote, &id, ResolveOptions::current())
        .expect_err("grant withdrawn");
    assert!(matches!(err, Error::AccessDenied { .. }));
}

#[test]
fn a_new_relation_gets_a_fresh_secret_after_teardown() {
    let mut setup = setup(OwnerConfig::default());
    publish(&mut setup);
    let first = setup.owner.secret_id().expect("secret created").clone();

    setup.owner.dispatch(&OwnerEvent::RelationBroken {
        relation: setup.relation.clone(),
    });
    setup.channel.close(&setup.relation);

    let next_relation = RelationId::new("secret-id.1").expect("relation id");
    setup.channel.open(&next_relation);
    setup.owner.dispatch(&OwnerEvent::RelationCreated {
        relation: next_relation.clone(),
        remote: setup.remote.clone(),
    });

    let second = setup.owner.secret_id().expect("recreated").clone();
    assert_ne!(first, second);
    assert_eq!(setup.owner.status().kind, StatusKind::Active);
    assert_eq!(
        setup
            .channel
            .read_remote(Side::Consumer, &next_relation, SECRET_ID_KEY),
        Some(second.to_string())
    );
}

#[test]
fn direct_delivery_publishes_and_rotates_raw_fields() {
    let mut setup = setup(OwnerConfig {
        delivery: DeliveryKind::Direct,
        ..OwnerConfig::default()
    });
    publish(&mut setup);

    assert_eq!(
        setup
            .channel
            .read_remote(Side::Consumer, &setup.relation, USERNAME_KEY),
        Some("admin".to_string())
    );
    assert_eq!(
        setup
            .channel
            .read_remote(Side::Consumer, &setup.relation, PASSWORD_KEY),
        Some("admin".to_string())
    );
    assert_eq!(
        setup
            .channel
            .read_remote(Side::Consumer, &setup.relation, SECRET_ID_KEY),
        None
    );

    setup.owner.dispatch(&OwnerEvent::RotateAction);
    assert_eq!(
        setup
            .channel
            .read_remote(Side::Consumer, &setup.relation, USERNAME_KEY),
        Some("username-rev-1".to_string())
    );
    assert_eq!(
        setup
            .channel
            .read_remote(Side::Consumer, &setup.relation, PASSWORD_KEY),
        Some("password-rev-1".to_string())
    );
}
