mod support;

use chrono::{Duration, Utc};
use lockbox_engine::{EngineError, DEFAULT_SHARE_EXPIRY_DAYS};
use lockbox_types::{
    AccessOracle, ByteStorage, FileId, FileMetadataStore, GrantStore, Permissions, UserId,
};
use pretty_assertions::assert_eq;
use support::Fixture;

// ── Resharing ────────────────────────────────────────────────────

#[test]
fn ten_byte_scenario() {
    let fx = Fixture::new();
    let u1 = fx.user(0);
    let u2 = fx.user(1);
    let payload = b"ten bytes!";

    let record = fx.engine.upload(payload, "ten.bin", &u1).unwrap();
    let envelope = fx.engine.load_envelope(&record.id).unwrap();
    assert_eq!(fx.engine.decrypt(&envelope, &u1).unwrap(), payload);

    let mut corrupted = envelope.clone();
    corrupted.ciphertext[0] ^= 0x01;
    assert!(matches!(
        fx.engine.decrypt(&corrupted, &u1),
        Err(EngineError::IntegrityFailure(_))
    ));

    fx.keys.reshare_content_keys(&record.id, &u1, &u2).unwrap();
    assert_eq!(fx.engine.decrypt(&envelope, &u2).unwrap(), payload);
    assert_eq!(
        fx.blobs.get(&record.storage_locator).unwrap(),
        envelope.ciphertext
    );
}

#[test]
fn reshare_leaves_ciphertext_and_owner_keys_untouched() {
    let fx = Fixture::new();
    let alice = fx.user(0);
    let bob = fx.user(1);
    let record = fx.engine.upload(b"shared notes", "notes.md", &alice).unwrap();
    let before = fx.blobs.get(&record.storage_locator).unwrap();
    let alice_plain = fx.engine.decrypt_file(&record.id, &alice).unwrap();

    let wrapped = fx.keys.reshare_content_keys(&record.id, &alice, &bob).unwrap();

    let after = fx.files.get(&record.id).unwrap();
    assert_eq!(fx.blobs.get(&record.storage_locator).unwrap(), before);
    assert_eq!(after.header, record.header);
    assert_eq!(after.recipient_keys.get(&bob), Some(&wrapped));
    assert_eq!(fx.engine.decrypt_file(&record.id, &bob).unwrap(), alice_plain);
}

#[test]
fn grantee_can_reshare_onwards() {
    let fx = Fixture::new();
    let alice = fx.user(0);
    let bob = fx.user(1);
    let carol = fx.user(2);
    let record = fx.engine.upload(b"pass it on", "chain.txt", &alice).unwrap();

    fx.keys.reshare_content_keys(&record.id, &alice, &bob).unwrap();
    fx.keys.reshare_content_keys(&record.id, &bob, &carol).unwrap();
    assert_eq!(
        fx.engine.decrypt_file(&record.id, &carol).unwrap(),
        b"pass it on"
    );
}

#[test]
fn reshare_to_owner_is_a_no_op() {
    let fx = Fixture::new();
    let alice = fx.user(0);
    let record = fx.engine.upload(b"mine", "m.txt", &alice).unwrap();

    let wrapped = fx.keys.reshare_content_keys(&record.id, &alice, &alice).unwrap();
    assert_eq!(wrapped, record.header.wrapped_keys);
    assert!(fx.files.get(&record.id).unwrap().recipient_keys.is_empty());
}

#[test]
fn reshare_failures_are_not_found() {
    let fx = Fixture::new();
    let alice = fx.user(0);
    let bob = fx.user(1);
    let carol = fx.user(2);
    let record = fx.engine.upload(b"x", "x", &alice).unwrap();

    let cases = [
        fx.keys.reshare_content_keys(&FileId::new(), &alice, &bob),
        fx.keys.reshare_content_keys(&record.id, &alice, &UserId::new()),
        // Bob holds no keys to reshare from.
        fx.keys.reshare_content_keys(&record.id, &bob, &carol),
    ];
    for result in cases {
        let err = result.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)), "{err:?}");
    }
}

// ── Share workflow ───────────────────────────────────────────────

#[test]
fn share_file_grants_access_and_keys() {
    let fx = Fixture::new();
    let alice = fx.user(0);
    let bob = fx.user(1);
    let record = fx.engine.upload(b"report", "r.pdf", &alice).unwrap();

    let grant = fx
        .shares
        .share_file(&record.id, &alice, &bob, Permissions::READ, None)
        .unwrap();

    assert_eq!(grant.grantee, bob);
    assert_eq!(grant.granted_by, alice);
    let expiry = grant.expires_at.unwrap() - grant.granted_at;
    assert_eq!(expiry, Duration::days(DEFAULT_SHARE_EXPIRY_DAYS));

    assert!(fx.grants.can_access(&bob, &record.id).unwrap());
    assert_eq!(fx.engine.decrypt_file(&record.id, &bob).unwrap(), b"report");
}

#[test]
fn explicit_expiry_is_kept() {
    let fx = Fixture::new();
    let alice = fx.user(0);
    let bob = fx.user(1);
    let record = fx.engine.upload(b"r", "r", &alice).unwrap();
    let expires = Utc::now() + Duration::days(30);

    let grant = fx
        .shares
        .share_file(&record.id, &alice, &bob, Permissions::READ, Some(expires))
        .unwrap();
    assert_eq!(grant.expires_at, Some(expires));
}

#[test]
fn read_only_grantee_cannot_share() {
    let fx = Fixture::new();
    let alice = fx.user(0);
    let bob = fx.user(1);
    let carol = fx.user(2);
    let record = fx.engine.upload(b"r", "r", &alice).unwrap();
    fx.shares
        .share_file(&record.id, &alice, &bob, Permissions::READ, None)
        .unwrap();

    let err = fx
        .shares
        .share_file(&record.id, &bob, &carol, Permissions::READ, None)
        .unwrap_err();
    assert!(matches!(err, EngineError::AccessDenied(_)));
    assert!(!fx.grants.can_access(&carol, &record.id).unwrap());
    assert!(fx.files.get(&record.id).unwrap().recipient_keys.get(&carol).is_none());
}

#[test]
fn grantee_with_share_bit_can_share() {
    let fx = Fixture::new();
    let alice = fx.user(0);
    let bob = fx.user(1);
    let carol = fx.user(2);
    let record = fx.engine.upload(b"r", "r", &alice).unwrap();
    fx.shares
        .share_file(
            &record.id,
            &alice,
            &bob,
            Permissions::READ | Permissions::SHARE,
            None,
        )
        .unwrap();

    fx.shares
        .share_file(&record.id, &bob, &carol, Permissions::READ, None)
        .unwrap();
    assert_eq!(fx.engine.decrypt_file(&record.id, &carol).unwrap(), b"r");
}

#[test]
fn sharing_unknown_grantee_records_no_grant() {
    let fx = Fixture::new();
    let alice = fx.user(0);
    let record = fx.engine.upload(b"r", "r", &alice).unwrap();
    let ghost = UserId::new();

    let err = fx
        .shares
        .share_file(&record.id, &alice, &ghost, Permissions::READ, None)
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert!(fx.grants.grants_for(&record.id).unwrap().is_empty());
}

#[test]
fn revoke_share_removes_grant_and_keys() {
    let fx = Fixture::new();
    let alice = fx.user(0);
    let bob = fx.user(1);
    let record = fx.engine.upload(b"r", "r", &alice).unwrap();
    fx.shares
        .share_file(&record.id, &alice, &bob, Permissions::READ, None)
        .unwrap();

    assert!(fx.shares.revoke_share(&record.id, &alice, &bob).unwrap());
    assert!(!fx.grants.can_access(&bob, &record.id).unwrap());
    assert!(matches!(
        fx.engine.decrypt_file(&record.id, &bob),
        Err(EngineError::NotFound(_))
    ));
    assert!(!fx.shares.revoke_share(&record.id, &alice, &bob).unwrap());
}

#[test]
fn stranger_cannot_revoke() {
    let fx = Fixture::new();
    let alice = fx.user(0);
    let bob = fx.user(1);
    let record = fx.engine.upload(b"r", "r", &alice).unwrap();

    assert!(matches!(
        fx.shares.revoke_share(&record.id, &bob, &alice),
        Err(EngineError::AccessDenied(_))
    ));
    assert!(fx.grants.permissions(&alice, &record.id).unwrap() == Permissions::OWNER);
}
