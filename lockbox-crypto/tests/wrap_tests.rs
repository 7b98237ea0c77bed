use lockbox_crypto::{
    generate_content_key, generate_keypair, protect_private_key, reveal_private_key, unwrap_key,
    wrap_key, CryptoError, KdfParams, KeyBackend, PrivateKey, PublicKey, SoftwareBackend,
    UserKeyPair, DEFAULT_RSA_BITS,
};
use std::sync::OnceLock;

fn alice() -> &'static UserKeyPair {
    static KP: OnceLock<UserKeyPair> = OnceLock::new();
    KP.get_or_init(|| generate_keypair(DEFAULT_RSA_BITS).unwrap())
}

fn bob() -> &'static UserKeyPair {
    static KP: OnceLock<UserKeyPair> = OnceLock::new();
    KP.get_or_init(|| generate_keypair(DEFAULT_RSA_BITS).unwrap())
}

// ── Key wrapping ──

#[test]
fn wrap_unwrap_roundtrip() {
    let key = generate_content_key();
    let wrapped = wrap_key(key.as_bytes(), &alice().public).unwrap();

    assert_eq!(wrapped.len(), DEFAULT_RSA_BITS / 8);
    let raw = unwrap_key(&wrapped, &alice().private).unwrap();
    assert_eq!(raw.as_slice(), key.as_bytes());
}

#[test]
fn each_wrap_is_randomized() {
    let key = generate_content_key();
    let w1 = wrap_key(key.as_bytes(), &alice().public).unwrap();
    let w2 = wrap_key(key.as_bytes(), &alice().public).unwrap();
    assert_ne!(w1, w2);
}

#[test]
fn wrong_private_key_fails_with_decryption() {
    let key = generate_content_key();
    let wrapped = wrap_key(key.as_bytes(), &alice().public).unwrap();

    let err = unwrap_key(&wrapped, &bob().private).unwrap_err();
    assert!(matches!(err, CryptoError::Decryption(_)));
}

#[test]
fn tampered_blob_fails() {
    let key = generate_content_key();
    let mut wrapped = wrap_key(key.as_bytes(), &alice().public).unwrap();
    wrapped[10] ^= 0xFF;
    assert!(unwrap_key(&wrapped, &alice().private).is_err());
}

#[test]
fn truncated_blob_fails() {
    let key = generate_content_key();
    let wrapped = wrap_key(key.as_bytes(), &alice().public).unwrap();
    assert!(unwrap_key(&wrapped[..100], &alice().private).is_err());
}

// ── Key encoding ──

#[test]
fn malformed_public_key_is_key_format_error() {
    let err = PublicKey::from_der(b"definitely not DER").unwrap_err();
    assert!(err.is_key_format());

    let err = SoftwareBackend.wrap(b"0123456789abcdef", &[0x30, 0x03, 0x02]).unwrap_err();
    assert!(err.is_key_format());
}

#[test]
fn malformed_private_key_is_key_format_error() {
    let err = PrivateKey::from_der(&[0u8; 64]).unwrap_err();
    assert!(matches!(err, CryptoError::KeyFormat(_)));
}

#[test]
fn der_round_trip_preserves_keys() {
    let public_der = alice().public.to_der().unwrap();
    let private_der = alice().private.to_der().unwrap();

    let public = PublicKey::from_der(&public_der).unwrap();
    let private = PrivateKey::from_der(&private_der).unwrap();
    assert_eq!(public, alice().public);
    assert_eq!(private.public_key(), alice().public);
}

#[test]
fn backend_wraps_with_der_public_key() {
    let backend = SoftwareBackend;
    let raw = backend.generate_key(32);
    assert_eq!(raw.len(), 32);

    let der = alice().public.to_der().unwrap();
    let wrapped = backend.wrap(&raw, &der).unwrap();
    let back = backend.unwrap(&wrapped, &alice().private).unwrap();
    assert_eq!(back.as_slice(), raw.as_slice());
}

// ── Private key vault ──

#[test]
fn protect_reveal_roundtrip() {
    let params = KdfParams::insecure_fast();
    let blob = protect_private_key(&alice().private, b"correct horse", &params).unwrap();

    let revealed = reveal_private_key(&blob, b"correct horse").unwrap();
    assert_eq!(revealed.public_key(), alice().public);
}

#[test]
fn wrong_secret_fails() {
    let params = KdfParams::insecure_fast();
    let blob = protect_private_key(&alice().private, b"correct horse", &params).unwrap();

    let err = reveal_private_key(&blob, b"battery staple").unwrap_err();
    assert!(matches!(err, CryptoError::Decryption(_)));
}

#[test]
fn corrupted_blob_fails() {
    let params = KdfParams::insecure_fast();
    let mut blob = protect_private_key(&alice().private, b"secret", &params).unwrap();
    let last = blob.len() - 1;
    blob[last] ^= 0x01;
    assert!(reveal_private_key(&blob, b"secret").is_err());
}

#[test]
fn salt_is_fresh_per_protect() {
    let params = KdfParams::insecure_fast();
    let b1 = protect_private_key(&alice().private, b"secret", &params).unwrap();
    let b2 = protect_private_key(&alice().private, b"secret", &params).unwrap();
    assert_ne!(b1[13..29], b2[13..29]);
}

#[test]
fn blob_records_kdf_parameters() {
    let params = KdfParams {
        memory_kib: 128,
        iterations: 2,
        parallelism: 1,
    };
    let blob = protect_private_key(&alice().private, b"secret", &params).unwrap();
    assert_eq!(blob[0], 1);
    assert_eq!(u32::from_be_bytes(blob[1..5].try_into().unwrap()), 128);
    assert_eq!(u32::from_be_bytes(blob[5..9].try_into().unwrap()), 2);

    // Opening doesn't need the parameters from anywhere else.
    assert!(reveal_private_key(&blob, b"secret").is_ok());
}
