use lockbox_crypto::KdfParams;
use lockbox_engine::{EngineError, LockboxConfig};
use pretty_assertions::assert_eq;

#[test]
fn defaults() {
    let config = LockboxConfig::default();
    assert_eq!(config.max_upload_bytes, 100_000_000);
    assert_eq!(config.rotation_days, 90);
    assert_eq!(config.rotation_interval_secs, 3600);
    assert_eq!(config.rsa_bits, 2048);
    assert_eq!(config.kdf, KdfParams::default());
    assert_eq!(config.key_backend, "software");
    assert!(config.validate().is_ok());
}

#[test]
fn fast_kdf_only_changes_kdf() {
    let fast = LockboxConfig::fast_kdf();
    assert_eq!(fast.kdf, KdfParams::insecure_fast());
    assert_eq!(
        LockboxConfig {
            kdf: KdfParams::default(),
            ..fast
        },
        LockboxConfig::default()
    );
}

#[test]
fn partial_json_fills_defaults() {
    let config = LockboxConfig::from_json_str(r#"{ "rotation_days": 30 }"#).unwrap();
    assert_eq!(config.rotation_days, 30);
    assert_eq!(config.max_upload_bytes, 100_000_000);
}

#[test]
fn json_round_trip() {
    let config = LockboxConfig {
        max_upload_bytes: 1024,
        rotation_days: 14,
        ..LockboxConfig::fast_kdf()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(LockboxConfig::from_json_str(&json).unwrap(), config);
}

#[test]
fn rejects_bad_values() {
    let cases = [
        r#"{ "max_upload_bytes": 0 }"#,
        r#"{ "rotation_days": 0 }"#,
        r#"{ "rotation_interval_secs": 0 }"#,
        r#"{ "rsa_bits": 512 }"#,
        r#"{ "rsa_bits": 2049 }"#,
        r#"{ "kdf": { "memory_kib": 19456, "iterations": 0, "parallelism": 1 } }"#,
        r#"{ "key_backend": "pkcs11" }"#,
        r#"not json"#,
    ];
    for json in cases {
        let err = LockboxConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)), "{json}: {err:?}");
    }
}

#[test]
fn durations() {
    let config = LockboxConfig::default();
    assert_eq!(config.rotation_window(), chrono::Duration::days(90));
    assert_eq!(config.rotation_interval(), std::time::Duration::from_secs(3600));
}

#[test]
fn tracing_init_is_idempotent() {
    lockbox_engine::telemetry::init_tracing("lockbox_engine=debug");
    assert!(!lockbox_engine::telemetry::init_tracing("info"));
}
