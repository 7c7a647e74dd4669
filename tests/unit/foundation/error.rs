use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        CraftError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(CraftError::config("x").to_string().contains("config error:"));
    assert!(CraftError::storage("x").to_string().contains("storage error:"));
    assert!(
        CraftError::composition("x")
            .to_string()
            .contains("composition error:")
    );
    assert!(
        CraftError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = CraftError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn only_storage_and_config_are_run_fatal() {
    assert!(CraftError::storage("disk full").is_run_fatal());
    assert!(CraftError::config("bad").is_run_fatal());
    assert!(!CraftError::validation("empty id").is_run_fatal());
    assert!(!CraftError::composition("resize").is_run_fatal());
    assert!(!CraftError::Overlay(OverlayError::EmptyText).is_run_fatal());
}
