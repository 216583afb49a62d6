//! Tests for dispatcher wiring.

use super::*;
use sd_webhook_api::Secret;
use sd_webhook_core::RequestTypeId;

fn config_with_cache(dir: &tempfile::TempDir) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.service_desk.bot_name = "automation".to_string();
    config.service_desk.bot_password = Some(Secret::new("pw"));
    config.custom_fields.cache_file = Some(dir.path().join("custom_fields.json"));
    config
}

#[tokio::test]
async fn test_build_dispatcher_uses_compiled_in_handlers() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_cache(&dir);

    let dispatcher = build_dispatcher(&config).await.unwrap();
    let locator = dispatcher.locator();

    assert_eq!(
        locator.locate(Some(&RequestTypeId::new("206"))).as_deref(),
        Some(handlers::EXAMPLE)
    );
    assert_eq!(locator.locate(Some(&RequestTypeId::new("999"))), None);
}

#[tokio::test]
async fn test_build_dispatcher_applies_table_and_settings() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_with_cache(&dir);
    config
        .handlers
        .insert("*".to_string(), handlers::HOOK_LOGGER.to_string());
    config.dispatch.decline_anonymous = false;
    config.dispatch.decline_status = "Rejected".to_string();

    let dispatcher = build_dispatcher(&config).await.unwrap();

    assert_eq!(
        dispatcher
            .locator()
            .locate(Some(&RequestTypeId::new("999")))
            .as_deref(),
        Some(handlers::HOOK_LOGGER)
    );
    assert!(!dispatcher.settings().decline_anonymous);
    assert_eq!(dispatcher.settings().decline_status, "Rejected");
}

#[tokio::test]
async fn test_build_dispatcher_without_cache_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_with_cache(&dir);
    config.custom_fields.cache_file = None;

    assert!(build_dispatcher(&config).await.is_ok());
}
