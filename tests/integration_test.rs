//! Live tests against a real Snowflake account.
//!
//! These tests:
//! 1. Provision the warehouse objects (idempotent)
//! 2. Run the country and region pipelines from files already in the stage
//! 3. Check the target tables and the shared sequence
//!
//! Run with:
//! ```sh
//! DWH_TEST_ACCOUNT=xy12345 DWH_TEST_USER=etl DWH_TEST_PASSWORD=<token> \
//!     DWH_TEST_DATABASE=RETAIL_DWH_TEST cargo test --test integration_test -- --ignored
//! ```

use retail_dwh::config::Config;
use retail_dwh::filter::resolve_entities;
use retail_dwh::pipeline::{provision, run_pipelines, verify_stage};
use retail_dwh::sql::CreateMode;
use retail_dwh::ui::SilentUi;
use retail_dwh::warehouse::{SnowflakeClient, Warehouse};

/// Build a config from `DWH_TEST_*` variables so a developer's real
/// `DWH_*` settings are never used by accident.
fn test_config() -> Config {
    let mut config = Config::default();
    config.apply_env(|key| {
        let name = key.replacen("DWH_", "DWH_TEST_", 1);
        std::env::var(name).ok()
    });
    assert!(
        config.connection.account.is_some(),
        "DWH_TEST_ACCOUNT must be set to run the live tests"
    );
    config.journal.enabled = false;
    config
}

fn count(client: &mut SnowflakeClient, sql: &str) -> u64 {
    let result = client.execute(sql).unwrap();
    result.rows[0][0].as_deref().unwrap().parse().unwrap()
}

#[test]
#[ignore]
fn test_check_connection() {
    let config = test_config();
    let mut client = SnowflakeClient::connect(&config.connection).unwrap();

    let result = client.execute("SELECT CURRENT_VERSION()").unwrap();
    assert_eq!(result.rows.len(), 1);
    assert!(result.rows[0][0].is_some());
}

#[test]
#[ignore]
fn test_load_country_and_region() {
    let config = test_config();
    let mut client = SnowflakeClient::connect(&config.connection).unwrap();
    let mut ui = SilentUi::new();
    let entities = resolve_entities(Some(vec!["region".into()]), None).unwrap();

    provision(&mut client, &config, &entities, CreateMode::IfNotExists, None, &mut ui).unwrap();
    verify_stage(&mut client, &config, &entities, &mut ui).unwrap();

    let summary = run_pipelines(&mut client, &config, &entities, None, &mut ui).unwrap();
    assert_eq!(summary.entities.len(), 2);
    assert!(summary.rows_loaded() > 0);

    let layout = &config.layout;
    let country = entities[0];
    let region = entities[1];

    // every region row resolved its country
    let orphans = count(
        &mut client,
        &format!(
            "SELECT COUNT(*) FROM {} WHERE country_key IS NULL",
            layout.target_table(region)
        ),
    );
    assert_eq!(orphans, 0);

    // keys are unique across both tables since they share one sequence
    let overlap = count(
        &mut client,
        &format!(
            "SELECT COUNT(*) FROM {} c JOIN {} r ON c.{} = r.{}",
            layout.target_table(country),
            layout.target_table(region),
            country.surrogate_key,
            region.surrogate_key
        ),
    );
    assert_eq!(overlap, 0);

    // a second run reuses the sequence instead of recreating it
    let before = count(
        &mut client,
        &format!(
            "SELECT MAX({}) FROM {}",
            region.surrogate_key,
            layout.target_table(region)
        ),
    );
    run_pipelines(&mut client, &config, &entities, None, &mut ui).unwrap();
    let min_after = count(
        &mut client,
        &format!(
            "SELECT MIN({}) FROM {}",
            country.surrogate_key,
            layout.target_table(country)
        ),
    );
    assert!(min_after > before);
}
