#![allow(dead_code)]

use scenario_harness::config::HarnessConfig;
use scenario_harness::engine::action::Action;
use scenario_harness::engine::assertion::Assertion;
use scenario_harness::model::state::{PageStateName, StateModel};
use scenario_harness::model::storefront::{
    PASSWORD_SECRET, STANDARD_USER, elements::*, storefront_model,
};
use scenario_harness::page::storefront::StorefrontSim;
use scenario_harness::scenario::scenario_model::Scenario;

pub const BASE_URL: &str = "https://shop.test";

/// Short timeouts so failing paths finish in well under a second.
pub fn fast_config() -> HarnessConfig {
    HarnessConfig::default()
        .with_base_url(BASE_URL)
        .with_timeout_ms(250)
        .with_poll_interval_ms(5)
}

/// Generous timeout for scenarios that are expected to pass.
pub fn passing_config() -> HarnessConfig {
    fast_config().with_timeout_ms(2000)
}

pub fn model() -> StateModel {
    storefront_model().expect("storefront model is valid")
}

pub fn sim() -> StorefrontSim {
    StorefrontSim::new(BASE_URL)
}

/// Fresh login-page scenario.
pub fn on_login(name: &str) -> Scenario {
    Scenario::new(name, PageStateName::Login).starting_at("/")
}

/// Scenario that signs in as the standard user (4 steps).
pub fn signed_in(name: &str) -> Scenario {
    on_login(name)
        .step(Action::Type(USERNAME, STANDARD_USER.into()))
        .step(Action::Type(PASSWORD, PASSWORD_SECRET.into()))
        .step(Action::Click(LOGIN_BUTTON))
        .step(Assertion::UrlIncludes("/inventory.html".into()))
}

pub fn scenarios_dir() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios")
}
