use scenario_harness::engine::action::Action;
use scenario_harness::error::HarnessError;
use scenario_harness::model::element::ElementRef;
use scenario_harness::model::state::{
    Effect, Guard, ModelState, PageState, PageStateName, StateModel, TransitionOutcome,
};
use scenario_harness::model::storefront::{
    LOCKED_OUT_USER, PASSWORD_SECRET, STANDARD_USER, credential_policy, elements::*,
};

mod common;

use common::model;

fn typed(state: &mut ModelState, model: &StateModel, element: ElementRef, text: &str) {
    let action = Action::Type(element, text.to_string());
    let outcome = model.transition(state, &action);
    state.advance(&action, &outcome);
}

fn login_state(username: &str, password: &str) -> (StateModel, ModelState) {
    let model = model();
    let mut state = ModelState::new(PageStateName::Login);
    if !username.is_empty() {
        typed(&mut state, &model, USERNAME, username);
    }
    if !password.is_empty() {
        typed(&mut state, &model, PASSWORD, password);
    }
    (model, state)
}

fn config_message(err: HarnessError) -> String {
    match err {
        HarnessError::Configuration(msg) => msg,
        other => panic!("expected configuration error, got {other:?}"),
    }
}

// ============================================================================
// Storefront model
// ============================================================================

#[test]
fn storefront_model_declares_every_page() {
    let model = model();
    for name in PageStateName::ALL {
        assert!(model.state(name).is_some(), "{name} missing");
    }
    assert_eq!(model.states().count(), 6);
}

#[test]
fn header_elements_are_on_every_signed_in_page() {
    let model = model();
    for name in PageStateName::ALL.into_iter().filter(|n| *n != PageStateName::Login) {
        for element in [TITLE, CART_BADGE, CART_LINK, MENU_BUTTON, LOGOUT_LINK] {
            assert!(model.check_element(name, &element).is_ok(), "{} on {name}", element.name);
        }
    }
}

#[test]
fn element_outside_current_map_is_unknown() {
    let err = model()
        .check_element(PageStateName::Login, &FINISH_BUTTON)
        .unwrap_err();
    match err {
        HarnessError::UnknownElement { element, state } => {
            assert_eq!(element, "finish_button");
            assert_eq!(state, PageStateName::Login);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn elements_are_found_by_stable_name() {
    let model = model();
    assert_eq!(model.element_named("postal_code"), Some(POSTAL_CODE));
    assert_eq!(model.element_named("error_banner"), Some(ERROR_BANNER));
    assert_eq!(model.element_named("no_such_thing"), None);
}

#[test]
fn page_state_names_parse_from_snake_case() {
    assert_eq!("checkout_info".parse::<PageStateName>().unwrap(), PageStateName::CheckoutInfo);
    assert_eq!(PageStateName::CheckoutComplete.to_string(), "checkout_complete");
    assert!("checkout".parse::<PageStateName>().is_err());
}

// ============================================================================
// Transitions
// ============================================================================

#[test]
fn valid_login_moves_to_inventory() {
    let (model, state) = login_state(STANDARD_USER, PASSWORD_SECRET);
    let outcome = model.transition(&state, &Action::Click(LOGIN_BUTTON));
    assert_eq!(
        outcome,
        TransitionOutcome::Moved {
            to: PageStateName::Inventory,
            effect: Effect::SignIn
        }
    );
}

#[test]
fn invalid_login_stays_with_error_banner() {
    for (user, password) in [
        ("", ""),
        (STANDARD_USER, ""),
        (STANDARD_USER, "wrong_password"),
        ("invalid_user", PASSWORD_SECRET),
        (LOCKED_OUT_USER, PASSWORD_SECRET),
    ] {
        let (model, state) = login_state(user, password);
        let outcome = model.transition(&state, &Action::Click(LOGIN_BUTTON));
        assert_eq!(
            outcome,
            TransitionOutcome::Unchanged {
                error_banner_present: true
            },
            "user={user:?} password={password:?}"
        );
    }
}

#[test]
fn advance_applies_sign_in_and_clears_inputs() {
    let (model, mut state) = login_state(STANDARD_USER, PASSWORD_SECRET);
    assert_eq!(state.input(&USERNAME), STANDARD_USER);

    let click = Action::Click(LOGIN_BUTTON);
    let outcome = model.transition(&state, &click);
    state.advance(&click, &outcome);

    assert_eq!(state.current, PageStateName::Inventory);
    assert!(state.authenticated);
    assert!(state.inputs.is_empty());
    assert!(!state.error_banner_present);
}

#[test]
fn typing_keeps_page_and_accumulates_text() {
    let model = model();
    let mut state = ModelState::new(PageStateName::Login);
    typed(&mut state, &model, USERNAME, "standard");
    typed(&mut state, &model, USERNAME, "_user");
    assert_eq!(state.current, PageStateName::Login);
    assert_eq!(state.input(&USERNAME), "standard_user");
}

#[test]
fn checkout_continue_requires_every_field() {
    let model = model();
    let mut state = ModelState::new(PageStateName::CheckoutInfo);
    typed(&mut state, &model, LAST_NAME, "Doe");
    typed(&mut state, &model, POSTAL_CODE, "12345");
    assert_eq!(
        model.transition(&state, &Action::Click(CONTINUE_BUTTON)),
        TransitionOutcome::Unchanged {
            error_banner_present: true
        }
    );

    typed(&mut state, &model, FIRST_NAME, "John");
    assert!(matches!(
        model.transition(&state, &Action::Click(CONTINUE_BUTTON)),
        TransitionOutcome::Moved {
            to: PageStateName::CheckoutOverview,
            ..
        }
    ));
}

#[test]
fn postal_code_format_is_not_checked() {
    let model = model();
    let mut state = ModelState::new(PageStateName::CheckoutInfo);
    typed(&mut state, &model, FIRST_NAME, "John");
    typed(&mut state, &model, LAST_NAME, "Doe");
    typed(&mut state, &model, POSTAL_CODE, "ABCDE");
    assert!(matches!(
        model.transition(&state, &Action::Click(CONTINUE_BUTTON)),
        TransitionOutcome::Moved { .. }
    ));
}

#[test]
fn click_without_rule_leaves_page_unchanged() {
    let model = model();
    let state = ModelState::new(PageStateName::Inventory);
    assert_eq!(
        model.transition(&state, &Action::Click(ADD_BACKPACK)),
        TransitionOutcome::Unchanged {
            error_banner_present: false
        }
    );
}

#[test]
fn cancel_depends_on_the_checkout_step() {
    let model = model();
    let info = ModelState::new(PageStateName::CheckoutInfo);
    let overview = ModelState::new(PageStateName::CheckoutOverview);
    assert!(matches!(
        model.transition(&info, &Action::Click(CANCEL_BUTTON)),
        TransitionOutcome::Moved { to: PageStateName::Cart, .. }
    ));
    assert!(matches!(
        model.transition(&overview, &Action::Click(CANCEL_BUTTON)),
        TransitionOutcome::Moved { to: PageStateName::Inventory, .. }
    ));
}

#[test]
fn logout_signs_out_from_any_signed_in_page() {
    let model = model();
    for page in [PageStateName::Inventory, PageStateName::Cart, PageStateName::CheckoutComplete] {
        let state = ModelState::new(page);
        assert_eq!(
            model.transition(&state, &Action::Click(LOGOUT_LINK)),
            TransitionOutcome::Moved {
                to: PageStateName::Login,
                effect: Effect::SignOut
            }
        );
    }
}

#[test]
fn protected_route_requires_sign_in() {
    let model = model();
    let logged_out = ModelState::new(PageStateName::Login);
    let signed_in = ModelState::new(PageStateName::Cart);
    let visit = Action::Navigate("/inventory.html".into());

    assert_eq!(
        model.transition(&logged_out, &visit),
        TransitionOutcome::Unchanged {
            error_banner_present: true
        }
    );
    assert!(matches!(
        model.transition(&signed_in, &visit),
        TransitionOutcome::Moved { to: PageStateName::Inventory, .. }
    ));
}

#[test]
fn routes_match_absolute_urls_and_ignore_query() {
    let model = model();
    let state = ModelState::new(PageStateName::Inventory);
    let visit = Action::Navigate("https://shop.test/cart.html?from=menu#top".into());
    assert!(matches!(
        model.transition(&state, &visit),
        TransitionOutcome::Moved { to: PageStateName::Cart, .. }
    ));
}

#[test]
fn undeclared_path_is_a_model_error() {
    let model = model();
    let state = ModelState::new(PageStateName::Inventory);
    let outcome = model.transition(&state, &Action::Navigate("/admin.html".into()));
    assert!(matches!(outcome, TransitionOutcome::Error(reason) if reason.contains("/admin.html")));
}

#[test]
fn credential_policy_rejects_locked_users() {
    let policy = credential_policy();
    assert!(policy.allows(STANDARD_USER, PASSWORD_SECRET));
    assert!(!policy.allows(LOCKED_OUT_USER, PASSWORD_SECRET));
    assert!(!policy.allows(STANDARD_USER, "secret"));
}

// ============================================================================
// Builder validation
// ============================================================================

#[test]
fn builder_rejects_empty_model() {
    let msg = config_message(StateModel::builder().build().unwrap_err());
    assert!(msg.contains("no states"), "{msg}");
}

#[test]
fn builder_rejects_duplicate_state() {
    let err = StateModel::builder()
        .state(PageState::new(PageStateName::Login, "/", &[USERNAME]))
        .state(PageState::new(PageStateName::Login, "/again", &[PASSWORD]))
        .build()
        .unwrap_err();
    assert!(config_message(err).contains("login"));
}

#[test]
fn builder_rejects_undeclared_target() {
    let err = StateModel::builder()
        .state(PageState::new(PageStateName::Login, "/", &[LOGIN_BUTTON]))
        .on_click(PageStateName::Login, LOGIN_BUTTON, PageStateName::Inventory)
        .build()
        .unwrap_err();
    assert!(config_message(err).contains("inventory"));
}

#[test]
fn builder_rejects_trigger_outside_source_map() {
    let err = StateModel::builder()
        .state(PageState::new(PageStateName::Login, "/", &[USERNAME]))
        .state(PageState::new(PageStateName::Inventory, "/inventory.html", &[TITLE]))
        .on_click(PageStateName::Login, LOGIN_BUTTON, PageStateName::Inventory)
        .build()
        .unwrap_err();
    assert!(config_message(err).contains("login_button"));
}

#[test]
fn builder_rejects_malformed_element_map() {
    let blank = ElementRef::new("blank", "", "Blank");
    let err = StateModel::builder()
        .state(PageState::new(PageStateName::Login, "/", &[blank]))
        .build()
        .unwrap_err();
    assert!(config_message(err).contains("blank"));

    let twin = ElementRef::new("username", "#other", "Other");
    let err = StateModel::builder()
        .state(PageState::new(PageStateName::Login, "/", &[USERNAME, twin]))
        .build()
        .unwrap_err();
    assert!(config_message(err).contains("username"));
}

#[test]
fn builder_rejects_guard_on_foreign_fields() {
    let err = StateModel::builder()
        .state(PageState::new(PageStateName::Login, "/", &[LOGIN_BUTTON]))
        .state(PageState::new(PageStateName::Inventory, "/inventory.html", &[TITLE]))
        .on_click_if(
            PageStateName::Login,
            LOGIN_BUTTON,
            Guard::FieldsFilled(vec![FIRST_NAME]),
            PageStateName::Inventory,
            Effect::None,
        )
        .build()
        .unwrap_err();
    assert!(config_message(err).contains("first_name"));
}
