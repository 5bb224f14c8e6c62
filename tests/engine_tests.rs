use std::time::Duration;

use scenario_harness::config::HarnessConfig;
use scenario_harness::engine::action::{Action, ActionExecutor};
use scenario_harness::engine::assertion::{Assertion, AssertionEngine};
use scenario_harness::engine::locator::{ElementLocator, Scope};
use scenario_harness::engine::poll::{PollConfig, PollOutcome, Probe, poll_until};
use scenario_harness::error::{HarnessError, PageError};
use scenario_harness::model::state::{PageStateName, StateModel};
use scenario_harness::model::storefront::{PASSWORD_SECRET, STANDARD_USER, elements::*};
use scenario_harness::page::context::{NodeId, NodeSnapshot, PageContext};
use scenario_harness::page::storefront::{MSG_USERNAME_REQUIRED, StorefrontSim};

mod common;

use common::{BASE_URL, fast_config, model, sim};

fn poll(config: &HarnessConfig) -> PollConfig {
    PollConfig::from_config(config)
}

fn click(ctx: &mut dyn PageContext, selector: &str) {
    let node = ctx.query(selector).unwrap()[0].node;
    ctx.click(node).unwrap();
}

fn type_into(ctx: &mut dyn PageContext, selector: &str, text: &str) {
    let node = ctx.query(selector).unwrap()[0].node;
    ctx.type_text(node, text).unwrap();
}

/// Drive the simulator straight to the inventory page.
fn signed_in_sim() -> StorefrontSim {
    let mut ctx = sim();
    ctx.reset().unwrap();
    ctx.navigate(&format!("{BASE_URL}/")).unwrap();
    type_into(&mut ctx, USERNAME.selector, STANDARD_USER);
    type_into(&mut ctx, PASSWORD.selector, PASSWORD_SECRET);
    click(&mut ctx, LOGIN_BUTTON.selector);
    ctx
}

fn check(
    model: &StateModel,
    state: PageStateName,
    assertion: Assertion,
    ctx: &mut dyn PageContext,
) -> Result<String, HarnessError> {
    let engine = AssertionEngine::new(poll(&fast_config()));
    engine
        .check(&assertion, &Scope::new(model, state), ctx)
        .map(|pass| pass.observed)
}

/// Wraps a context and reports the first `stale_clicks` clicks as detached.
struct StaleClicks<C> {
    inner: C,
    stale_clicks: u32,
    clicks_sent: u32,
}

impl<C: PageContext> PageContext for StaleClicks<C> {
    fn reset(&mut self) -> Result<(), PageError> {
        self.inner.reset()
    }
    fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        self.inner.navigate(url)
    }
    fn current_url(&mut self) -> Result<String, PageError> {
        self.inner.current_url()
    }
    fn query(&mut self, selector: &str) -> Result<Vec<NodeSnapshot>, PageError> {
        self.inner.query(selector)
    }
    fn inspect(&mut self, node: NodeId) -> Result<Option<NodeSnapshot>, PageError> {
        self.inner.inspect(node)
    }
    fn type_text(&mut self, node: NodeId, text: &str) -> Result<(), PageError> {
        self.inner.type_text(node, text)
    }
    fn click(&mut self, node: NodeId) -> Result<(), PageError> {
        if self.stale_clicks > 0 {
            self.stale_clicks -= 1;
            return Err(PageError::StaleNode(node));
        }
        self.clicks_sent += 1;
        self.inner.click(node)
    }
}

/// Wraps a context and rewrites the text of nodes matching `selector`;
/// `text_at` maps the read count to the text served.
struct ScriptedText<C> {
    inner: C,
    selector: &'static str,
    text_at: fn(usize) -> &'static str,
    reads: usize,
}

impl<C: PageContext> PageContext for ScriptedText<C> {
    fn reset(&mut self) -> Result<(), PageError> {
        self.inner.reset()
    }
    fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        self.inner.navigate(url)
    }
    fn current_url(&mut self) -> Result<String, PageError> {
        self.inner.current_url()
    }
    fn query(&mut self, selector: &str) -> Result<Vec<NodeSnapshot>, PageError> {
        let mut nodes = self.inner.query(selector)?;
        if selector == self.selector {
            let text = (self.text_at)(self.reads);
            self.reads += 1;
            for node in &mut nodes {
                node.text = text.to_string();
            }
        }
        Ok(nodes)
    }
    fn inspect(&mut self, node: NodeId) -> Result<Option<NodeSnapshot>, PageError> {
        self.inner.inspect(node)
    }
    fn type_text(&mut self, node: NodeId, text: &str) -> Result<(), PageError> {
        self.inner.type_text(node, text)
    }
    fn click(&mut self, node: NodeId) -> Result<(), PageError> {
        self.inner.click(node)
    }
}

// ============================================================================
// Polling
// ============================================================================

#[test]
fn poll_returns_on_first_ready_probe() {
    let config = PollConfig::new(Duration::from_millis(100), Duration::from_millis(5));
    let outcome = poll_until(config, || Ok::<_, PageError>(Probe::<_, ()>::Ready(42))).unwrap();
    match outcome {
        PollOutcome::Ready { value, attempts, .. } => {
            assert_eq!(value, 42);
            assert_eq!(attempts, 1);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn poll_expires_with_last_observation() {
    let config = PollConfig::new(Duration::from_millis(40), Duration::from_millis(5));
    let mut seen = 0u32;
    let outcome = poll_until(config, || {
        seen += 1;
        Ok::<_, PageError>(Probe::<(), _>::Pending(seen))
    })
    .unwrap();
    match outcome {
        PollOutcome::Expired { last, elapsed, attempts } => {
            assert!(attempts > 1);
            assert_eq!(last, Some(attempts));
            assert!(elapsed >= Duration::from_millis(40));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn poll_treats_stale_node_as_pending() {
    let config = PollConfig::new(Duration::from_millis(200), Duration::from_millis(1));
    let mut calls = 0;
    let outcome = poll_until(config, || {
        calls += 1;
        if calls == 1 {
            Err(PageError::StaleNode(NodeId(7)))
        } else {
            Ok(Probe::<_, ()>::Ready("fresh"))
        }
    })
    .unwrap();
    assert!(matches!(outcome, PollOutcome::Ready { attempts: 2, .. }));
}

#[test]
fn poll_stops_on_context_loss() {
    let config = PollConfig::new(Duration::from_secs(5), Duration::from_millis(1));
    let mut calls = 0;
    let result = poll_until(config, || {
        calls += 1;
        Err::<Probe<(), ()>, _>(PageError::ContextLost("gone".into()))
    });
    assert!(matches!(result, Err(PageError::ContextLost(_))));
    assert_eq!(calls, 1);
}

// ============================================================================
// Element Locator
// ============================================================================

#[test]
fn resolving_twice_gives_the_same_node() {
    let model = model();
    let mut ctx = sim();
    ctx.reset().unwrap();
    let locator = ElementLocator::new(poll(&fast_config()));
    let scope = Scope::new(&model, PageStateName::Login);

    let first = locator.resolve(&USERNAME, &scope, &mut ctx).unwrap();
    let second = locator.resolve(&USERNAME, &scope, &mut ctx).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.element, USERNAME);
}

#[test]
fn unknown_element_fails_before_touching_the_page() {
    let model = model();
    // Any provider call would report the context as lost
    let mut ctx = sim().with_context_loss_after(0);
    let locator = ElementLocator::new(poll(&fast_config()));
    let scope = Scope::new(&model, PageStateName::Login);

    let err = locator.resolve(&FINISH_BUTTON, &scope, &mut ctx).unwrap_err();
    assert!(matches!(err, HarnessError::UnknownElement { .. }), "{err:?}");
}

#[test]
fn missing_element_times_out_as_not_found() {
    let model = model();
    let mut ctx = signed_in_sim();
    let locator = ElementLocator::new(poll(&fast_config()));
    let scope = Scope::new(&model, PageStateName::Inventory);

    let err = locator.resolve(&CART_BADGE, &scope, &mut ctx).unwrap_err();
    assert!(err.is_timeout());
    match err {
        HarnessError::NotFound { selector, waited, .. } => {
            assert_eq!(selector, ".shopping_cart_badge");
            assert!(waited >= Duration::from_millis(250));
        }
        other => panic!("unexpected {other:?}"),
    }
}

// ============================================================================
// Action Executor
// ============================================================================

#[test]
fn typing_and_clicking_drive_the_page() {
    let model = model();
    let mut ctx = sim();
    ctx.reset().unwrap();
    let executor = ActionExecutor::new(&fast_config());
    let scope = Scope::new(&model, PageStateName::Login);

    executor
        .execute(&Action::Type(USERNAME, STANDARD_USER.into()), &scope, &mut ctx)
        .unwrap();
    executor
        .execute(&Action::Type(PASSWORD, PASSWORD_SECRET.into()), &scope, &mut ctx)
        .unwrap();
    executor
        .execute(&Action::Click(LOGIN_BUTTON), &scope, &mut ctx)
        .unwrap();

    assert_eq!(ctx.signed_in_user(), Some(STANDARD_USER));
    assert_eq!(ctx.current_url().unwrap(), format!("{BASE_URL}/inventory.html"));
}

#[test]
fn navigate_joins_paths_onto_the_base_url() {
    let model = model();
    let mut ctx = signed_in_sim();
    let executor = ActionExecutor::new(&fast_config());
    let scope = Scope::new(&model, PageStateName::Inventory);

    executor
        .execute(&Action::Navigate("/cart.html".into()), &scope, &mut ctx)
        .unwrap();
    assert_eq!(ctx.current_url().unwrap(), format!("{BASE_URL}/cart.html"));
}

#[test]
fn hidden_element_is_not_interactable() {
    let model = model();
    let mut ctx = signed_in_sim();
    let executor = ActionExecutor::new(&fast_config());
    let scope = Scope::new(&model, PageStateName::Inventory);

    let err = executor
        .execute(&Action::Click(LOGOUT_LINK), &scope, &mut ctx)
        .unwrap_err();
    assert!(err.is_timeout());
    match err {
        HarnessError::NotInteractable { visible, enabled, .. } => {
            assert!(!visible);
            assert!(enabled);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn opened_menu_makes_logout_clickable() {
    let model = model();
    let mut ctx = signed_in_sim();
    let executor = ActionExecutor::new(&fast_config());
    let scope = Scope::new(&model, PageStateName::Inventory);

    executor.execute(&Action::Click(MENU_BUTTON), &scope, &mut ctx).unwrap();
    executor.execute(&Action::Click(LOGOUT_LINK), &scope, &mut ctx).unwrap();
    assert_eq!(ctx.signed_in_user(), None);
}

#[test]
fn detached_node_is_resolved_again() {
    let model = model();
    let mut ctx = StaleClicks {
        inner: signed_in_sim(),
        stale_clicks: 1,
        clicks_sent: 0,
    };
    let executor = ActionExecutor::new(&fast_config());
    let scope = Scope::new(&model, PageStateName::Inventory);

    executor.execute(&Action::Click(ADD_BACKPACK), &scope, &mut ctx).unwrap();
    assert_eq!(ctx.clicks_sent, 1);
    assert_eq!(ctx.inner.cart_len(), 1);
}

#[test]
fn repeated_detaches_are_retried_within_the_timeout() {
    let model = model();
    let mut ctx = StaleClicks {
        inner: signed_in_sim(),
        stale_clicks: 5,
        clicks_sent: 0,
    };
    let executor = ActionExecutor::new(&fast_config());
    let scope = Scope::new(&model, PageStateName::Inventory);

    executor.execute(&Action::Click(ADD_BACKPACK), &scope, &mut ctx).unwrap();
    assert_eq!(ctx.stale_clicks, 0);
    assert_eq!(ctx.clicks_sent, 1);
    assert_eq!(ctx.inner.cart_len(), 1);
}

#[test]
fn node_that_never_stays_attached_times_out() {
    let model = model();
    let mut ctx = StaleClicks {
        inner: signed_in_sim(),
        stale_clicks: u32::MAX,
        clicks_sent: 0,
    };
    let executor = ActionExecutor::new(&fast_config());
    let scope = Scope::new(&model, PageStateName::Inventory);

    let err = executor
        .execute(&Action::Click(ADD_BACKPACK), &scope, &mut ctx)
        .unwrap_err();
    assert!(err.is_timeout(), "{err:?}");
    match err {
        HarnessError::NotInteractable { waited, .. } => {
            assert!(waited >= Duration::from_millis(250));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(ctx.clicks_sent, 0);
    assert_eq!(ctx.inner.cart_len(), 0);
}

#[test]
fn element_shared_across_pages_is_clicked_once_settled() {
    let model = model();
    let mut ctx = signed_in_sim().with_settle_reads(3);
    let executor = ActionExecutor::new(&fast_config());
    let inventory = Scope::new(&model, PageStateName::Inventory);
    let cart = Scope::new(&model, PageStateName::Cart);

    executor.execute(&Action::Click(ADD_BACKPACK), &inventory, &mut ctx).unwrap();
    check(&model, PageStateName::Inventory, Assertion::Exists(REMOVE_BACKPACK), &mut ctx).unwrap();
    executor.execute(&Action::Click(CART_LINK), &inventory, &mut ctx).unwrap();
    // The inventory render still shows the remove button while the cart loads
    executor.execute(&Action::Click(REMOVE_BACKPACK), &cart, &mut ctx).unwrap();

    assert_eq!(ctx.cart_len(), 0);
    assert_eq!(ctx.current_url().unwrap(), format!("{BASE_URL}/cart.html"));
}

// ============================================================================
// Assertion Engine
// ============================================================================

#[test]
fn text_equals_waits_for_settled_text() {
    let model = model();
    let mut ctx = sim().with_settle_reads(3);
    ctx.reset().unwrap();
    type_into(&mut ctx, USERNAME.selector, STANDARD_USER);
    type_into(&mut ctx, PASSWORD.selector, PASSWORD_SECRET);
    click(&mut ctx, LOGIN_BUTTON.selector);

    let observed = check(
        &model,
        PageStateName::Inventory,
        Assertion::TextEquals(TITLE, "Products".into()),
        &mut ctx,
    )
    .unwrap();
    assert_eq!(observed, "Products");
}

#[test]
fn flickering_text_never_passes() {
    let model = model();
    let mut ctx = ScriptedText {
        inner: signed_in_sim(),
        selector: TITLE.selector,
        text_at: |read| if read % 2 == 0 { "X" } else { "Y" },
        reads: 0,
    };

    let err = check(
        &model,
        PageStateName::Inventory,
        Assertion::TextEquals(TITLE, "X".into()),
        &mut ctx,
    )
    .unwrap_err();
    match err {
        HarnessError::AssertionMismatch { expected, actual, .. } => {
            assert_eq!(expected, "X");
            assert!(matches!(actual.as_deref(), Some("X") | Some("Y")), "{actual:?}");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(ctx.reads > 2);
}

#[test]
fn text_passes_after_two_matching_reads() {
    let model = model();
    let mut ctx = ScriptedText {
        inner: signed_in_sim(),
        selector: TITLE.selector,
        text_at: |read| match read {
            0 => "X",
            1 => "Y",
            _ => "X",
        },
        reads: 0,
    };

    let observed = check(
        &model,
        PageStateName::Inventory,
        Assertion::TextEquals(TITLE, "X".into()),
        &mut ctx,
    )
    .unwrap();
    assert_eq!(observed, "X");
    assert_eq!(ctx.reads, 4);
}

#[test]
fn zero_timeout_still_confirms_stable_text() {
    let model = model();
    let mut ctx = signed_in_sim();
    let engine = AssertionEngine::new(PollConfig::new(Duration::ZERO, Duration::from_millis(5)));

    let pass = engine
        .check(
            &Assertion::TextEquals(TITLE, "Products".into()),
            &Scope::new(&model, PageStateName::Inventory),
            &mut ctx,
        )
        .unwrap();
    assert_eq!(pass.observed, "Products");
}

#[test]
fn text_equals_reports_expected_and_observed() {
    let model = model();
    let mut ctx = sim();
    ctx.reset().unwrap();
    click(&mut ctx, LOGIN_BUTTON.selector);

    let err = check(
        &model,
        PageStateName::Login,
        Assertion::TextEquals(ERROR_BANNER, "X".into()),
        &mut ctx,
    )
    .unwrap_err();
    match err {
        HarnessError::AssertionMismatch { expected, actual, waited, .. } => {
            assert_eq!(expected, "X");
            assert_eq!(actual.as_deref(), Some(MSG_USERNAME_REQUIRED));
            assert!(waited >= Duration::from_millis(250));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn text_equals_on_absent_element_reports_absent() {
    let model = model();
    let mut ctx = sim();
    ctx.reset().unwrap();

    let err = check(
        &model,
        PageStateName::Login,
        Assertion::TextEquals(ERROR_BANNER, MSG_USERNAME_REQUIRED.into()),
        &mut ctx,
    )
    .unwrap_err();
    assert!(matches!(err, HarnessError::AssertionMismatch { actual: None, .. }));
    assert!(err.to_string().contains("<absent>"), "{err}");
}

#[test]
fn hidden_node_still_exists() {
    let model = model();
    let mut ctx = signed_in_sim();

    check(&model, PageStateName::Inventory, Assertion::Exists(LOGOUT_LINK), &mut ctx).unwrap();
    let err = check(&model, PageStateName::Inventory, Assertion::NotExists(LOGOUT_LINK), &mut ctx)
        .unwrap_err();
    match err {
        HarnessError::AssertionMismatch { expected, actual, .. } => {
            assert_eq!(expected, "0");
            assert_eq!(actual.as_deref(), Some("1"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn count_and_absence_follow_the_cart() {
    let model = model();
    let mut ctx = signed_in_sim();
    check(&model, PageStateName::Inventory, Assertion::NotExists(CART_BADGE), &mut ctx).unwrap();

    click(&mut ctx, ADD_BACKPACK.selector);
    click(&mut ctx, CART_LINK.selector);
    let observed =
        check(&model, PageStateName::Cart, Assertion::CountEquals(CART_ITEM, 1), &mut ctx).unwrap();
    assert_eq!(observed, "1");

    click(&mut ctx, REMOVE_BACKPACK.selector);
    check(&model, PageStateName::Cart, Assertion::NotExists(CART_ITEM), &mut ctx).unwrap();
}

#[test]
fn url_checks_compare_the_full_location() {
    let model = model();
    let mut ctx = signed_in_sim();

    check(
        &model,
        PageStateName::Inventory,
        Assertion::UrlIncludes("/inventory.html".into()),
        &mut ctx,
    )
    .unwrap();
    check(
        &model,
        PageStateName::Inventory,
        Assertion::UrlEquals(format!("{BASE_URL}/inventory.html")),
        &mut ctx,
    )
    .unwrap();
    let err = check(
        &model,
        PageStateName::Inventory,
        Assertion::UrlEquals(format!("{BASE_URL}/")),
        &mut ctx,
    )
    .unwrap_err();
    assert!(matches!(err, HarnessError::AssertionMismatch { .. }));
}

#[test]
fn assertion_on_foreign_element_is_unknown() {
    let model = model();
    let mut ctx = sim();
    ctx.reset().unwrap();
    let err = check(&model, PageStateName::Login, Assertion::Exists(CART_BADGE), &mut ctx)
        .unwrap_err();
    assert!(matches!(err, HarnessError::UnknownElement { .. }));
}
