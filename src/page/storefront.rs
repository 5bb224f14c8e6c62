//! In-memory storefront that behaves like the demo shop the scenarios were
//! written against. Deterministic: no clocks, no threads. Asynchronous
//! settling is modelled by serving a number of reads from the previous
//! render after every typed key sequence or click.

use std::collections::BTreeSet;

use crate::error::PageError;
use crate::model::storefront::{
    CART_PATH, CHECKOUT_COMPLETE_PATH, CHECKOUT_INFO_PATH, CHECKOUT_OVERVIEW_PATH,
    INVENTORY_PATH, LOCKED_OUT_USER, LOGIN_PATH, PASSWORD_SECRET, PERFORMANCE_GLITCH_USER,
    credential_policy,
};
use crate::page::context::{NodeId, NodeSnapshot, PageContext};

pub const MSG_USERNAME_REQUIRED: &str = "Epic sadface: Username is required";
pub const MSG_PASSWORD_REQUIRED: &str = "Epic sadface: Password is required";
pub const MSG_LOCKED_OUT: &str = "Epic sadface: Sorry, this user has been locked out.";
pub const MSG_NO_MATCH: &str =
    "Epic sadface: Username and password do not match any user in this service";
pub const MSG_FIRST_NAME_REQUIRED: &str = "Error: First Name is required";
pub const MSG_LAST_NAME_REQUIRED: &str = "Error: Last Name is required";
pub const MSG_POSTAL_CODE_REQUIRED: &str = "Error: Postal Code is required";
pub const ORDER_COMPLETE: &str = "Thank you for your order!";

/// Extra settle reads the slow account costs after logging in.
const GLITCH_SETTLE_READS: u32 = 5;

/// Products on the inventory page as (slug, display name).
pub const PRODUCTS: [(&str, &str); 3] = [
    ("sauce-labs-backpack", "Sauce Labs Backpack"),
    ("sauce-labs-bike-light", "Sauce Labs Bike Light"),
    ("sauce-labs-bolt-t-shirt", "Sauce Labs Bolt T-Shirt"),
];

// ============================================================================
// Rendered view
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Username,
    Password,
    FirstName,
    LastName,
    PostalCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Control {
    Login,
    AddToCart(&'static str),
    Remove(&'static str),
    CartLink,
    Menu,
    Logout,
    Checkout,
    ContinueShopping,
    Continue,
    Cancel,
    Finish,
    BackHome,
}

#[derive(Debug, Clone, PartialEq)]
enum NodeKind {
    Input(Field),
    Button(Control),
    Static,
}

#[derive(Debug, Clone, PartialEq)]
struct SimNode {
    id: NodeId,
    selectors: Vec<String>,
    text: String,
    visible: bool,
    enabled: bool,
    kind: NodeKind,
}

impl SimNode {
    fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            node: self.id,
            text: self.text.clone(),
            visible: self.visible,
            enabled: self.enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct View {
    url: String,
    nodes: Vec<SimNode>,
}

impl View {
    fn query(&self, selector: &str) -> Vec<NodeSnapshot> {
        self.nodes
            .iter()
            .filter(|n| n.selectors.iter().any(|s| s == selector))
            .map(SimNode::snapshot)
            .collect()
    }

    fn node(&self, id: NodeId) -> Option<&SimNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

// ============================================================================
// Application state
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Screen {
    Login,
    Inventory,
    Cart,
    CheckoutInfo,
    CheckoutOverview,
    CheckoutComplete,
    NotFound(String),
}

impl Screen {
    fn path(&self) -> &str {
        match self {
            Screen::Login => LOGIN_PATH,
            Screen::Inventory => INVENTORY_PATH,
            Screen::Cart => CART_PATH,
            Screen::CheckoutInfo => CHECKOUT_INFO_PATH,
            Screen::CheckoutOverview => CHECKOUT_OVERVIEW_PATH,
            Screen::CheckoutComplete => CHECKOUT_COMPLETE_PATH,
            Screen::NotFound(path) => path.as_str(),
        }
    }

    fn from_path(path: &str) -> Screen {
        match path {
            "" | LOGIN_PATH => Screen::Login,
            INVENTORY_PATH => Screen::Inventory,
            CART_PATH => Screen::Cart,
            CHECKOUT_INFO_PATH => Screen::CheckoutInfo,
            CHECKOUT_OVERVIEW_PATH => Screen::CheckoutOverview,
            CHECKOUT_COMPLETE_PATH => Screen::CheckoutComplete,
            other => Screen::NotFound(other.to_string()),
        }
    }

    fn requires_login(&self) -> bool {
        !matches!(self, Screen::Login | Screen::NotFound(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Inputs {
    username: String,
    password: String,
    first_name: String,
    last_name: String,
    postal_code: String,
}

impl Inputs {
    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Username => &mut self.username,
            Field::Password => &mut self.password,
            Field::FirstName => &mut self.first_name,
            Field::LastName => &mut self.last_name,
            Field::PostalCode => &mut self.postal_code,
        }
    }
}

/// Simulated storefront page context.
#[derive(Debug, Clone)]
pub struct StorefrontSim {
    base_url: String,
    screen: Screen,
    user: Option<String>,
    cart: BTreeSet<&'static str>,
    inputs: Inputs,
    error: Option<String>,
    menu_open: bool,
    generation: u64,
    settle_reads: u32,
    stale: Option<(View, u32)>,
    calls_until_loss: Option<u32>,
    lost: bool,
}

impl StorefrontSim {
    pub fn new(base_url: &str) -> Self {
        StorefrontSim {
            base_url: base_url.trim_end_matches('/').to_string(),
            screen: Screen::Login,
            user: None,
            cart: BTreeSet::new(),
            inputs: Inputs::default(),
            error: None,
            menu_open: false,
            generation: 1,
            settle_reads: 0,
            stale: None,
            calls_until_loss: None,
            lost: false,
        }
    }

    /// After every mutation, serve this many reads from the previous render.
    pub fn with_settle_reads(mut self, reads: u32) -> Self {
        self.settle_reads = reads;
        self
    }

    /// Lose the context after `calls` more provider calls.
    pub fn with_context_loss_after(mut self, calls: u32) -> Self {
        self.calls_until_loss = Some(calls);
        self
    }

    pub fn cart_len(&self) -> usize {
        self.cart.len()
    }

    pub fn signed_in_user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Count a provider call against the loss budget.
    fn tick(&mut self) -> Result<(), PageError> {
        if self.lost {
            return Err(PageError::ContextLost("storefront session closed".into()));
        }
        if let Some(remaining) = self.calls_until_loss.as_mut() {
            if *remaining == 0 {
                self.lost = true;
                return Err(PageError::ContextLost("storefront session closed".into()));
            }
            *remaining -= 1;
        }
        Ok(())
    }

    /// View a read should observe, consuming one stale read if pending.
    fn observed_view(&mut self) -> View {
        if let Some((view, remaining)) = self.stale.take() {
            if remaining > 1 {
                self.stale = Some((view.clone(), remaining - 1));
            }
            return view;
        }
        self.render()
    }

    /// Apply a mutation, keeping the pre-mutation render for settle reads.
    fn mutate<F: FnOnce(&mut Self)>(&mut self, apply: F) {
        let before = match self.stale.take() {
            Some((view, _)) => view,
            None => self.render(),
        };
        apply(self);
        if self.settle_reads > 0 {
            self.stale = Some((before, self.settle_reads));
        }
    }

    fn load(&mut self, screen: Screen) {
        self.screen = screen;
        self.generation += 1;
        self.inputs = Inputs::default();
        self.error = None;
        self.menu_open = false;
    }

    fn visit(&mut self, path: &str) {
        let screen = Screen::from_path(path);
        if screen.requires_login() && self.user.is_none() {
            let denied = screen.path().to_string();
            self.load(Screen::Login);
            self.error = Some(format!(
                "Epic sadface: You can only access '{}' when you are logged in.",
                denied
            ));
        } else {
            self.load(screen);
        }
    }

    fn path_of(&self, url: &str) -> Result<String, PageError> {
        if let Some(rest) = url.strip_prefix(&self.base_url) {
            let path = rest.split(['?', '#']).next().unwrap_or("");
            return Ok(if path.is_empty() { "/".into() } else { path.to_string() });
        }
        if url.starts_with('/') {
            return Ok(url.to_string());
        }
        Err(PageError::Protocol {
            command: "navigate".into(),
            error: format!("'{}' is outside {}", url, self.base_url),
        })
    }

    fn press(&mut self, control: Control) -> u32 {
        match control {
            Control::Login => return self.submit_login(),
            Control::AddToCart(slug) => {
                self.cart.insert(slug);
            }
            Control::Remove(slug) => {
                self.cart.remove(slug);
            }
            Control::CartLink => self.load(Screen::Cart),
            Control::Menu => self.menu_open = true,
            Control::Logout => {
                self.user = None;
                self.load(Screen::Login);
            }
            Control::Checkout => self.load(Screen::CheckoutInfo),
            Control::ContinueShopping => self.load(Screen::Inventory),
            Control::Continue => self.submit_checkout_info(),
            Control::Cancel => match self.screen {
                Screen::CheckoutInfo => self.load(Screen::Cart),
                _ => self.load(Screen::Inventory),
            },
            Control::Finish => {
                self.cart.clear();
                self.load(Screen::CheckoutComplete);
            }
            Control::BackHome => self.load(Screen::Inventory),
        }
        0
    }

    fn submit_login(&mut self) -> u32 {
        let username = self.inputs.username.clone();
        let password = self.inputs.password.clone();
        let policy = credential_policy();

        let error = if username.is_empty() {
            Some(MSG_USERNAME_REQUIRED)
        } else if password.is_empty() {
            Some(MSG_PASSWORD_REQUIRED)
        } else if username == LOCKED_OUT_USER && password == PASSWORD_SECRET {
            Some(MSG_LOCKED_OUT)
        } else if !policy.allows(&username, &password) {
            Some(MSG_NO_MATCH)
        } else {
            None
        };

        match error {
            Some(message) => {
                self.error = Some(message.to_string());
                0
            }
            None => {
                let slow = username == PERFORMANCE_GLITCH_USER;
                self.user = Some(username);
                self.load(Screen::Inventory);
                if slow { GLITCH_SETTLE_READS } else { 0 }
            }
        }
    }

    fn submit_checkout_info(&mut self) {
        // Only presence is checked, not the postal code format
        let error = if self.inputs.first_name.is_empty() {
            Some(MSG_FIRST_NAME_REQUIRED)
        } else if self.inputs.last_name.is_empty() {
            Some(MSG_LAST_NAME_REQUIRED)
        } else if self.inputs.postal_code.is_empty() {
            Some(MSG_POSTAL_CODE_REQUIRED)
        } else {
            None
        };
        match error {
            Some(message) => self.error = Some(message.to_string()),
            None => self.load(Screen::CheckoutOverview),
        }
    }

    // ------------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------------

    fn render(&self) -> View {
        let mut page = PageBuilder::new(self.generation);

        match &self.screen {
            Screen::Login => {
                page.input(Field::Username, &["#user-name", "[data-test=\"username\"]"]);
                page.input(Field::Password, &["#password", "[data-test=\"password\"]"]);
                page.button(Control::Login, &["#login-button", "[data-test=\"login-button\"]"], "Login");
            }
            Screen::Inventory => {
                self.header(&mut page, "Products");
                for (slug, name) in PRODUCTS {
                    page.text(&format!("item_name:{}", slug), &[".inventory_item_name"], name);
                    if self.cart.contains(slug) {
                        page.button(Control::Remove(slug), &[format!("#remove-{}", slug).as_str()], "Remove");
                    } else {
                        page.button(
                            Control::AddToCart(slug),
                            &[format!("#add-to-cart-{}", slug).as_str()],
                            "Add to cart",
                        );
                    }
                }
            }
            Screen::Cart => {
                self.header(&mut page, "Your Cart");
                self.cart_items(&mut page, true);
                page.button(Control::ContinueShopping, &["#continue-shopping"], "Continue Shopping");
                page.button(Control::Checkout, &["#checkout"], "Checkout");
            }
            Screen::CheckoutInfo => {
                self.header(&mut page, "Checkout: Your Information");
                page.input(Field::FirstName, &["#first-name", "[data-test=\"firstName\"]"]);
                page.input(Field::LastName, &["#last-name", "[data-test=\"lastName\"]"]);
                page.input(Field::PostalCode, &["#postal-code", "[data-test=\"postalCode\"]"]);
                page.button(Control::Cancel, &["#cancel"], "Cancel");
                page.button(Control::Continue, &["#continue"], "Continue");
            }
            Screen::CheckoutOverview => {
                self.header(&mut page, "Checkout: Overview");
                self.cart_items(&mut page, false);
                page.button(Control::Cancel, &["#cancel"], "Cancel");
                page.button(Control::Finish, &["#finish"], "Finish");
            }
            Screen::CheckoutComplete => {
                self.header(&mut page, "Checkout: Complete!");
                page.text("complete_header", &[".complete-header"], ORDER_COMPLETE);
                page.button(Control::BackHome, &["#back-to-products"], "Back Home");
            }
            Screen::NotFound(_) => {}
        }

        if let Some(error) = &self.error {
            page.text("error", &["[data-test=\"error\"]", ".error-message-container h3"], error);
        }

        View {
            url: self.url_for(self.screen.path()),
            nodes: page.nodes,
        }
    }

    fn header(&self, page: &mut PageBuilder, title: &str) {
        page.button(Control::Menu, &["#react-burger-menu-btn"], "Open Menu");
        page.push(
            "logout",
            &["#logout_sidebar_link"],
            "Logout",
            self.menu_open,
            NodeKind::Button(Control::Logout),
        );
        page.button(Control::CartLink, &[".shopping_cart_link"], "");
        if !self.cart.is_empty() {
            page.text("badge", &[".shopping_cart_badge"], &self.cart.len().to_string());
        }
        page.text("title", &[".title"], title);
    }

    fn cart_items(&self, page: &mut PageBuilder, removable: bool) {
        for (slug, name) in PRODUCTS {
            if !self.cart.contains(slug) {
                continue;
            }
            page.text(&format!("cart_item:{}", slug), &[".cart_item"], &format!("1 {}", name));
            if removable {
                page.button(Control::Remove(slug), &[format!("#remove-{}", slug).as_str()], "Remove");
            }
        }
    }
}

/// Collects nodes with ids stable for a key within one page load.
struct PageBuilder {
    generation: u64,
    nodes: Vec<SimNode>,
}

impl PageBuilder {
    fn new(generation: u64) -> Self {
        PageBuilder {
            generation,
            nodes: Vec::new(),
        }
    }

    fn push(&mut self, key: &str, selectors: &[&str], text: &str, visible: bool, kind: NodeKind) {
        self.nodes.push(SimNode {
            id: NodeId((self.generation << 32) | key_hash(key)),
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            text: text.to_string(),
            visible,
            enabled: true,
            kind,
        });
    }

    fn input(&mut self, field: Field, selectors: &[&str]) {
        self.push(&format!("{:?}", field), selectors, "", true, NodeKind::Input(field));
    }

    fn button(&mut self, control: Control, selectors: &[&str], text: &str) {
        self.push(&format!("{:?}", control), selectors, text, true, NodeKind::Button(control));
    }

    fn text(&mut self, key: &str, selectors: &[&str], text: &str) {
        self.push(key, selectors, text, true, NodeKind::Static);
    }
}

/// FNV-1a folded to 32 bits.
fn key_hash(key: &str) -> u64 {
    let hash = key
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ b as u64).wrapping_mul(0x0100_0000_01b3));
    (hash ^ (hash >> 32)) & 0xffff_ffff
}

// ============================================================================
// PageContext
// ============================================================================

impl PageContext for StorefrontSim {
    fn reset(&mut self) -> Result<(), PageError> {
        self.tick()?;
        self.user = None;
        self.cart.clear();
        self.stale = None;
        self.load(Screen::Login);
        Ok(())
    }

    fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        self.tick()?;
        let path = self.path_of(url)?;
        // Full loads are awaited by the driver; only in-page updates settle
        self.stale = None;
        self.visit(&path);
        Ok(())
    }

    fn current_url(&mut self) -> Result<String, PageError> {
        self.tick()?;
        Ok(self.observed_view().url)
    }

    fn query(&mut self, selector: &str) -> Result<Vec<NodeSnapshot>, PageError> {
        self.tick()?;
        Ok(self.observed_view().query(selector))
    }

    fn inspect(&mut self, node: NodeId) -> Result<Option<NodeSnapshot>, PageError> {
        self.tick()?;
        Ok(self.observed_view().node(node).map(SimNode::snapshot))
    }

    fn type_text(&mut self, node: NodeId, text: &str) -> Result<(), PageError> {
        self.tick()?;
        let live = self.render();
        let field = match live.node(node).map(|n| &n.kind) {
            Some(NodeKind::Input(field)) => *field,
            Some(_) => {
                return Err(PageError::Protocol {
                    command: "type".into(),
                    error: format!("node {} is not an input", node),
                });
            }
            None => return Err(PageError::StaleNode(node)),
        };
        self.mutate(|sim| sim.inputs.field_mut(field).push_str(text));
        Ok(())
    }

    fn click(&mut self, node: NodeId) -> Result<(), PageError> {
        self.tick()?;
        let live = self.render();
        let target = live.node(node).ok_or(PageError::StaleNode(node))?;
        if !target.visible || !target.enabled {
            return Err(PageError::Protocol {
                command: "click".into(),
                error: format!("node {} is not interactable", node),
            });
        }
        let control = match &target.kind {
            NodeKind::Button(control) => Some(control.clone()),
            NodeKind::Input(_) | NodeKind::Static => None,
        };
        let mut extra = 0;
        self.mutate(|sim| {
            if let Some(control) = control {
                extra = sim.press(control);
            }
        });
        if extra > 0 {
            if let Some((_, remaining)) = self.stale.as_mut() {
                *remaining += extra;
            } else {
                self.stale = Some((live, extra));
            }
        }
        Ok(())
    }
}
