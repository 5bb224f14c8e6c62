use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::action::Action;
use crate::error::{HarnessError, HarnessResult};
use crate::model::element::ElementRef;

// ============================================================================
// State names
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStateName {
    Login,
    Inventory,
    Cart,
    CheckoutInfo,
    CheckoutOverview,
    CheckoutComplete,
}

impl PageStateName {
    pub const ALL: [PageStateName; 6] = [
        PageStateName::Login,
        PageStateName::Inventory,
        PageStateName::Cart,
        PageStateName::CheckoutInfo,
        PageStateName::CheckoutOverview,
        PageStateName::CheckoutComplete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PageStateName::Login => "login",
            PageStateName::Inventory => "inventory",
            PageStateName::Cart => "cart",
            PageStateName::CheckoutInfo => "checkout_info",
            PageStateName::CheckoutOverview => "checkout_overview",
            PageStateName::CheckoutComplete => "checkout_complete",
        }
    }
}

impl fmt::Display for PageStateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageStateName {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PageStateName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| HarnessError::config(format!("unknown page state '{}'", s)))
    }
}

// ============================================================================
// Transition table
// ============================================================================

/// What fires a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Click(ElementRef),
    Navigate(String),
}

/// Condition checked against the model state when the trigger fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    Always,
    /// Typed username is accepted and not locked, and password matches
    Credentials { username: ElementRef, password: ElementRef },
    /// Every listed input received non-empty text on this page
    FieldsFilled(Vec<ElementRef>),
    /// A sign-in happened and no sign-out since
    Authenticated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    State(PageStateName),
    Error(String),
}

/// Session side effect of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    SignIn,
    SignOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRule {
    /// `None` for routes reachable from every state
    pub from: Option<PageStateName>,
    pub trigger: Trigger,
    pub guard: Guard,
    pub target: Target,
    pub effect: Effect,
}

/// Accounts the target application accepts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CredentialPolicy {
    pub accepted_users: Vec<String>,
    pub locked_users: Vec<String>,
    pub password: String,
}

impl CredentialPolicy {
    pub fn allows(&self, username: &str, password: &str) -> bool {
        self.accepted_users.iter().any(|u| u == username)
            && !self.locked_users.iter().any(|u| u == username)
            && password == self.password
    }
}

/// One declared page of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct PageState {
    pub name: PageStateName,
    pub path: String,
    pub elements: Vec<ElementRef>,
}

impl PageState {
    pub fn new(name: PageStateName, path: &str, elements: &[ElementRef]) -> Self {
        PageState {
            name,
            path: path.to_string(),
            elements: elements.to_vec(),
        }
    }

    pub fn contains(&self, element: &ElementRef) -> bool {
        self.elements.iter().any(|e| e == element)
    }
}

// ============================================================================
// Runtime model state
// ============================================================================

/// The model's view of one run: current page plus the sub-flags that let a
/// single page stand for several rendered variants.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState {
    pub current: PageStateName,
    pub error_banner_present: bool,
    pub authenticated: bool,
    /// Text typed into inputs on the current page, keyed by element name
    pub inputs: HashMap<&'static str, String>,
}

impl ModelState {
    pub fn new(start: PageStateName) -> Self {
        ModelState {
            current: start,
            error_banner_present: false,
            // Any start past the login page implies a signed-in session
            authenticated: start != PageStateName::Login,
            inputs: HashMap::new(),
        }
    }

    pub fn input(&self, element: &ElementRef) -> &str {
        self.inputs.get(element.name).map(String::as_str).unwrap_or("")
    }

    /// Fold an executed action and its transition outcome into the state.
    pub fn advance(&mut self, action: &Action, outcome: &TransitionOutcome) {
        match outcome {
            TransitionOutcome::Moved { to, effect } => {
                self.current = *to;
                self.error_banner_present = false;
                self.inputs.clear();
                match effect {
                    Effect::SignIn => self.authenticated = true,
                    Effect::SignOut => self.authenticated = false,
                    Effect::None => {}
                }
            }
            TransitionOutcome::Unchanged { error_banner_present } => {
                self.error_banner_present = *error_banner_present;
                if let Action::Type(element, text) = action {
                    self.inputs.entry(element.name).or_default().push_str(text);
                }
            }
            TransitionOutcome::Error(_) => {}
        }
    }
}

/// Result of looking an action up in the transition table.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Moved { to: PageStateName, effect: Effect },
    Unchanged { error_banner_present: bool },
    Error(String),
}

// ============================================================================
// StateModel
// ============================================================================

/// Validated page graph. Only obtainable through [`StateModelBuilder::build`].
#[derive(Debug, Clone)]
pub struct StateModel {
    states: BTreeMap<PageStateName, PageState>,
    rules: Vec<TransitionRule>,
    credentials: CredentialPolicy,
}

impl StateModel {
    pub fn builder() -> StateModelBuilder {
        StateModelBuilder::default()
    }

    pub fn state(&self, name: PageStateName) -> Option<&PageState> {
        self.states.get(&name)
    }

    pub fn states(&self) -> impl Iterator<Item = &PageState> {
        self.states.values()
    }

    pub fn rules(&self) -> &[TransitionRule] {
        &self.rules
    }

    pub fn credentials(&self) -> &CredentialPolicy {
        &self.credentials
    }

    /// Elements valid while `state` is current.
    pub fn element_map(&self, state: PageStateName) -> &[ElementRef] {
        self.states
            .get(&state)
            .map(|s| s.elements.as_slice())
            .unwrap_or(&[])
    }

    /// Gate used by the locator before any page query.
    pub fn check_element(&self, state: PageStateName, element: &ElementRef) -> HarnessResult<()> {
        if self.element_map(state).contains(element) {
            Ok(())
        } else {
            Err(HarnessError::UnknownElement {
                element: element.name.to_string(),
                state,
            })
        }
    }

    /// Find an element by stable name in any declared state.
    pub fn element_named(&self, name: &str) -> Option<ElementRef> {
        self.states
            .values()
            .flat_map(|s| s.elements.iter())
            .find(|e| e.name == name)
            .copied()
    }

    /// Deterministic lookup of the state an action leads to.
    pub fn transition(&self, state: &ModelState, action: &Action) -> TransitionOutcome {
        let trigger = match action {
            Action::Type(..) => {
                return TransitionOutcome::Unchanged {
                    error_banner_present: state.error_banner_present,
                };
            }
            Action::Click(element) => Trigger::Click(*element),
            Action::Navigate(path) => Trigger::Navigate(normalize_path(path)),
        };

        let rule = self
            .rules
            .iter()
            .find(|r| r.from == Some(state.current) && r.trigger == trigger)
            .or_else(|| self.rules.iter().find(|r| r.from.is_none() && r.trigger == trigger));

        let Some(rule) = rule else {
            return match trigger {
                Trigger::Navigate(path) => {
                    TransitionOutcome::Error(format!("no page is declared at '{}'", path))
                }
                Trigger::Click(_) => TransitionOutcome::Unchanged {
                    error_banner_present: state.error_banner_present,
                },
            };
        };

        if !self.guard_holds(&rule.guard, state) {
            return TransitionOutcome::Unchanged {
                error_banner_present: true,
            };
        }

        match &rule.target {
            Target::State(to) => TransitionOutcome::Moved {
                to: *to,
                effect: rule.effect,
            },
            Target::Error(reason) => TransitionOutcome::Error(reason.clone()),
        }
    }

    fn guard_holds(&self, guard: &Guard, state: &ModelState) -> bool {
        match guard {
            Guard::Always => true,
            Guard::Credentials { username, password } => self
                .credentials
                .allows(state.input(username), state.input(password)),
            Guard::FieldsFilled(fields) => fields.iter().all(|f| !state.input(f).is_empty()),
            Guard::Authenticated => state.authenticated,
        }
    }
}

/// Strip query/fragment and make the path absolute for route matching.
fn normalize_path(path: &str) -> String {
    let path = path
        .split_once("://")
        .map(|(_, rest)| rest.find('/').map(|i| &rest[i..]).unwrap_or("/"))
        .unwrap_or(path);
    let path = path.split(['?', '#']).next().unwrap_or("");
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Default)]
pub struct StateModelBuilder {
    states: Vec<PageState>,
    rules: Vec<TransitionRule>,
    credentials: CredentialPolicy,
}

impl StateModelBuilder {
    pub fn state(mut self, state: PageState) -> Self {
        self.states.push(state);
        self
    }

    pub fn credentials(mut self, policy: CredentialPolicy) -> Self {
        self.credentials = policy;
        self
    }

    pub fn rule(mut self, rule: TransitionRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Unguarded click transition.
    pub fn on_click(self, from: PageStateName, element: ElementRef, to: PageStateName) -> Self {
        self.on_click_if(from, element, Guard::Always, to, Effect::None)
    }

    pub fn on_click_if(
        self,
        from: PageStateName,
        element: ElementRef,
        guard: Guard,
        to: PageStateName,
        effect: Effect,
    ) -> Self {
        self.rule(TransitionRule {
            from: Some(from),
            trigger: Trigger::Click(element),
            guard,
            target: Target::State(to),
            effect,
        })
    }

    /// Navigation route valid from every state.
    pub fn route(self, path: &str, guard: Guard, to: PageStateName) -> Self {
        self.rule(TransitionRule {
            from: None,
            trigger: Trigger::Navigate(normalize_path(path)),
            guard,
            target: Target::State(to),
            effect: Effect::None,
        })
    }

    /// Validate and freeze the model. Every problem is a configuration error.
    pub fn build(self) -> HarnessResult<StateModel> {
        let mut states = BTreeMap::new();
        for state in self.states {
            validate_element_map(&state)?;
            let name = state.name;
            if states.insert(name, state).is_some() {
                return Err(HarnessError::config(format!("state {} declared twice", name)));
            }
        }
        if states.is_empty() {
            return Err(HarnessError::config("model declares no states"));
        }

        for rule in &self.rules {
            validate_rule(rule, &states)?;
        }

        Ok(StateModel {
            states,
            rules: self.rules,
            credentials: self.credentials,
        })
    }
}

fn validate_element_map(state: &PageState) -> HarnessResult<()> {
    let mut names = HashSet::new();
    for element in &state.elements {
        if element.name.is_empty() || element.selector.trim().is_empty() {
            return Err(HarnessError::config(format!(
                "state {} has an element with an empty name or selector ({:?})",
                state.name, element
            )));
        }
        if !names.insert(element.name) {
            return Err(HarnessError::config(format!(
                "state {} declares element '{}' twice",
                state.name, element.name
            )));
        }
    }
    Ok(())
}

fn validate_rule(
    rule: &TransitionRule,
    states: &BTreeMap<PageStateName, PageState>,
) -> HarnessResult<()> {
    let source = match rule.from {
        Some(from) => Some(states.get(&from).ok_or_else(|| {
            HarnessError::config(format!("transition declared from undeclared state {}", from))
        })?),
        None => None,
    };

    if let Target::State(to) = &rule.target {
        if !states.contains_key(to) {
            return Err(HarnessError::config(format!(
                "transition targets undeclared state {}",
                to
            )));
        }
    }

    match (&rule.trigger, source) {
        (Trigger::Click(element), Some(source)) => {
            if !source.contains(element) {
                return Err(HarnessError::config(format!(
                    "click trigger '{}' is not in the element map of {}",
                    element.name, source.name
                )));
            }
        }
        (Trigger::Click(element), None) => {
            return Err(HarnessError::config(format!(
                "click trigger '{}' needs a source state",
                element.name
            )));
        }
        (Trigger::Navigate(path), _) if path.is_empty() => {
            return Err(HarnessError::config("navigate trigger with empty path"));
        }
        _ => {}
    }

    let guard_fields: Vec<&ElementRef> = match &rule.guard {
        Guard::Credentials { username, password } => vec![username, password],
        Guard::FieldsFilled(fields) => fields.iter().collect(),
        Guard::Always | Guard::Authenticated => Vec::new(),
    };
    if let Some(source) = source {
        for field in guard_fields {
            if !source.contains(field) {
                return Err(HarnessError::config(format!(
                    "guard field '{}' is not in the element map of {}",
                    field.name, source.name
                )));
            }
        }
    }

    Ok(())
}
