//! Page graph of the demo storefront: login, inventory, cart and the three
//! checkout pages.

use crate::error::HarnessResult;
use crate::model::element::ElementRef;
use crate::model::state::{
    CredentialPolicy, Effect, Guard, PageState, PageStateName, StateModel,
};

pub mod elements {
    use crate::model::element::ElementRef;

    pub const USERNAME: ElementRef = ElementRef::new("username", "#user-name", "Username field");
    pub const PASSWORD: ElementRef = ElementRef::new("password", "#password", "Password field");
    pub const LOGIN_BUTTON: ElementRef = ElementRef::new("login_button", "#login-button", "Login button");
    pub const ERROR_BANNER: ElementRef =
        ElementRef::new("error_banner", "[data-test=\"error\"]", "Error banner");

    pub const TITLE: ElementRef = ElementRef::new("title", ".title", "Page title");
    pub const ADD_BACKPACK: ElementRef = ElementRef::new(
        "add_backpack",
        "#add-to-cart-sauce-labs-backpack",
        "Add backpack to cart",
    );
    pub const REMOVE_BACKPACK: ElementRef = ElementRef::new(
        "remove_backpack",
        "#remove-sauce-labs-backpack",
        "Remove backpack from cart",
    );
    pub const CART_BADGE: ElementRef =
        ElementRef::new("cart_badge", ".shopping_cart_badge", "Cart badge");
    pub const CART_LINK: ElementRef = ElementRef::new("cart_link", ".shopping_cart_link", "Cart link");
    pub const MENU_BUTTON: ElementRef =
        ElementRef::new("menu_button", "#react-burger-menu-btn", "Menu button");
    pub const LOGOUT_LINK: ElementRef =
        ElementRef::new("logout_link", "#logout_sidebar_link", "Logout link");

    pub const CART_ITEM: ElementRef = ElementRef::new("cart_item", ".cart_item", "Cart item");
    pub const CHECKOUT_BUTTON: ElementRef = ElementRef::new("checkout_button", "#checkout", "Checkout button");
    pub const CONTINUE_SHOPPING: ElementRef =
        ElementRef::new("continue_shopping", "#continue-shopping", "Continue shopping button");

    pub const FIRST_NAME: ElementRef = ElementRef::new("first_name", "#first-name", "First name field");
    pub const LAST_NAME: ElementRef = ElementRef::new("last_name", "#last-name", "Last name field");
    pub const POSTAL_CODE: ElementRef = ElementRef::new("postal_code", "#postal-code", "Postal code field");
    pub const CONTINUE_BUTTON: ElementRef = ElementRef::new("continue_button", "#continue", "Continue button");
    pub const CANCEL_BUTTON: ElementRef = ElementRef::new("cancel_button", "#cancel", "Cancel button");

    pub const FINISH_BUTTON: ElementRef = ElementRef::new("finish_button", "#finish", "Finish button");

    pub const COMPLETE_HEADER: ElementRef =
        ElementRef::new("complete_header", ".complete-header", "Order complete header");
    pub const BACK_HOME: ElementRef = ElementRef::new("back_home", "#back-to-products", "Back home button");
}

use elements::*;

pub const STANDARD_USER: &str = "standard_user";
pub const LOCKED_OUT_USER: &str = "locked_out_user";
pub const PROBLEM_USER: &str = "problem_user";
pub const PERFORMANCE_GLITCH_USER: &str = "performance_glitch_user";
pub const PASSWORD_SECRET: &str = "secret_sauce";

pub const LOGIN_PATH: &str = "/";
pub const INVENTORY_PATH: &str = "/inventory.html";
pub const CART_PATH: &str = "/cart.html";
pub const CHECKOUT_INFO_PATH: &str = "/checkout-step-one.html";
pub const CHECKOUT_OVERVIEW_PATH: &str = "/checkout-step-two.html";
pub const CHECKOUT_COMPLETE_PATH: &str = "/checkout-complete.html";

/// Header elements shared by every signed-in page.
const HEADER: [ElementRef; 5] = [TITLE, CART_BADGE, CART_LINK, MENU_BUTTON, LOGOUT_LINK];

fn with_header(page: &[ElementRef]) -> Vec<ElementRef> {
    let mut all = HEADER.to_vec();
    all.extend_from_slice(page);
    all
}

pub fn credential_policy() -> CredentialPolicy {
    CredentialPolicy {
        accepted_users: vec![
            STANDARD_USER.to_string(),
            LOCKED_OUT_USER.to_string(),
            PROBLEM_USER.to_string(),
            PERFORMANCE_GLITCH_USER.to_string(),
        ],
        locked_users: vec![LOCKED_OUT_USER.to_string()],
        password: PASSWORD_SECRET.to_string(),
    }
}

/// Build and validate the storefront model.
pub fn storefront_model() -> HarnessResult<StateModel> {
    use PageStateName::*;

    let signed_in = Guard::Authenticated;

    StateModel::builder()
        .credentials(credential_policy())
        .state(PageState::new(
            Login,
            LOGIN_PATH,
            &[USERNAME, PASSWORD, LOGIN_BUTTON, ERROR_BANNER],
        ))
        .state(PageState {
            name: Inventory,
            path: INVENTORY_PATH.to_string(),
            elements: with_header(&[ADD_BACKPACK, REMOVE_BACKPACK]),
        })
        .state(PageState {
            name: Cart,
            path: CART_PATH.to_string(),
            elements: with_header(&[CART_ITEM, REMOVE_BACKPACK, CHECKOUT_BUTTON, CONTINUE_SHOPPING]),
        })
        .state(PageState {
            name: CheckoutInfo,
            path: CHECKOUT_INFO_PATH.to_string(),
            elements: with_header(&[
                FIRST_NAME,
                LAST_NAME,
                POSTAL_CODE,
                CONTINUE_BUTTON,
                CANCEL_BUTTON,
                ERROR_BANNER,
            ]),
        })
        .state(PageState {
            name: CheckoutOverview,
            path: CHECKOUT_OVERVIEW_PATH.to_string(),
            elements: with_header(&[CART_ITEM, FINISH_BUTTON, CANCEL_BUTTON]),
        })
        .state(PageState {
            name: CheckoutComplete,
            path: CHECKOUT_COMPLETE_PATH.to_string(),
            elements: with_header(&[COMPLETE_HEADER, BACK_HOME]),
        })
        .on_click_if(
            Login,
            LOGIN_BUTTON,
            Guard::Credentials {
                username: USERNAME,
                password: PASSWORD,
            },
            Inventory,
            Effect::SignIn,
        )
        .on_click(Inventory, CART_LINK, Cart)
        .on_click(Cart, CART_LINK, Cart)
        .on_click(Cart, CONTINUE_SHOPPING, Inventory)
        .on_click(Cart, CHECKOUT_BUTTON, CheckoutInfo)
        .on_click_if(
            CheckoutInfo,
            CONTINUE_BUTTON,
            Guard::FieldsFilled(vec![FIRST_NAME, LAST_NAME, POSTAL_CODE]),
            CheckoutOverview,
            Effect::None,
        )
        .on_click(CheckoutInfo, CANCEL_BUTTON, Cart)
        .on_click(CheckoutInfo, CART_LINK, Cart)
        .on_click(CheckoutOverview, FINISH_BUTTON, CheckoutComplete)
        .on_click(CheckoutOverview, CANCEL_BUTTON, Inventory)
        .on_click(CheckoutOverview, CART_LINK, Cart)
        .on_click(CheckoutComplete, BACK_HOME, Inventory)
        .on_click(CheckoutComplete, CART_LINK, Cart)
        .on_click_if(Inventory, LOGOUT_LINK, Guard::Always, Login, Effect::SignOut)
        .on_click_if(Cart, LOGOUT_LINK, Guard::Always, Login, Effect::SignOut)
        .on_click_if(CheckoutInfo, LOGOUT_LINK, Guard::Always, Login, Effect::SignOut)
        .on_click_if(CheckoutOverview, LOGOUT_LINK, Guard::Always, Login, Effect::SignOut)
        .on_click_if(CheckoutComplete, LOGOUT_LINK, Guard::Always, Login, Effect::SignOut)
        .route(LOGIN_PATH, Guard::Always, Login)
        .route(INVENTORY_PATH, signed_in.clone(), Inventory)
        .route(CART_PATH, signed_in.clone(), Cart)
        .route(CHECKOUT_INFO_PATH, signed_in.clone(), CheckoutInfo)
        .route(CHECKOUT_OVERVIEW_PATH, signed_in.clone(), CheckoutOverview)
        .route(CHECKOUT_COMPLETE_PATH, signed_in, CheckoutComplete)
        .build()
}
