pub mod element;
pub mod state;
pub mod storefront;
