pub mod context;
pub mod driver;
pub mod storefront;
