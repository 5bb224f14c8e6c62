pub mod action;
pub mod assertion;
pub mod locator;
pub mod poll;
