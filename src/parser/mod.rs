//! Pure extraction over rendered HTML: index page → entity pages → method pages.
//! Nothing here fetches or suspends.

pub mod entity;
pub mod index;
pub mod members;
pub mod patterns;
pub mod signature;
