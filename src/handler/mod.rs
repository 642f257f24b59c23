pub mod admin;
pub mod contact;
pub mod extract;
pub mod listings;
