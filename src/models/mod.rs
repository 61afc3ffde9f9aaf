pub mod application;
pub mod contact;
