pub mod business;
pub mod contact;
pub mod message;
