pub mod answer;
pub mod authentication;
pub mod profile;
pub mod question;
pub mod tag;
pub mod vote;
