pub mod account;
pub mod answer;
pub mod listing;
pub mod pagination;
pub mod question;
pub mod tag;
pub mod view;
pub mod vote;
