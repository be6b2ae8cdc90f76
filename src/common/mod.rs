pub mod account;
pub mod block;
pub mod community;
pub mod follow;
pub mod newtypes;
pub mod payment;
pub mod post;
pub mod state;
