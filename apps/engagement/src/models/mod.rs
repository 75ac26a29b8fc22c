pub mod comment;
pub mod skill;
pub mod user;
