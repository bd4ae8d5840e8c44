pub mod policy;

pub use policy::{Policy, can_modify_post};
