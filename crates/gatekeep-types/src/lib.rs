pub mod acl;
pub mod category;
pub mod index;
pub mod op;
pub mod prelude;
pub mod time;
pub mod trace;
