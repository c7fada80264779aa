pub(crate) mod endpoint;
pub mod state;
