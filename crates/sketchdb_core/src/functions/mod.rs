pub mod aggregate;
pub mod bind_state;
