pub mod invoice;
pub mod route_hint;
