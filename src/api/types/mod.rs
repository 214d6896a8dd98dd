//! Request and response types of the panel REST API.
//!
//! Response types are deserialized from `attributes` after they went through the
//! wire→internal normalizer, so their fields are declared in camelCase.

pub mod request;
pub mod response;
