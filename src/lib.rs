//! geofix — resolve "where am I" from several positioning providers.

pub mod location;
pub mod logging;
