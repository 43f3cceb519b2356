pub(crate) mod common;

mod properties;
