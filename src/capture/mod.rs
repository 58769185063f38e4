pub(crate) mod frame;
pub(crate) mod manifest;
pub(crate) mod source;
