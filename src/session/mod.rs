pub(crate) mod builder;
pub(crate) mod cancel;
pub(crate) mod settings;
