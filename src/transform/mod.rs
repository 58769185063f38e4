pub(crate) mod fill;
pub(crate) mod perspective;
pub(crate) mod raster;
