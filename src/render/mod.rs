pub(crate) mod pixel_buffer;
pub(crate) mod pool;
