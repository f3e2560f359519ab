pub mod compositor;
pub mod surface;
pub mod transitions;
pub mod watermark;
