mod filters;

pub use filters::*;
