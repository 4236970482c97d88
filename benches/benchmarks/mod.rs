pub mod gradient_correction;
pub mod neighborhood_search;
pub mod smoothing_kernel;
