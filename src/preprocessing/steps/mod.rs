//! Individual cleaning steps

pub mod binarize;
pub mod crop;
pub mod grayscale;
pub mod morphology;
