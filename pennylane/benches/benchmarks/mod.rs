pub mod decompose;
pub mod generators;
pub mod simulate;
