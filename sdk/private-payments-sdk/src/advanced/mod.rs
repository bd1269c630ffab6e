pub mod instructions;
pub mod plan;
