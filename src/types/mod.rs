pub mod context;
pub mod coordinate;
pub mod date_range;
pub mod descriptor;
pub mod fused;
pub mod observation;
pub mod variable;
