pub mod contract;
pub mod questions;
pub mod recommendation;
pub mod travel;
