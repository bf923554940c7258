pub mod brand;
pub mod campaign;
pub mod icp;
