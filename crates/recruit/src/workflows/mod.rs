pub mod applicants;
pub mod interviews;
pub mod tenancy;
