pub mod reporter;
pub mod supervisor;
pub mod worker;
