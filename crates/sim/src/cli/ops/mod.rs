pub mod demo;
pub mod init;
pub mod records;
pub mod scalability;

pub use demo::Demo;
pub use init::Init;
pub use records::Records;
pub use scalability::Scalability;
