// Infrastructure implementations for solpattern.

pub mod concurrency;
pub mod descriptor_store;
pub mod logging;
pub mod solidity;
pub mod source_loader;
pub mod version_gate;

pub use descriptor_store::load_descriptors;
pub use solidity::SolidityParser;
pub use source_loader::SourceLoader;
pub use version_gate::PragmaVersionGate;
