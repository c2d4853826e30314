pub mod agents;
pub mod runs;
pub mod stream;
