//! Backend adapters. Each one translates a [`GenerationRequest`](crate::GenerationRequest)
//! into its backend's call contract and polls for the result.

mod luma;
mod pika;
mod replicate;
mod runway;

pub use luma::LumaProvider;
pub use pika::PikaProvider;
pub use replicate::ReplicateProvider;
pub use runway::RunwayProvider;
