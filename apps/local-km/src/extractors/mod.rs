pub mod sae_identity;
pub use sae_identity::SaeIdentity;
